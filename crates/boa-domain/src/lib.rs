pub mod error;
pub mod types;

pub use error::{Classify, DomainError, ErrorKind};
pub use types::{
    BootArtifacts, BootSet, Category, CfsSpec, NodeId, Operation, PhaseName, Session, phases_for,
};
