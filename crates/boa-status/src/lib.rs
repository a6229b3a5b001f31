pub mod client;
pub mod error;
pub mod recorder;

pub use client::{GenericMetadata, NodeChangeList, NodeErrorsList, StatusClient};
pub use error::StatusError;
pub use recorder::{BootSetStatusHandle, PhaseStatusHandle, SessionStatusHandle, StatusRecorder, WritePolicy};
