use boa_domain::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeSetError {
    #[error("hardware state service unreachable: {0}")]
    StateServiceUnreachable(String),

    #[error("boot set resolves to an empty node set")]
    EmptyResolution,
}

impl Classify for NodeSetError {
    fn kind(&self) -> ErrorKind {
        match self {
            // A dependency that isn't up yet is the textbook transient case.
            NodeSetError::StateServiceUnreachable(_) => ErrorKind::Transient,
            NodeSetError::EmptyResolution => ErrorKind::Nontransient,
        }
    }
}
