use thiserror::Error;

/// Whether a failure should cause the container runtime to restart the
/// process (`Transient`) or to leave it stopped for a human (`Nontransient`).
///
/// Every leaf error type in every crate implements [`Classify`] so that
/// `boa-cli::main` is the single place that reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Nontransient,
}

pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("boot set '{0}' has no node source (node_list, node_groups, node_roles_groups all empty)")]
    NoNodeSource(String),

    #[error("unrecognised operation '{0}'")]
    InvalidOperation(String),

    #[error("power controller refuses to act on legacy numeric node id '{0}'")]
    LegacyNodeId(String),
}

impl Classify for DomainError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Nontransient
    }
}
