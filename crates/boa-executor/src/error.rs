use boa_clients::ClientError;
use boa_config::ConfigError;
use boa_domain::{Classify, ErrorKind};
use boa_nodeset::NodeSetError;
use boa_status::StatusError;
use thiserror::Error;

/// Composes every leaf crate's error into one type, delegating classification
/// to the wrapped error — mirroring `ReconcileError`'s composition of
/// `ConfigError`/`GraphError`/`StoreError`/`DriverError` via `#[from]`.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("node set resolution error: {0}")]
    NodeSet(#[from] NodeSetError),

    #[error("status service error: {0}")]
    Status(#[from] StatusError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("internal executor error: {0}")]
    Internal(String),
}

impl Classify for ExecutorError {
    fn kind(&self) -> ErrorKind {
        match self {
            ExecutorError::Config(e) => e.kind(),
            ExecutorError::NodeSet(e) => e.kind(),
            ExecutorError::Status(e) => e.kind(),
            ExecutorError::Client(e) => e.kind(),
            ExecutorError::Internal(_) => ErrorKind::Nontransient,
        }
    }
}
