use boa_domain::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("status service request failed: {0}")]
    Http(String),

    /// 409 from a create call — the create-or-reference combinator maps this
    /// to success before it ever reaches a caller; only surfaced
    /// internally between the client and the combinator.
    #[error("record already exists")]
    Conflict,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Classify for StatusError {
    fn kind(&self) -> ErrorKind {
        match self {
            StatusError::Http(_) => ErrorKind::Transient,
            StatusError::Conflict => ErrorKind::Nontransient,
            StatusError::Serialization(_) => ErrorKind::Nontransient,
        }
    }
}
