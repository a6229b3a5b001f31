use boa_domain::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {service} failed: {message}")]
    Http { service: &'static str, message: String },

    #[error("vendor error {code} on {service}: {message}")]
    Vendor { service: &'static str, code: i64, message: String },

    #[error("unsupported rootfs provider: {0}")]
    UnsupportedProvider(String),

    #[error("artifact manifest missing required type {0}")]
    ArtifactMissing(String),

    #[error("artifact manifest has more than one object of type {0}")]
    TooManyArtifacts(String),

    #[error("power controller refuses to act on legacy node name: {0}")]
    LegacyNodeName(String),

    #[error("nodes failed to reach the desired state: {0} of {1} did not reach it")]
    NodesNotReady(usize, usize),

    #[error("configuration status retries exhausted: {0} of {1} nodes failed")]
    ExhaustedRetries(usize, usize),

    #[error("configuration did not converge within the allotted window ({0} of {1} succeeded)")]
    ConfigurationTimeout(usize, usize),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Classify for ClientError {
    fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Http { .. } => ErrorKind::Transient,
            ClientError::Vendor { .. } => ErrorKind::Nontransient,
            ClientError::UnsupportedProvider(_) => ErrorKind::Nontransient,
            ClientError::ArtifactMissing(_) => ErrorKind::Nontransient,
            ClientError::TooManyArtifacts(_) => ErrorKind::Nontransient,
            ClientError::LegacyNodeName(_) => ErrorKind::Nontransient,
            ClientError::NodesNotReady(_, _) => ErrorKind::Nontransient,
            ClientError::ExhaustedRetries(_, _) => ErrorKind::Nontransient,
            ClientError::ConfigurationTimeout(_, _) => ErrorKind::Nontransient,
            ClientError::Serialization(_) => ErrorKind::Nontransient,
        }
    }
}
