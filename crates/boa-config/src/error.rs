use boa_domain::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(String),

    #[error("invalid value for environment variable {name}: {message}")]
    InvalidEnv { name: String, message: String },

    #[error("io error reading session file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json parse error in session file {path}: {source}")]
    JsonParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("domain error: {0}")]
    Domain(#[from] boa_domain::DomainError),
}

impl Classify for ConfigError {
    fn kind(&self) -> ErrorKind {
        // Any malformed input is a human problem: the Session file or env was
        // generated wrong and retrying without fixing it will fail identically.
        ErrorKind::Nontransient
    }
}
