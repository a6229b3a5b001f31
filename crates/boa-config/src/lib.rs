pub mod endpoints;
pub mod env;
pub mod error;
pub mod session;

pub use endpoints::ServiceEndpoints;
pub use env::EnvConfig;
pub use error::ConfigError;
pub use session::{build_session, load_session, load_session_template, SessionTemplate};
