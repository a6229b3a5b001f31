use std::collections::HashMap;
use std::path::Path;

use boa_domain::{BootSet, CfsSpec, Session};
use serde::Deserialize;
use tracing::debug;

use crate::env::EnvConfig;
use crate::error::ConfigError;

/// The on-disk Session Template body: everything about a Session that is
/// *not* carried by an environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTemplate {
    pub boot_sets: HashMap<String, BootSet>,
    #[serde(default)]
    pub cfs: Option<CfsSpec>,
    #[serde(default)]
    pub enable_cfs: bool,
    #[serde(default)]
    pub partition: Option<String>,
}

pub fn load_session_template(path: &Path) -> Result<SessionTemplate, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let template: SessionTemplate = serde_json::from_str(&content).map_err(|e| ConfigError::JsonParse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!(boot_sets = template.boot_sets.len(), path = %path.display(), "loaded session template");
    Ok(template)
}

/// Merge the environment-derived fields with the file-derived template into
/// the single immutable [`Session`] the rest of the system consumes.
pub fn build_session(env: &EnvConfig, template: SessionTemplate) -> Session {
    Session {
        session_id: env.session_id.clone(),
        session_template_id: env.session_template_id.clone(),
        operation: env.operation,
        limit: env.session_limit.clone(),
        boot_sets: template.boot_sets,
        cfs: template.cfs,
        enable_cfs: template.enable_cfs,
        partition: template.partition,
    }
}

/// Convenience wrapper: load the template from `env.session_file_path` and build the Session.
pub fn load_session(env: &EnvConfig) -> Result<Session, ConfigError> {
    let template = load_session_template(Path::new(&env.session_file_path))?;
    Ok(build_session(env, template))
}
