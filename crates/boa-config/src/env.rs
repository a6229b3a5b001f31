use boa_domain::Operation;
use tracing::debug;

use crate::error::ConfigError;

const DEFAULT_SESSION_FILE_PATH: &str = "/mnt/session/session.json";

/// The full environment-variable surface BOA reads at startup.
///
/// An env var set to the empty string is treated identically to it being
/// unset rather than failing to parse.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub operation: Operation,
    pub session_id: String,
    pub session_template_id: Option<String>,
    pub session_limit: Option<String>,
    pub session_file_path: String,

    pub node_state_check_sleep_interval: u64,
    pub node_state_check_number_of_retries: i64,
    pub graceful_shutdown_timeout: u64,
    pub forceful_shutdown_timeout: u64,
    pub graceful_shutdown_prewait: u64,
    pub power_status_frequency: u64,
    pub cfs_completion_sleep_interval: u64,

    pub log_level: Option<String>,
}

impl EnvConfig {
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Core loader, parameterised over the lookup function so tests can supply
    /// a fake environment without mutating process-global state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let operation_raw = require(&lookup, "OPERATION")?;
        let operation: Operation = operation_raw.parse()?;

        let session_id = require(&lookup, "SESSION_ID")?;
        let session_template_id = non_empty(&lookup, "SESSION_TEMPLATE_ID");
        let session_limit = non_empty(&lookup, "SESSION_LIMIT");
        let session_file_path =
            non_empty(&lookup, "SESSION_FILE_PATH").unwrap_or_else(|| DEFAULT_SESSION_FILE_PATH.to_string());

        let node_state_check_sleep_interval = parse_u64(&lookup, "NODE_STATE_CHECK_SLEEP_INTERVAL", 5)?;
        let node_state_check_number_of_retries = parse_i64(&lookup, "NODE_STATE_CHECK_NUMBER_OF_RETRIES", 120)?;
        let graceful_shutdown_timeout = parse_u64(&lookup, "GRACEFUL_SHUTDOWN_TIMEOUT", 300)?;
        let forceful_shutdown_timeout = parse_u64(&lookup, "FORCEFUL_SHUTDOWN_TIMEOUT", 180)?;
        let graceful_shutdown_prewait = parse_u64(&lookup, "GRACEFUL_SHUTDOWN_PREWAIT", 20)?;
        let power_status_frequency = parse_u64(&lookup, "POWER_STATUS_FREQUENCY", 10)?;
        let cfs_completion_sleep_interval = parse_u64(&lookup, "CFS_COMPLETION_SLEEP_INTERVAL", 5)?;

        let log_level = non_empty(&lookup, "LOG_LEVEL");

        debug!(
            operation = %operation,
            session_id = %session_id,
            "loaded environment configuration"
        );

        Ok(Self {
            operation,
            session_id,
            session_template_id,
            session_limit,
            session_file_path,
            node_state_check_sleep_interval,
            node_state_check_number_of_retries,
            graceful_shutdown_timeout,
            forceful_shutdown_timeout,
            graceful_shutdown_prewait,
            power_status_frequency,
            cfs_completion_sleep_interval,
            log_level,
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnv(name.to_string())),
    }
}

/// An unset or empty-string var returns `None`, never an error.
fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<u64, ConfigError> {
    match non_empty(lookup, name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            message: format!("expected a non-negative integer, got '{}'", v),
        }),
    }
}

fn parse_i64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: i64) -> Result<i64, ConfigError> {
    match non_empty(lookup, name) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            message: format!("expected an integer, got '{}'", v),
        }),
    }
}
