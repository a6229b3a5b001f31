use crate::error::ConfigError;

/// Base URLs and credentials for the five HTTP services BOA depends on, plus
/// the object store's SigV4 credentials. Loaded separately from
/// [`crate::EnvConfig`] since these are deployment wiring rather than
/// per-Session tunables — a different ops team typically owns them.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub hardware_state_base_url: String,
    pub power_base_url: String,
    pub boot_script_base_url: String,
    pub configuration_base_url: String,
    pub status_base_url: String,

    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_protocol: String,
    pub s3_gateway: String,
    pub s3_region: String,

    /// Prefix BOA gives configurations it creates itself, and the fallback
    /// clone-url/playbook used when a Session's `cfs` block names neither.
    pub cfs_name_prefix: String,
    pub cfs_default_clone_url: String,
    pub cfs_default_playbook: String,
}

impl ServiceEndpoints {
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(ServiceEndpoints {
            hardware_state_base_url: require(&lookup, "HSM_BASE_URL")?,
            power_base_url: require(&lookup, "POWER_CONTROL_BASE_URL")?,
            boot_script_base_url: require(&lookup, "BOOT_SCRIPT_BASE_URL")?,
            configuration_base_url: require(&lookup, "CFS_BASE_URL")?,
            status_base_url: require(&lookup, "BOS_STATUS_BASE_URL")?,

            s3_access_key: require(&lookup, "S3_ACCESS_KEY")?,
            s3_secret_key: require(&lookup, "S3_SECRET_KEY")?,
            s3_protocol: non_empty(&lookup, "S3_PROTOCOL").unwrap_or_else(|| "https".to_string()),
            s3_gateway: require(&lookup, "S3_GATEWAY")?,
            s3_region: non_empty(&lookup, "S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),

            cfs_name_prefix: non_empty(&lookup, "CFS_NAME_PREFIX").unwrap_or_else(|| "boa-".to_string()),
            cfs_default_clone_url: non_empty(&lookup, "CFS_DEFAULT_CLONE_URL").unwrap_or_default(),
            cfs_default_playbook: non_empty(&lookup, "CFS_DEFAULT_PLAYBOOK").unwrap_or_else(|| "site.yml".to_string()),
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingEnv(name.to_string())),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    fn full_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("HSM_BASE_URL", "http://hsm"),
            ("POWER_CONTROL_BASE_URL", "http://power"),
            ("BOOT_SCRIPT_BASE_URL", "http://bootscript"),
            ("CFS_BASE_URL", "http://cfs"),
            ("BOS_STATUS_BASE_URL", "http://status"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
            ("S3_GATEWAY", "s3.example.com"),
        ]
    }

    #[test]
    fn loads_when_all_required_vars_present() {
        let endpoints = ServiceEndpoints::from_lookup(env(&full_pairs())).unwrap();
        assert_eq!(endpoints.hardware_state_base_url, "http://hsm");
        assert_eq!(endpoints.s3_protocol, "https");
        assert_eq!(endpoints.s3_region, "us-east-1");
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let mut pairs = full_pairs();
        pairs.retain(|(k, _)| *k != "CFS_BASE_URL");
        let err = ServiceEndpoints::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ref n) if n == "CFS_BASE_URL"));
    }
}
