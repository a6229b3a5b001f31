use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use boa_domain::{Category, CfsSpec, NodeId};
use boa_status::{PhaseStatusHandle, StatusRecorder};
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ClientError;

const STAGE_BATCH_SIZE: usize = 1000;
const STATUS_CHUNK_SIZE: usize = 25;
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(15);
/// Stands in for "no timeout": ≈100 years when the configured duration is 0.
const EFFECTIVELY_FOREVER: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

#[derive(Debug, Clone, serde::Serialize)]
pub struct ComponentDesiredConfig {
    pub id: NodeId,
    pub enabled: bool,
    #[serde(rename = "desiredConfig")]
    pub desired_config: String,
    /// Unspecified by the upstream schema beyond its presence; BOA never
    /// populates per-node tags.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub clone_url: String,
    pub playbook: String,
    pub commit: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigurationSummary {
    pub name: String,
    pub layers: Vec<ConfigLayer>,
}

/// The configuration (CFS) service's query surface.
#[async_trait]
pub trait ConfigurationClient: Send + Sync {
    async fn stage(&self, batch: Vec<ComponentDesiredConfig>) -> Result<(), ClientError>;
    async fn list_configurations(&self) -> Result<Vec<ConfigurationSummary>, ClientError>;
    async fn create_configuration(&self, name: &str, layer: ConfigLayer) -> Result<(), ClientError>;
    /// `ids` is pre-chunked by the caller to stay under the service's request
    /// size limit; returns `configurationStatus` keyed by component id.
    async fn component_status(&self, ids: &[String]) -> Result<HashMap<String, String>, ClientError>;
}

/// Stages desired configuration and drives convergence polling.
pub struct ConfigurationDriver {
    client: Arc<dyn ConfigurationClient>,
    boa_prefix: String,
    default_clone_url: String,
    default_playbook: String,
}

impl ConfigurationDriver {
    pub fn new(client: Arc<dyn ConfigurationClient>, boa_prefix: String, default_clone_url: String, default_playbook: String) -> Self {
        ConfigurationDriver {
            client,
            boa_prefix,
            default_clone_url,
            default_playbook,
        }
    }

    /// Resolve the configuration name to stage: the session-template-supplied
    /// name if present, otherwise reuse-or-create against `cfs`.
    pub async fn resolve_configuration_name(&self, session_configuration: Option<&str>, cfs: &CfsSpec) -> Result<String, ClientError> {
        if let Some(name) = session_configuration {
            if !name.is_empty() {
                return Ok(name.to_string());
            }
        }

        let wanted = ConfigLayer {
            clone_url: cfs.clone_url.clone().unwrap_or_else(|| self.default_clone_url.clone()),
            playbook: cfs.playbook.clone().unwrap_or_else(|| self.default_playbook.clone()),
            commit: cfs.commit.clone(),
            branch: cfs.branch.clone(),
        };

        let existing = self.client.list_configurations().await?;
        for candidate in &existing {
            if candidate.name.starts_with(&self.boa_prefix) && candidate.layers.len() == 1 && candidate.layers[0] == wanted {
                return Ok(candidate.name.clone());
            }
        }

        let name = format!("{}{}", self.boa_prefix, Uuid::new_v4());
        self.client.create_configuration(&name, wanted).await?;
        Ok(name)
    }

    /// Batched PATCH of desired configuration. `enabled` is true only
    /// for the `configure` operation — boot/reboot defer enabling so CFS
    /// doesn't race the power transition.
    pub async fn stage_configuration(&self, nodes: &[NodeId], enabled: bool, desired_config: &str) -> Result<(), ClientError> {
        for chunk in nodes.chunks(STAGE_BATCH_SIZE) {
            let batch = chunk
                .iter()
                .map(|id| ComponentDesiredConfig {
                    id: id.clone(),
                    enabled,
                    desired_config: desired_config.to_string(),
                    tags: Vec::new(),
                })
                .collect();
            self.client.stage(batch).await?;
        }
        Ok(())
    }

    /// Poll until every node converges, fails, or the window elapses.
    #[allow(clippy::too_many_arguments)]
    pub async fn wait_for_configuration(
        &self,
        remaining_components: &HashSet<NodeId>,
        maximum_duration: Duration,
        check_interval: Duration,
        success_threshold: f64,
        recorder: &StatusRecorder,
        phase: &PhaseStatusHandle,
        boot_set_failed: &mut HashSet<NodeId>,
    ) -> Result<(), ClientError> {
        let total = remaining_components.len();
        if total == 0 {
            return Ok(());
        }
        let window = if maximum_duration.is_zero() { EFFECTIVELY_FOREVER } else { maximum_duration };

        let mut remaining = remaining_components.clone();
        let mut successes = 0usize;
        let mut failures = 0usize;
        let start = Instant::now();
        let mut last_log = Instant::now()
            .checked_sub(STATUS_LOG_INTERVAL)
            .unwrap_or_else(Instant::now);

        while !remaining.is_empty() && start.elapsed() < window {
            let ids: Vec<String> = remaining.iter().map(|n| n.as_str().to_string()).collect();
            let mut statuses: HashMap<String, String> = HashMap::new();
            for chunk in ids.chunks(STATUS_CHUNK_SIZE) {
                statuses.extend(self.client.component_status(chunk).await?);
            }

            let mut configured = Vec::new();
            let mut failed_now = Vec::new();
            let mut pending = HashSet::new();
            for node in &remaining {
                match statuses.get(node.as_str()).map(String::as_str) {
                    Some("configured") => configured.push(node.clone()),
                    Some("pending") => {
                        pending.insert(node.clone());
                    }
                    // explicit failure, disappeared from the response, or an
                    // unrecognised status all count as a failure.
                    Some(_) | None => failed_now.push(node.clone()),
                }
            }

            if !configured.is_empty() {
                successes += configured.len();
                recorder.move_nodes(phase, Category::InProgress, Category::Succeeded, configured).await.ok();
            }
            if !failed_now.is_empty() {
                failures += failed_now.len();
                boot_set_failed.extend(failed_now.iter().cloned());
                recorder.move_nodes(phase, Category::InProgress, Category::Failed, failed_now.clone()).await.ok();
                let mut errs = HashMap::new();
                errs.insert("configuration failed or status unavailable".to_string(), failed_now);
                recorder.update_errors(phase, errs).await.ok();
            }

            if (failures as f64) > (1.0 - success_threshold) * (total as f64) {
                return Err(ClientError::ExhaustedRetries(failures, total));
            }

            remaining = pending;
            if remaining.is_empty() {
                break;
            }
            if last_log.elapsed() >= STATUS_LOG_INTERVAL {
                info!(remaining = remaining.len(), total, "waiting for configuration to converge");
                last_log = Instant::now();
            }
            sleep(check_interval).await;
        }

        if remaining.is_empty() {
            return Ok(());
        }
        if (successes as f64) >= success_threshold * (total as f64) {
            warn!(remaining = remaining.len(), "nodes may still be configuring after timeout");
            return Ok(());
        }
        Err(ClientError::ConfigurationTimeout(successes, total))
    }
}
