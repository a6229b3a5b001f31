use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use boa_clients::{ArtifactResolver, BootScriptRegistrar, ConfigurationDriver, GracefulParams, PowerController, PowerState, StateWaiter};
use boa_domain::{BootSet, Category, CfsSpec, NodeId, Operation, PhaseName};
use boa_nodeset::{Inventory, NodeSetResolver};
use boa_status::{BootSetStatusHandle, PhaseStatusHandle, SessionStatusHandle, StatusRecorder};
use chrono::Utc;
use tracing::{info, warn};

use crate::error::ExecutorError;

/// The env-sourced polling/timeout knobs a Phase needs, threaded down from
/// `EnvConfig` without pulling `boa-config` into every call site.
#[derive(Debug, Clone, Copy)]
pub struct TimingParams {
    pub node_state_check_sleep_interval: u64,
    pub node_state_check_number_of_retries: i64,
    pub graceful_shutdown_timeout: u64,
    pub forceful_shutdown_timeout: u64,
    pub graceful_shutdown_prewait: u64,
    pub power_status_frequency: u64,
    pub cfs_completion_sleep_interval: u64,
}

/// The clients and shared services a Phase reaches for, already constructed
/// by the caller and shared across every Boot Set in a Session.
#[derive(Clone)]
pub struct PhaseClients {
    pub inventory: Arc<Inventory>,
    pub recorder: Arc<StatusRecorder>,
    pub artifacts: Arc<ArtifactResolver>,
    pub boot_script: Arc<BootScriptRegistrar>,
    pub power: Arc<PowerController>,
    pub state_waiter: Arc<StateWaiter>,
    pub config: Arc<ConfigurationDriver>,
}

/// What became of a Boot Set, for the Session-level summary.
#[derive(Debug, Default)]
pub struct BootSetReport {
    pub boot_set_name: String,
    pub failed_nodes: HashSet<NodeId>,
}

/// Runs one Boot Set's phase sequence to completion or first failure.
/// A phase failure stops the remaining phases for this Boot Set but never
/// the rest of the Session — that is `SessionCoordinator`'s concern.
pub struct PhaseExecutor {
    pub boot_set_name: String,
    pub boot_set: BootSet,
    pub operation: Operation,
    pub session_id: String,
    pub partition: Option<String>,
    pub limit: Option<String>,
    pub cfs: CfsSpec,
    pub enable_cfs: bool,
    pub session_configuration: Option<String>,
    pub timing: TimingParams,
    pub clients: PhaseClients,
}

impl PhaseExecutor {
    pub async fn run(self, session: SessionStatusHandle) -> Result<BootSetReport, ExecutorError> {
        let recorder = self.clients.recorder.clone();

        let resolver = NodeSetResolver::new(&self.clients.inventory);
        let split = resolver
            .resolve(&self.boot_set, self.limit.as_deref(), self.partition.as_deref())
            .await?;
        if !split.disabled.is_empty() {
            info!(boot_set = %self.boot_set_name, count = split.disabled.len(), "excluding disabled nodes from boot set");
        }
        let active = split.enabled;
        if active.is_empty() {
            info!(boot_set = %self.boot_set_name, "empty node set, skipping boot set");
            return Ok(BootSetReport {
                boot_set_name: self.boot_set_name,
                failed_nodes: HashSet::new(),
            });
        }

        let boot_set_handle = recorder.create_boot_set_status(&session, &self.boot_set_name, serde_json::json!({"operation": self.operation.to_string()})).await?;
        recorder.update_metadata(&boot_set_handle, None, Some(Utc::now()), None).await?;

        let mut boot_set_failed: HashSet<NodeId> = HashSet::new();
        let phases = boa_domain::phases_for(self.operation);

        for &phase_name in phases {
            // Nodes a prior phase already gave up on don't get another phase
            // to fail in — a Boot Set narrows over its phases, it doesn't retry.
            let remaining: HashSet<NodeId> = active.difference(&boot_set_failed).cloned().collect();
            if remaining.is_empty() {
                info!(boot_set = %self.boot_set_name, phase = %phase_name, "no nodes remaining, skipping phase");
                continue;
            }

            let phase_handle = recorder.create_phase_status(&boot_set_handle, phase_name, serde_json::json!({})).await?;
            reset_phase_to_not_started(&recorder, &phase_handle, &remaining).await;
            recorder.update_metadata(&boot_set_handle, Some(phase_name), Some(Utc::now()), None).await?;

            let outcome = self.run_phase(phase_name, &remaining, &phase_handle, &recorder, &mut boot_set_failed).await;

            recorder.update_metadata(&boot_set_handle, Some(phase_name), None, Some(Utc::now())).await?;

            if let Err(e) = outcome {
                warn!(boot_set = %self.boot_set_name, phase = %phase_name, error = %e, "phase failed, skipping remaining phases for this boot set");
                recorder.update_metadata(&boot_set_handle, None, None, Some(Utc::now())).await?;
                return Err(e);
            }
        }

        recorder.update_metadata(&boot_set_handle, None, None, Some(Utc::now())).await?;
        Ok(BootSetReport {
            boot_set_name: self.boot_set_name,
            failed_nodes: boot_set_failed,
        })
    }

    async fn run_phase(
        &self,
        phase_name: PhaseName,
        active: &HashSet<NodeId>,
        phase: &PhaseStatusHandle,
        recorder: &StatusRecorder,
        boot_set_failed: &mut HashSet<NodeId>,
    ) -> Result<(), ExecutorError> {
        match phase_name {
            PhaseName::StageConfiguration => self.phase_stage_configuration(active, phase, recorder).await,
            PhaseName::Shutdown => self.phase_shutdown(active, phase, recorder, boot_set_failed).await,
            PhaseName::Boot => self.phase_boot(active, phase, recorder, boot_set_failed).await,
            PhaseName::WaitForConfiguration => self.phase_wait_for_configuration(active, phase, recorder, boot_set_failed).await,
        }
    }

    /// Submit the desired CFS configuration. `enabled` tracks the configure
    /// operation only — boot/reboot defer enabling the layer so CFS doesn't
    /// race the pending power transition.
    async fn phase_stage_configuration(&self, active: &HashSet<NodeId>, phase: &PhaseStatusHandle, recorder: &StatusRecorder) -> Result<(), ExecutorError> {
        if !self.enable_cfs {
            return Ok(());
        }
        recorder.move_nodes(phase, Category::NotStarted, Category::InProgress, active.iter().cloned().collect()).await?;

        let config_name = self
            .clients
            .config
            .resolve_configuration_name(self.session_configuration.as_deref(), &self.cfs)
            .await?;
        let nodes: Vec<NodeId> = active.iter().cloned().collect();
        let enabled = self.operation == Operation::Configure;
        self.clients.config.stage_configuration(&nodes, enabled, &config_name).await?;

        recorder.move_nodes(phase, Category::InProgress, Category::Succeeded, nodes).await?;
        Ok(())
    }

    /// Graceful-then-forceful shutdown, with an extra Ready-drain wait for
    /// reboot so the subsequent boot phase doesn't race a node still going
    /// down.
    async fn phase_shutdown(&self, active: &HashSet<NodeId>, phase: &PhaseStatusHandle, recorder: &StatusRecorder, boot_set_failed: &mut HashSet<NodeId>) -> Result<(), ExecutorError> {
        recorder.move_nodes(phase, Category::NotStarted, Category::InProgress, active.iter().cloned().collect()).await?;

        let params = GracefulParams {
            grace_window: self.timing.graceful_shutdown_timeout,
            hard_window: self.timing.forceful_shutdown_timeout,
            graceful_prewait: self.timing.graceful_shutdown_prewait,
            frequency: self.timing.power_status_frequency,
        };
        let (failed, errors) = self.clients.power.graceful_shutdown(active, params, "BOA shutdown").await?;
        let succeeded: HashSet<NodeId> = active.difference(&failed).cloned().collect();

        if !succeeded.is_empty() {
            recorder.move_nodes(phase, Category::InProgress, Category::Succeeded, succeeded.iter().cloned().collect()).await?;
        }
        if !failed.is_empty() {
            recorder.move_nodes(phase, Category::InProgress, Category::Failed, failed.iter().cloned().collect()).await?;
            recorder.update_errors(phase, errors).await?;
            boot_set_failed.extend(failed.iter().cloned());
        }
        if failed.len() == active.len() {
            return Err(ExecutorError::Internal(format!("all {} nodes in boot set {} failed to shut down", failed.len(), self.boot_set_name)));
        }

        if self.operation == Operation::Reboot && !succeeded.is_empty() {
            self.clients
                .state_waiter
                .wait_for_state(
                    &succeeded,
                    "Ready",
                    true,
                    Duration::from_secs(self.timing.node_state_check_sleep_interval),
                    self.timing.node_state_check_number_of_retries,
                    recorder,
                    phase,
                    Category::Succeeded,
                )
                .await?;
        }

        Ok(())
    }

    /// Resolve artifacts, upsert boot-script parameters, skip nodes already
    /// on, power the rest on, and wait for Ready.
    async fn phase_boot(&self, active: &HashSet<NodeId>, phase: &PhaseStatusHandle, recorder: &StatusRecorder, boot_set_failed: &mut HashSet<NodeId>) -> Result<(), ExecutorError> {
        recorder.move_nodes(phase, Category::NotStarted, Category::InProgress, active.iter().cloned().collect()).await?;

        let path = self.boot_set.path.clone().unwrap_or_default();
        let artifacts = self.clients.artifacts.resolve(&path, self.boot_set.etag.as_deref()).await?;

        let provider = boa_clients::make_rootfs_provider(
            self.boot_set.rootfs_provider.as_deref().unwrap_or("cpss3"),
            artifacts.rootfs_url.clone(),
            artifacts.rootfs_etag.clone(),
            self.boot_set.rootfs_provider_passthrough.clone(),
        )?;

        let image_params = match &artifacts.boot_parameters_url {
            Some(url) => Some(self.clients.artifacts.fetch_text(url).await?),
            None => None,
        };
        let cmdline = boa_clients::build_kernel_cmdline(image_params.as_deref(), self.boot_set.kernel_parameters.as_deref(), provider.as_ref(), &self.session_id);

        let nodes: Vec<NodeId> = active.iter().cloned().collect();
        self.clients.boot_script.upsert(&nodes, &cmdline, &artifacts.kernel_url, &artifacts.initrd_url).await?;

        let (buckets, status_failed, status_errors) = self.clients.power.status(active, "show_all").await?;
        let already_on = buckets.get("on").cloned().unwrap_or_default();
        if !already_on.is_empty() {
            recorder.move_nodes(phase, Category::InProgress, Category::Succeeded, already_on.iter().cloned().collect()).await?;
        }
        if !status_failed.is_empty() {
            recorder.move_nodes(phase, Category::InProgress, Category::Failed, status_failed.iter().cloned().collect()).await?;
            recorder.update_errors(phase, status_errors).await?;
            boot_set_failed.extend(status_failed.iter().cloned());
        }

        let to_power_on: HashSet<NodeId> = active.difference(&already_on).cloned().filter(|n| !status_failed.contains(n)).collect();
        let mut ready_targets = already_on;

        if !to_power_on.is_empty() {
            let (power_failed, power_errors) = self.clients.power.power(&to_power_on, PowerState::On, false, "BOA boot").await?;
            if !power_failed.is_empty() {
                recorder.move_nodes(phase, Category::InProgress, Category::Failed, power_failed.iter().cloned().collect()).await?;
                recorder.update_errors(phase, power_errors).await?;
                boot_set_failed.extend(power_failed.iter().cloned());
            }
            let powered: HashSet<NodeId> = to_power_on.difference(&power_failed).cloned().collect();
            ready_targets.extend(powered);
        }

        if !ready_targets.is_empty() {
            let not_ready = self
                .clients
                .state_waiter
                .wait_for_state(
                    &ready_targets,
                    "Ready",
                    false,
                    Duration::from_secs(self.timing.node_state_check_sleep_interval),
                    self.timing.node_state_check_number_of_retries,
                    recorder,
                    phase,
                    Category::Succeeded,
                )
                .await?;
            boot_set_failed.extend(not_ready);
        }

        Ok(())
    }

    async fn phase_wait_for_configuration(&self, active: &HashSet<NodeId>, phase: &PhaseStatusHandle, recorder: &StatusRecorder, boot_set_failed: &mut HashSet<NodeId>) -> Result<(), ExecutorError> {
        if !self.enable_cfs {
            return Ok(());
        }
        recorder.move_nodes(phase, Category::NotStarted, Category::InProgress, active.iter().cloned().collect()).await?;

        self.clients
            .config
            .wait_for_configuration(
                active,
                Duration::from_secs(0),
                Duration::from_secs(self.timing.cfs_completion_sleep_interval),
                1.0,
                recorder,
                phase,
                boot_set_failed,
            )
            .await?;
        Ok(())
    }
}

/// On a fresh Phase record this is a set of no-op PATCHes; on a re-entered
/// one it guarantees every node starts this run in `not_started` regardless
/// of where a prior attempt left it. The status service has
/// no read endpoint to learn the prior category, so every non-`not_started`
/// category is swept unconditionally — a fixed, small cost for idempotent
/// re-entry. Failures are logged and swallowed by the recorder already.
async fn reset_phase_to_not_started(recorder: &StatusRecorder, phase: &PhaseStatusHandle, active: &HashSet<NodeId>) {
    let nodes: Vec<NodeId> = active.iter().cloned().collect();
    let by_category = [Category::InProgress, Category::Succeeded, Category::Failed, Category::Excluded]
        .into_iter()
        .map(|c| (c, nodes.clone()))
        .collect();
    let _ = recorder.move_to_not_started(phase, &by_category).await;
}
