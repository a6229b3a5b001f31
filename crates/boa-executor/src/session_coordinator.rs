use std::sync::Arc;

use boa_config::EnvConfig;
use boa_domain::Session;
use boa_status::StatusRecorder;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::ExecutorError;
use crate::phase_executor::{BootSetReport, PhaseClients, PhaseExecutor, TimingParams};

impl From<&EnvConfig> for TimingParams {
    fn from(env: &EnvConfig) -> Self {
        TimingParams {
            node_state_check_sleep_interval: env.node_state_check_sleep_interval,
            node_state_check_number_of_retries: env.node_state_check_number_of_retries,
            graceful_shutdown_timeout: env.graceful_shutdown_timeout,
            forceful_shutdown_timeout: env.forceful_shutdown_timeout,
            graceful_shutdown_prewait: env.graceful_shutdown_prewait,
            power_status_frequency: env.power_status_frequency,
            cfs_completion_sleep_interval: env.cfs_completion_sleep_interval,
        }
    }
}

/// A Boot Set's outcome plus whatever error ended it early, if any.
#[derive(Debug)]
pub struct BootSetOutcome {
    pub report: Option<BootSetReport>,
    pub error: Option<String>,
}

/// The outcome of a whole Session run: one entry per Boot Set that
/// was actually attempted, in completion order.
#[derive(Debug, Default)]
pub struct SessionReport {
    pub boot_sets: Vec<(String, BootSetOutcome)>,
}

impl SessionReport {
    pub fn has_failures(&self) -> bool {
        self.boot_sets.iter().any(|(_, outcome)| outcome.error.is_some() || outcome.report.as_ref().map_or(false, |r| !r.failed_nodes.is_empty()))
    }
}

/// Runs every Boot Set in a Session concurrently, one task each, and
/// aggregates their outcomes. A failing Boot Set never stops its
/// siblings — only its own remaining phases.
pub struct SessionCoordinator {
    session: Session,
    timing: TimingParams,
    clients: PhaseClients,
}

impl SessionCoordinator {
    pub fn new(session: Session, timing: TimingParams, clients: PhaseClients) -> Self {
        SessionCoordinator { session, timing, clients }
    }

    pub async fn run(self) -> Result<SessionReport, ExecutorError> {
        let recorder: Arc<StatusRecorder> = self.clients.recorder.clone();
        let session_handle = recorder
            .create_session(&self.session.session_id, serde_json::json!({"operation": self.session.operation.to_string()}))
            .await?;

        let cfs = self.session.cfs.clone().unwrap_or_default();
        let (tx, mut rx) = mpsc::channel::<(String, String)>(self.session.boot_sets.len().max(1));

        let mut handles: Vec<(String, JoinHandle<Result<BootSetReport, ExecutorError>>)> = Vec::new();

        for (name, boot_set) in &self.session.boot_sets {
            if boot_set.has_no_node_source() {
                warn!(boot_set = %name, "boot set has no node source, skipping");
                continue;
            }

            let executor = PhaseExecutor {
                boot_set_name: name.clone(),
                boot_set: boot_set.clone(),
                operation: self.session.operation,
                session_id: self.session.session_id.clone(),
                partition: self.session.partition.clone(),
                limit: self.session.limit.clone(),
                cfs: cfs.clone(),
                enable_cfs: self.session.enable_cfs,
                session_configuration: cfs.configuration.clone(),
                timing: self.timing,
                clients: self.clients.clone(),
            };
            let session_handle = session_handle.clone();
            let tx = tx.clone();
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                let result = executor.run(session_handle).await;
                if let Err(ref e) = result {
                    let _ = tx.send((task_name, e.to_string())).await;
                }
                result
            });
            handles.push((name.clone(), handle));
        }
        drop(tx);

        let mut report = SessionReport::default();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(boot_set_report)) => {
                    info!(boot_set = %name, failed = boot_set_report.failed_nodes.len(), "boot set finished");
                    report.boot_sets.push((name, BootSetOutcome { report: Some(boot_set_report), error: None }));
                }
                Ok(Err(e)) => {
                    report.boot_sets.push((name, BootSetOutcome { report: None, error: Some(e.to_string()) }));
                }
                Err(join_err) => {
                    report.boot_sets.push((
                        name,
                        BootSetOutcome {
                            report: None,
                            error: Some(format!("boot set task panicked: {}", join_err)),
                        },
                    ));
                }
            }
        }

        while let Ok((name, msg)) = rx.try_recv() {
            warn!(boot_set = %name, error = %msg, "boot set reported exception");
        }

        Ok(report)
    }
}
