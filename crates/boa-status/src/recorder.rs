use std::collections::HashMap;
use std::sync::Arc;

use boa_domain::{Category, NodeId, PhaseName};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::client::{GenericMetadata, NodeChangeList, NodeErrorsList, StatusClient};
use crate::error::StatusError;

/// Whether a write's failure propagates to the caller or is logged and
/// swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    Propagate,
    Swallow,
}

/// Handle to a Session's status record. Carries no I/O itself — it is a
/// reference the recorder's methods take alongside the Boot Set / Phase they
/// act on.
#[derive(Debug, Clone)]
pub struct SessionStatusHandle {
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct BootSetStatusHandle {
    pub session_id: String,
    pub boot_set: String,
}

#[derive(Debug, Clone)]
pub struct PhaseStatusHandle {
    pub session_id: String,
    pub boot_set: String,
    pub phase: PhaseName,
}

/// Creates, references and updates Session / Boot-Set / Phase status records
/// at the status service. Update-type calls are lossy by construction:
/// a failed PATCH is logged and swallowed so the status service can never
/// block the power/boot work it is only observing.
pub struct StatusRecorder {
    client: Arc<dyn StatusClient>,
}

impl StatusRecorder {
    pub fn new(client: Arc<dyn StatusClient>) -> Self {
        StatusRecorder { client }
    }

    async fn perform(&self, policy: WritePolicy, result: Result<(), StatusError>) -> Result<(), StatusError> {
        match result {
            Ok(()) => Ok(()),
            Err(StatusError::Conflict) => Ok(()),
            Err(e) => match policy {
                WritePolicy::Propagate => Err(e),
                WritePolicy::Swallow => {
                    warn!(error = %e, "status service write failed, continuing (lossy mode)");
                    Ok(())
                }
            },
        }
    }

    /// Creation always propagates, except a 409 which is the reference path.
    pub async fn create_session(&self, session_id: &str, body: serde_json::Value) -> Result<SessionStatusHandle, StatusError> {
        self.perform(WritePolicy::Propagate, self.client.create_session(session_id, body).await)
            .await?;
        Ok(SessionStatusHandle {
            session_id: session_id.to_string(),
        })
    }

    pub async fn create_boot_set_status(
        &self,
        session: &SessionStatusHandle,
        boot_set: &str,
        body: serde_json::Value,
    ) -> Result<BootSetStatusHandle, StatusError> {
        self.perform(
            WritePolicy::Propagate,
            self.client.create_boot_set(&session.session_id, boot_set, body).await,
        )
        .await?;
        Ok(BootSetStatusHandle {
            session_id: session.session_id.clone(),
            boot_set: boot_set.to_string(),
        })
    }

    pub async fn create_phase_status(
        &self,
        boot_set: &BootSetStatusHandle,
        phase: PhaseName,
        body: serde_json::Value,
    ) -> Result<PhaseStatusHandle, StatusError> {
        self.perform(
            WritePolicy::Propagate,
            self.client.create_phase(&boot_set.session_id, &boot_set.boot_set, phase, body).await,
        )
        .await?;
        Ok(PhaseStatusHandle {
            session_id: boot_set.session_id.clone(),
            boot_set: boot_set.boot_set.clone(),
            phase,
        })
    }

    pub async fn move_nodes(
        &self,
        phase: &PhaseStatusHandle,
        src: Category,
        dst: Category,
        nodes: Vec<NodeId>,
    ) -> Result<(), StatusError> {
        if nodes.is_empty() {
            return Ok(());
        }
        let change = NodeChangeList { src, dst, nodes };
        self.perform(
            WritePolicy::Swallow,
            self.client
                .patch_move_nodes(&phase.session_id, &phase.boot_set, Some(phase.phase), &change)
                .await,
        )
        .await
    }

    /// For each category other than `not_started`, move whatever nodes are
    /// named into `not_started`. Used on a fresh / re-entered run to
    /// reset prior-attempt categorisation before the phase begins.
    pub async fn move_to_not_started(&self, phase: &PhaseStatusHandle, nodes_by_category: &HashMap<Category, Vec<NodeId>>) -> Result<(), StatusError> {
        for category in Category::ALL {
            if category == Category::NotStarted {
                continue;
            }
            if let Some(nodes) = nodes_by_category.get(&category) {
                self.move_nodes(phase, category, Category::NotStarted, nodes.clone()).await?;
            }
        }
        Ok(())
    }

    /// `phase = None` updates the boot-set envelope rather than a specific
    /// Phase.
    pub async fn update_metadata(
        &self,
        boot_set: &BootSetStatusHandle,
        phase: Option<PhaseName>,
        start_time: Option<DateTime<Utc>>,
        stop_time: Option<DateTime<Utc>>,
    ) -> Result<(), StatusError> {
        let meta = GenericMetadata { start_time, stop_time };
        self.perform(
            WritePolicy::Swallow,
            self.client.patch_metadata(&boot_set.session_id, &boot_set.boot_set, phase, &meta).await,
        )
        .await
    }

    pub async fn update_errors(&self, phase: &PhaseStatusHandle, errors: HashMap<String, Vec<NodeId>>) -> Result<(), StatusError> {
        if errors.is_empty() {
            return Ok(());
        }
        let payload = NodeErrorsList { errors };
        self.perform(
            WritePolicy::Swallow,
            self.client.patch_errors(&phase.session_id, &phase.boot_set, phase.phase, &payload).await,
        )
        .await
    }
}
