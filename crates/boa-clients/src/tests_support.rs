use async_trait::async_trait;
use boa_domain::PhaseName;
use boa_status::{GenericMetadata, NodeChangeList, NodeErrorsList, StatusClient, StatusError};

/// A `StatusClient` that always succeeds and discards its input — shared
/// across this crate's unit tests wherever a `StatusRecorder` is needed only
/// as plumbing, not as the thing under test.
pub struct NoopStatusClient;

#[async_trait]
impl StatusClient for NoopStatusClient {
    async fn create_session(&self, _session_id: &str, _body: serde_json::Value) -> Result<(), StatusError> {
        Ok(())
    }
    async fn create_boot_set(&self, _session_id: &str, _boot_set: &str, _body: serde_json::Value) -> Result<(), StatusError> {
        Ok(())
    }
    async fn create_phase(&self, _session_id: &str, _boot_set: &str, _phase: PhaseName, _body: serde_json::Value) -> Result<(), StatusError> {
        Ok(())
    }
    async fn patch_move_nodes(&self, _session_id: &str, _boot_set: &str, _phase: Option<PhaseName>, _change: &NodeChangeList) -> Result<(), StatusError> {
        Ok(())
    }
    async fn patch_metadata(&self, _session_id: &str, _boot_set: &str, _phase: Option<PhaseName>, _meta: &GenericMetadata) -> Result<(), StatusError> {
        Ok(())
    }
    async fn patch_errors(&self, _session_id: &str, _boot_set: &str, _phase: PhaseName, _errors: &NodeErrorsList) -> Result<(), StatusError> {
        Ok(())
    }
}
