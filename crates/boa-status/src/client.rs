use std::collections::HashMap;

use async_trait::async_trait;
use boa_domain::{Category, NodeId, PhaseName};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StatusError;

/// A single move of nodes between categories within a Phase, carried as one
/// batched PATCH.
#[derive(Debug, Clone, Serialize)]
pub struct NodeChangeList {
    pub src: Category,
    pub dst: Category,
    pub nodes: Vec<NodeId>,
}

/// `GenericMetadata` PATCH body: start/stop time for a Boot Set or a Phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenericMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<DateTime<Utc>>,
}

/// `NodeErrorsList` PATCH body: error message to the nodes it applies to.
#[derive(Debug, Clone, Serialize)]
pub struct NodeErrorsList {
    pub errors: HashMap<String, Vec<NodeId>>,
}

/// The status service's wire surface. A thin HTTP veneer is expected
/// in production; tests substitute an in-memory fake.
#[async_trait]
pub trait StatusClient: Send + Sync {
    async fn create_session(&self, session_id: &str, body: serde_json::Value) -> Result<(), StatusError>;

    async fn create_boot_set(&self, session_id: &str, boot_set: &str, body: serde_json::Value) -> Result<(), StatusError>;

    async fn create_phase(&self, session_id: &str, boot_set: &str, phase: PhaseName, body: serde_json::Value) -> Result<(), StatusError>;

    async fn patch_move_nodes(
        &self,
        session_id: &str,
        boot_set: &str,
        phase: Option<PhaseName>,
        change: &NodeChangeList,
    ) -> Result<(), StatusError>;

    async fn patch_metadata(
        &self,
        session_id: &str,
        boot_set: &str,
        phase: Option<PhaseName>,
        meta: &GenericMetadata,
    ) -> Result<(), StatusError>;

    async fn patch_errors(
        &self,
        session_id: &str,
        boot_set: &str,
        phase: PhaseName,
        errors: &NodeErrorsList,
    ) -> Result<(), StatusError>;
}
