use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use boa_domain::NodeId;

use crate::error::NodeSetError;

/// Per-node `{State, Enabled}` as reported by the hardware state service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub state: String,
    pub enabled: bool,
}

/// The hardware state service's query surface: group/partition/role
/// listing and bulk node state. Implementations reach the real service over
/// HTTP; tests substitute an in-memory fake.
#[async_trait]
pub trait HardwareStateClient: Send + Sync {
    async fn groups(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError>;
    async fn partitions(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError>;
    /// `partition` scopes the role query when the Boot Set's Session names one.
    async fn roles(&self, partition: Option<&str>) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError>;
    async fn node_states(&self, nodes: &HashSet<NodeId>) -> Result<HashMap<NodeId, NodeState>, NodeSetError>;
}
