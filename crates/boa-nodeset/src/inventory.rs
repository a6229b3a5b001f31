use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use boa_domain::NodeId;
use tokio::sync::Mutex;
use tracing::warn;

use crate::client::HardwareStateClient;
use crate::error::NodeSetError;

#[derive(Default)]
struct Cache {
    groups: Option<HashMap<String, HashSet<NodeId>>>,
    partitions: Option<HashMap<String, HashSet<NodeId>>>,
    /// Keyed by the partition scope the roles were fetched with.
    roles: HashMap<Option<String>, HashMap<String, HashSet<NodeId>>>,
    warned: HashSet<String>,
}

/// Lazily-populated view over the hardware state service's groups, partitions
/// and roles. Each mapping is fetched once, on first use, and cached for
/// the lifetime of the Session — a Session never outlives one hardware state
/// snapshot.
pub struct Inventory {
    client: Arc<dyn HardwareStateClient>,
    cache: Mutex<Cache>,
}

impl Inventory {
    pub fn new(client: Arc<dyn HardwareStateClient>) -> Self {
        Inventory {
            client,
            cache: Mutex::new(Cache::default()),
        }
    }

    async fn groups(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        let mut cache = self.cache.lock().await;
        if cache.groups.is_none() {
            cache.groups = Some(self.client.groups().await?);
        }
        Ok(cache.groups.clone().unwrap())
    }

    async fn partitions(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        let mut cache = self.cache.lock().await;
        if cache.partitions.is_none() {
            cache.partitions = Some(self.client.partitions().await?);
        }
        Ok(cache.partitions.clone().unwrap())
    }

    async fn roles(&self, partition: Option<&str>) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        let key = partition.map(|p| p.to_string());
        let mut cache = self.cache.lock().await;
        if !cache.roles.contains_key(&key) {
            let roles = self.client.roles(partition).await?;
            cache.roles.insert(key.clone(), roles);
        }
        Ok(cache.roles.get(&key).cloned().unwrap())
    }

    /// Resolve a list of group labels to their union of nodes. Labels the
    /// hardware state service doesn't know about are logged once and skipped
    /// — never fatal.
    pub async fn resolve_groups(&self, labels: &[String]) -> Result<HashSet<NodeId>, NodeSetError> {
        let groups = self.groups().await?;
        self.union_known(&groups, labels, "group").await
    }

    /// Resolve a list of role names, scoped to `partition` when the Session
    /// names one, to their union of nodes.
    pub async fn resolve_roles(&self, roles_wanted: &[String], partition: Option<&str>) -> Result<HashSet<NodeId>, NodeSetError> {
        let roles = self.roles(partition).await?;
        self.union_known(&roles, roles_wanted, "role").await
    }

    /// Look up a single named entry across groups, partitions and roles, in
    /// that order — used by the limit grammar to resolve a bare token
    /// against whichever inventory dimension defines it.
    pub async fn lookup_named(&self, name: &str, partition: Option<&str>) -> Result<Option<HashSet<NodeId>>, NodeSetError> {
        if let Some(set) = self.groups().await?.get(name) {
            return Ok(Some(set.clone()));
        }
        if let Some(set) = self.partitions().await?.get(name) {
            return Ok(Some(set.clone()));
        }
        if let Some(set) = self.roles(partition).await?.get(name) {
            return Ok(Some(set.clone()));
        }
        Ok(None)
    }

    pub async fn node_states(
        &self,
        nodes: &HashSet<NodeId>,
    ) -> Result<HashMap<NodeId, crate::client::NodeState>, NodeSetError> {
        self.client.node_states(nodes).await
    }

    async fn union_known(
        &self,
        table: &HashMap<String, HashSet<NodeId>>,
        names: &[String],
        dimension: &str,
    ) -> Result<HashSet<NodeId>, NodeSetError> {
        let mut out = HashSet::new();
        let mut cache = self.cache.lock().await;
        for name in names {
            match table.get(name) {
                Some(set) => out.extend(set.iter().cloned()),
                None if !cache.warned.contains(name) => {
                    warn!(%name, %dimension, "unknown inventory entry, skipping");
                    cache.warned.insert(name.clone());
                }
                None => {}
            }
        }
        Ok(out)
    }
}
