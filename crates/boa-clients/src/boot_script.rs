use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use boa_domain::NodeId;

use crate::error::ClientError;

/// The boot-script service's query surface.
#[async_trait]
pub trait BootScriptClient: Send + Sync {
    /// Bulk lookup of hosts already known to the registry. A 404 from the
    /// service means "none known" and should surface here as an empty set,
    /// not an error.
    async fn known_hosts(&self, hosts: &[NodeId]) -> Result<HashSet<NodeId>, ClientError>;

    async fn put_hosts(&self, hosts: &[NodeId], params: &str, kernel: &str, initrd: &str) -> Result<(), ClientError>;
}

/// Upserts boot parameters for a set of hosts, splitting the PUT into a
/// known-hosts batch and an unknown-hosts batch. Both branches PUT; the
/// registry handles upsert semantics either way.
pub struct BootScriptRegistrar {
    client: Arc<dyn BootScriptClient>,
}

impl BootScriptRegistrar {
    pub fn new(client: Arc<dyn BootScriptClient>) -> Self {
        BootScriptRegistrar { client }
    }

    pub async fn upsert(&self, hosts: &[NodeId], params: &str, kernel: &str, initrd: &str) -> Result<(), ClientError> {
        if hosts.is_empty() {
            return Ok(());
        }
        let known = self.client.known_hosts(hosts).await?;
        let (known_hosts, unknown_hosts): (Vec<NodeId>, Vec<NodeId>) = hosts.iter().cloned().partition(|h| known.contains(h));

        if !known_hosts.is_empty() {
            self.client.put_hosts(&known_hosts, params, kernel, initrd).await?;
        }
        if !unknown_hosts.is_empty() {
            self.client.put_hosts(&unknown_hosts, params, kernel, initrd).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBootScript {
        known: HashSet<NodeId>,
        puts: Mutex<Vec<Vec<NodeId>>>,
    }

    #[async_trait]
    impl BootScriptClient for FakeBootScript {
        async fn known_hosts(&self, _hosts: &[NodeId]) -> Result<HashSet<NodeId>, ClientError> {
            Ok(self.known.clone())
        }
        async fn put_hosts(&self, hosts: &[NodeId], _params: &str, _kernel: &str, _initrd: &str) -> Result<(), ClientError> {
            self.puts.lock().unwrap().push(hosts.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn splits_known_and_unknown_into_separate_puts() {
        let client = Arc::new(FakeBootScript {
            known: [NodeId::new("n1")].into_iter().collect(),
            puts: Mutex::new(Vec::new()),
        });
        let registrar = BootScriptRegistrar::new(client.clone());
        registrar
            .upsert(&[NodeId::new("n1"), NodeId::new("n2")], "p", "k", "i")
            .await
            .unwrap();
        let puts = client.puts.lock().unwrap();
        assert_eq!(puts.len(), 2);
    }

    #[tokio::test]
    async fn empty_hosts_is_noop() {
        let client = Arc::new(FakeBootScript::default());
        let registrar = BootScriptRegistrar::new(client.clone());
        registrar.upsert(&[], "p", "k", "i").await.unwrap();
        assert!(client.puts.lock().unwrap().is_empty());
    }
}
