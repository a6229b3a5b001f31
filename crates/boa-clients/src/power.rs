use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use boa_domain::NodeId;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::ClientError;

/// The vendor power-control envelope shared by `get_xname_status` and the
/// `_on`/`_off` actions.
#[derive(Debug, Clone, Default)]
pub struct VendorResponse {
    pub e: i64,
    pub err_msg: String,
    pub undefined: Vec<NodeId>,
    pub xnames: Vec<VendorXnameError>,
}

#[derive(Debug, Clone)]
pub struct VendorXnameError {
    pub xname: NodeId,
    pub e: i64,
    pub err_msg: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
}

/// CAPMC node lock error. The controller attributes this to every target
/// node not already blamed for something more specific.
const CAPMC_NODE_LOCK_ERROR: i64 = 37;

const RETRY_EXCEEDED_MSG: &str = "exceeded retries waiting for component to be Off";

/// Parse a vendor response against the node set it was issued for into
/// `(failed_nodes, reasons)`.
pub fn parse_response(resp: &VendorResponse, targeted: &HashSet<NodeId>) -> (HashSet<NodeId>, HashMap<String, Vec<NodeId>>) {
    if resp.e == 0 {
        return (HashSet::new(), HashMap::new());
    }

    let mut failed: HashSet<NodeId> = resp.undefined.iter().cloned().collect();
    let mut attributed = failed.clone();
    let mut reasons: HashMap<String, Vec<NodeId>> = HashMap::new();

    for entry in &resp.xnames {
        if entry.e != 0 {
            failed.insert(entry.xname.clone());
            attributed.insert(entry.xname.clone());
            reasons.entry(entry.err_msg.clone()).or_default().push(entry.xname.clone());
        }
    }

    if resp.e == CAPMC_NODE_LOCK_ERROR {
        for node in targeted {
            if !attributed.contains(node) {
                failed.insert(node.clone());
                reasons.entry(resp.err_msg.clone()).or_default().push(node.clone());
            }
        }
    }

    (failed, reasons)
}

/// The power-control vendor's query surface.
#[async_trait]
pub trait PowerClient: Send + Sync {
    /// Bulk power-state query. Returns the state→nodes buckets plus any
    /// vendor error envelope.
    async fn get_xname_status(&self, targets: &HashSet<NodeId>, filter: &str) -> Result<(HashMap<String, HashSet<NodeId>>, VendorResponse), ClientError>;

    async fn power(&self, nodes: &HashSet<NodeId>, state: PowerState, force: bool, reason: &str) -> Result<VendorResponse, ClientError>;
}

#[derive(Debug, Clone, Copy)]
pub struct GracefulParams {
    pub grace_window: u64,
    pub hard_window: u64,
    pub graceful_prewait: u64,
    pub frequency: u64,
}

/// Powers nodes on/off and drives the graceful→forceful shutdown state
/// machine.
pub struct PowerController {
    client: Arc<dyn PowerClient>,
}

impl PowerController {
    pub fn new(client: Arc<dyn PowerClient>) -> Self {
        PowerController { client }
    }

    pub async fn status(&self, targets: &HashSet<NodeId>, filter: &str) -> Result<(HashMap<String, HashSet<NodeId>>, HashSet<NodeId>, HashMap<String, Vec<NodeId>>), ClientError> {
        let (buckets, vendor) = self.client.get_xname_status(targets, filter).await?;
        let (failed, reasons) = parse_response(&vendor, targets);
        Ok((buckets, failed, reasons))
    }

    fn reject_legacy(nodes: &HashSet<NodeId>) -> Result<(), ClientError> {
        if let Some(legacy) = nodes.iter().find(|n| n.is_legacy()) {
            return Err(ClientError::LegacyNodeName(legacy.to_string()));
        }
        Ok(())
    }

    pub async fn power(&self, nodes: &HashSet<NodeId>, state: PowerState, force: bool, reason: &str) -> Result<(HashSet<NodeId>, HashMap<String, Vec<NodeId>>), ClientError> {
        if nodes.is_empty() {
            return Ok((HashSet::new(), HashMap::new()));
        }
        Self::reject_legacy(nodes)?;
        let vendor = self.client.power(nodes, state, force, reason).await?;
        Ok(parse_response(&vendor, nodes))
    }

    /// Graceful then forceful shutdown: `QUERY → GRACEFUL →
    /// WAIT_OFF_G → FORCEFUL → WAIT_OFF_F → DONE`. Returns the nodes that
    /// never confirmed Off and the reasons accumulated along the way.
    pub async fn graceful_shutdown(&self, targets: &HashSet<NodeId>, params: GracefulParams, reason: &str) -> Result<(HashSet<NodeId>, HashMap<String, Vec<NodeId>>), ClientError> {
        let mut failed_nodes: HashSet<NodeId> = HashSet::new();
        let mut errors: HashMap<String, Vec<NodeId>> = HashMap::new();

        // QUERY
        let (buckets, q_failed, q_errors) = self.status(targets, "show_all").await?;
        merge_errors(&mut errors, q_errors);
        failed_nodes.extend(q_failed.iter().cloned());
        let off = buckets.get("off").cloned().unwrap_or_default();
        let mut nodes_on: HashSet<NodeId> = targets.difference(&off).cloned().collect();
        nodes_on = nodes_on.difference(&failed_nodes).cloned().collect();

        // GRACEFUL
        if nodes_on.is_empty() {
            return Ok((failed_nodes, errors));
        }
        let (g_failed, mut g_errors) = self.power(&nodes_on, PowerState::Off, false, reason).await?;
        let retried = g_errors.remove(RETRY_EXCEEDED_MSG).unwrap_or_default();
        let mut g_failed_counted = g_failed;
        for n in &retried {
            g_failed_counted.remove(n);
        }
        merge_errors(&mut errors, g_errors);
        nodes_on = nodes_on.difference(&g_failed_counted).cloned().collect();
        failed_nodes.extend(g_failed_counted);
        sleep(Duration::from_secs(params.graceful_prewait)).await;

        // WAIT_OFF_G
        nodes_on = self
            .wait_off(&nodes_on, Duration::from_secs(params.grace_window), Duration::from_secs(params.frequency), &mut failed_nodes, &mut errors)
            .await?;

        // FORCEFUL
        if nodes_on.is_empty() {
            return Ok((failed_nodes, errors));
        }
        let (f_failed, f_errors) = self.power(&nodes_on, PowerState::Off, true, reason).await?;
        merge_errors(&mut errors, f_errors);
        nodes_on = nodes_on.difference(&f_failed).cloned().collect();
        failed_nodes.extend(f_failed);

        // WAIT_OFF_F
        nodes_on = self
            .wait_off(&nodes_on, Duration::from_secs(params.hard_window), Duration::from_secs(params.frequency), &mut failed_nodes, &mut errors)
            .await?;

        // DONE
        if !nodes_on.is_empty() {
            warn!(count = nodes_on.len(), "nodes still powered on after hard shutdown window");
            for node in &nodes_on {
                errors.entry("still powered on after hard shutdown window".to_string()).or_default().push(node.clone());
            }
            failed_nodes.extend(nodes_on);
        }

        Ok((failed_nodes, errors))
    }

    async fn wait_off(
        &self,
        nodes_on: &HashSet<NodeId>,
        window: Duration,
        frequency: Duration,
        failed_nodes: &mut HashSet<NodeId>,
        errors: &mut HashMap<String, Vec<NodeId>>,
    ) -> Result<HashSet<NodeId>, ClientError> {
        let mut remaining = nodes_on.clone();
        let start = Instant::now();
        while !remaining.is_empty() && start.elapsed() < window {
            sleep(frequency).await;
            let (buckets, q_failed, q_errors) = self.status(&remaining, "show_all").await?;
            merge_errors(errors, q_errors);
            failed_nodes.extend(q_failed.iter().cloned());
            let off = buckets.get("off").cloned().unwrap_or_default();
            remaining = remaining.difference(&off).cloned().collect();
            remaining = remaining.difference(&q_failed).cloned().collect();
        }
        info!(remaining = remaining.len(), "shutdown wait window elapsed");
        Ok(remaining)
    }
}

fn merge_errors(into: &mut HashMap<String, Vec<NodeId>>, from: HashMap<String, Vec<NodeId>>) {
    for (k, mut v) in from {
        into.entry(k).or_default().append(&mut v);
    }
}
