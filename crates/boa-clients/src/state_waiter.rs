use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use boa_domain::{Category, NodeId};
use boa_nodeset::HardwareStateClient;
use boa_status::{PhaseStatusHandle, StatusRecorder};
use tokio::time::sleep;
use tracing::info;

use crate::error::ClientError;

/// Polls the hardware state service for named-state convergence and reports
/// progress into a Phase as nodes arrive.
pub struct StateWaiter {
    hsm: Arc<dyn HardwareStateClient>,
}

impl StateWaiter {
    pub fn new(hsm: Arc<dyn HardwareStateClient>) -> Self {
        StateWaiter { hsm }
    }

    async fn poll_matching(&self, nodes: &HashSet<NodeId>, state: &str, invert: bool) -> Result<(HashSet<NodeId>, HashSet<NodeId>), ClientError> {
        let states = self.hsm.node_states(nodes).await.map_err(|e| ClientError::Http {
            service: "hsm-state",
            message: e.to_string(),
        })?;
        let mut matching = HashSet::new();
        let mut non_matching = HashSet::new();
        for node in nodes {
            let is_state = states.get(node).map(|s| s.state == state).unwrap_or(false);
            if is_state != invert {
                matching.insert(node.clone());
            } else {
                non_matching.insert(node.clone());
            }
        }
        Ok((matching, non_matching))
    }

    /// Retry-count-bounded wait. Moves newly-matching nodes
    /// into `dst_category` as they arrive; on retry exhaustion moves
    /// stragglers to `failed`. Raises [`ClientError::NodesNotReady`] only if
    /// *none* of the original nodes ever matched.
    #[allow(clippy::too_many_arguments)]
    pub async fn wait_for_state(
        &self,
        nodes: &HashSet<NodeId>,
        state: &str,
        invert: bool,
        sleep_time: Duration,
        allowed_retries: i64,
        recorder: &StatusRecorder,
        phase: &PhaseStatusHandle,
        dst_category: Category,
    ) -> Result<HashSet<NodeId>, ClientError> {
        let total = nodes.len();
        let mut remaining = nodes.clone();
        let mut ever_matched = 0usize;
        let mut poll_count: i64 = 0;

        loop {
            if remaining.is_empty() {
                break;
            }
            let (matching, non_matching) = self.poll_matching(&remaining, state, invert).await?;
            if !matching.is_empty() {
                ever_matched += matching.len();
                recorder
                    .move_nodes(phase, Category::InProgress, dst_category, matching.into_iter().collect())
                    .await
                    .ok();
            }
            remaining = non_matching;
            if remaining.is_empty() {
                break;
            }

            poll_count += 1;
            if allowed_retries >= 0 && poll_count > allowed_retries {
                recorder
                    .move_nodes(phase, Category::InProgress, Category::Failed, remaining.iter().cloned().collect())
                    .await
                    .ok();
                if ever_matched == 0 {
                    return Err(ClientError::NodesNotReady(remaining.len(), total));
                }
                return Ok(remaining);
            }
            sleep(sleep_time).await;
        }

        Ok(HashSet::new())
    }

    /// Duration-bounded wait with a success threshold. Returns the nodes
    /// that never reached `state`; raises when too few converged.
    pub async fn wait_for_state_with_threshold(&self, nodes: &HashSet<NodeId>, state: &str, duration: Duration, interval: Duration, success_threshold: f64) -> Result<HashSet<NodeId>, ClientError> {
        let total = nodes.len();
        let mut remaining = nodes.clone();
        let start = Instant::now();

        while !remaining.is_empty() && start.elapsed() < duration {
            let (matching, non_matching) = self.poll_matching(&remaining, state, invert_false()).await?;
            let _ = matching;
            remaining = non_matching;
            if remaining.is_empty() {
                break;
            }
            sleep(interval).await;
        }

        let converged = total - remaining.len();
        info!(converged, total, "state wait window elapsed");
        if (converged as f64) < success_threshold * (total as f64) {
            return Err(ClientError::NodesNotReady(remaining.len(), total));
        }
        Ok(remaining)
    }
}

/// `poll_matching`'s `invert` parameter read at the call site above — always
/// "waiting for the state to hold", never its negation, for the threshold
/// variant.
fn invert_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use boa_nodeset::NodeState;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeHsm {
        states: Mutex<HashMap<NodeId, NodeState>>,
    }

    #[async_trait]
    impl HardwareStateClient for FakeHsm {
        async fn groups(&self) -> Result<HashMap<String, std::collections::HashSet<NodeId>>, boa_nodeset::NodeSetError> {
            Ok(HashMap::new())
        }
        async fn partitions(&self) -> Result<HashMap<String, std::collections::HashSet<NodeId>>, boa_nodeset::NodeSetError> {
            Ok(HashMap::new())
        }
        async fn roles(&self, _p: Option<&str>) -> Result<HashMap<String, std::collections::HashSet<NodeId>>, boa_nodeset::NodeSetError> {
            Ok(HashMap::new())
        }
        async fn node_states(&self, nodes: &std::collections::HashSet<NodeId>) -> Result<HashMap<NodeId, NodeState>, boa_nodeset::NodeSetError> {
            let states = self.states.lock().unwrap();
            Ok(nodes.iter().filter_map(|n| states.get(n).map(|s| (n.clone(), s.clone()))).collect())
        }
    }

    use crate::tests_support::NoopStatusClient;

    fn node(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[tokio::test]
    async fn wait_for_state_succeeds_immediately_when_already_matching() {
        let mut states = HashMap::new();
        states.insert(node("n1"), NodeState { state: "Ready".into(), enabled: true });
        let hsm = Arc::new(FakeHsm { states: Mutex::new(states) });
        let waiter = StateWaiter::new(hsm);
        let recorder = StatusRecorder::new(Arc::new(NoopStatusClient));
        let phase = PhaseStatusHandle {
            session_id: "s".into(),
            boot_set: "b".into(),
            phase: boa_domain::PhaseName::Boot,
        };
        let nodes: std::collections::HashSet<NodeId> = [node("n1")].into_iter().collect();
        let failed = waiter
            .wait_for_state(&nodes, "Ready", false, Duration::from_millis(1), 3, &recorder, &phase, Category::Succeeded)
            .await
            .unwrap();
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn wait_for_state_raises_not_ready_when_nothing_ever_matches() {
        let states = HashMap::new();
        let hsm = Arc::new(FakeHsm { states: Mutex::new(states) });
        let waiter = StateWaiter::new(hsm);
        let recorder = StatusRecorder::new(Arc::new(NoopStatusClient));
        let phase = PhaseStatusHandle {
            session_id: "s".into(),
            boot_set: "b".into(),
            phase: boa_domain::PhaseName::Boot,
        };
        let nodes: std::collections::HashSet<NodeId> = [node("n1")].into_iter().collect();
        let err = waiter
            .wait_for_state(&nodes, "Ready", false, Duration::from_millis(1), 0, &recorder, &phase, Category::Succeeded)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NodesNotReady(_, _)));
    }
}
