//! End-to-end Boot Set scenarios against in-memory fakes of all five external
//! subsystems, exercising `PhaseExecutor` the way the real CLI wires it up
//! but without any network I/O.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use boa_clients::{
    ArtifactResolver, BootScriptClient, BootScriptRegistrar, ClientError, ConfigurationClient, ConfigurationDriver, ObjectStoreClient, PowerClient, PowerController, StateWaiter, VendorResponse,
};
use boa_domain::{BootSet, Category, CfsSpec, NodeId, Operation, PhaseName};
use boa_executor::{PhaseClients, PhaseExecutor, TimingParams};
use boa_nodeset::{HardwareStateClient, Inventory, NodeSetError, NodeState};
use boa_status::{NodeChangeList, NodeErrorsList, StatusClient, StatusError, StatusRecorder};

fn node(s: &str) -> NodeId {
    NodeId::new(s)
}

fn nodes(names: &[&str]) -> HashSet<NodeId> {
    names.iter().map(|n| node(n)).collect()
}

/// Shared hardware-truth behind both the HSM and power-control fakes, since a
/// real reboot always observes the same underlying node through both
/// services.
#[derive(Default)]
struct World {
    powered_on: Mutex<HashSet<NodeId>>,
    /// Nodes that accept a power-off command but never actually go off.
    stuck_on: HashSet<NodeId>,
    /// Nodes that power on but never get reported Ready by the HSM.
    stuck_not_ready: HashSet<NodeId>,
}

struct FakeHsm(Arc<World>);

#[async_trait]
impl HardwareStateClient for FakeHsm {
    async fn groups(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        Ok(HashMap::new())
    }
    async fn partitions(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        Ok(HashMap::new())
    }
    async fn roles(&self, _partition: Option<&str>) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        Ok(HashMap::new())
    }
    async fn node_states(&self, requested: &HashSet<NodeId>) -> Result<HashMap<NodeId, NodeState>, NodeSetError> {
        let on = self.0.powered_on.lock().unwrap();
        Ok(requested
            .iter()
            .map(|n| {
                let ready = on.contains(n) && !self.0.stuck_not_ready.contains(n);
                (n.clone(), NodeState { state: if ready { "Ready".into() } else { "Off".into() }, enabled: true })
            })
            .collect())
    }
}

struct FakePower(Arc<World>);

#[async_trait]
impl PowerClient for FakePower {
    async fn get_xname_status(&self, targets: &HashSet<NodeId>, _filter: &str) -> Result<(HashMap<String, HashSet<NodeId>>, VendorResponse), ClientError> {
        let on = self.0.powered_on.lock().unwrap();
        let mut buckets = HashMap::new();
        let (on_set, off_set): (HashSet<NodeId>, HashSet<NodeId>) = targets.iter().cloned().partition(|n| on.contains(n));
        buckets.insert("on".to_string(), on_set);
        buckets.insert("off".to_string(), off_set);
        Ok((buckets, VendorResponse::default()))
    }

    async fn power(&self, nodes: &HashSet<NodeId>, state: boa_clients::PowerState, _force: bool, _reason: &str) -> Result<VendorResponse, ClientError> {
        let mut on = self.0.powered_on.lock().unwrap();
        for n in nodes {
            match state {
                boa_clients::PowerState::On => {
                    on.insert(n.clone());
                }
                boa_clients::PowerState::Off => {
                    if !self.0.stuck_on.contains(n) {
                        on.remove(n);
                    }
                }
            }
        }
        Ok(VendorResponse::default())
    }
}

struct FakeBootScript;

#[async_trait]
impl BootScriptClient for FakeBootScript {
    async fn known_hosts(&self, _hosts: &[NodeId]) -> Result<HashSet<NodeId>, ClientError> {
        Ok(HashSet::new())
    }
    async fn put_hosts(&self, _hosts: &[NodeId], _params: &str, _kernel: &str, _initrd: &str) -> Result<(), ClientError> {
        Ok(())
    }
}

struct FakeObjectStore;

#[async_trait]
impl ObjectStoreClient for FakeObjectStore {
    async fn head_etag(&self, _path: &str) -> Result<Option<String>, ClientError> {
        Ok(None)
    }
    async fn get_bytes(&self, _path: &str) -> Result<Vec<u8>, ClientError> {
        Ok(serde_json::json!({
            "artifacts": [
                {"type": "application/vnd.cray.image.kernel", "link": {"path": "s3://images/kernel"}},
                {"type": "application/vnd.cray.image.initrd", "link": {"path": "s3://images/initrd"}},
                {"type": "application/vnd.cray.image.rootfs.squashfs", "link": {"path": "s3://images/rootfs", "etag": "abc"}},
            ]
        })
        .to_string()
        .into_bytes())
    }
}

/// Always reports every requested component as already configured — enough
/// for Scenario D, which only needs `wait_for_configuration` to converge on
/// its first poll.
struct FakeConfig;

#[async_trait]
impl ConfigurationClient for FakeConfig {
    async fn stage(&self, _batch: Vec<boa_clients::ComponentDesiredConfig>) -> Result<(), ClientError> {
        Ok(())
    }
    async fn list_configurations(&self) -> Result<Vec<boa_clients::ConfigurationSummary>, ClientError> {
        Ok(Vec::new())
    }
    async fn create_configuration(&self, _name: &str, _layer: boa_clients::ConfigLayer) -> Result<(), ClientError> {
        Ok(())
    }
    async fn component_status(&self, ids: &[String]) -> Result<HashMap<String, String>, ClientError> {
        Ok(ids.iter().map(|id| (id.clone(), "configured".to_string())).collect())
    }
}

/// Records every `patch_move_nodes` call in order and tracks each node's
/// current category per (boot set, phase), so tests can assert both the
/// ordering (reset-before-work) and the final terminal state.
#[derive(Default)]
struct RecordingStatusClient {
    calls: Mutex<Vec<(String, PhaseName, Category, Category, Vec<NodeId>)>>,
    current: Mutex<HashMap<(String, String), Category>>,
}

impl RecordingStatusClient {
    fn seed(&self, boot_set: &str, phase: PhaseName, n: &NodeId, category: Category) {
        self.current.lock().unwrap().insert((boot_set.to_string(), key(phase, n)), category);
    }

    fn current_category(&self, boot_set: &str, phase: PhaseName, n: &NodeId) -> Option<Category> {
        self.current.lock().unwrap().get(&(boot_set.to_string(), key(phase, n))).copied()
    }

    /// Index into `calls` of the first `InProgress`-destined move for this
    /// boot set — everything before it is the re-entry reset sweep.
    fn first_in_progress_move(&self, boot_set: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|(bs, _, _, dst, _)| bs == boot_set && *dst == Category::InProgress)
    }

    fn moves_before(&self, boot_set: &str, idx: usize) -> Vec<(Category, Category, Vec<NodeId>)> {
        self.calls.lock().unwrap()[..idx]
            .iter()
            .filter(|(bs, ..)| bs == boot_set)
            .map(|(_, _, src, dst, nodes)| (*src, *dst, nodes.clone()))
            .collect()
    }
}

fn key(phase: PhaseName, n: &NodeId) -> String {
    format!("{}/{}", phase, n.as_str())
}

#[async_trait]
impl StatusClient for RecordingStatusClient {
    async fn create_session(&self, _session_id: &str, _body: serde_json::Value) -> Result<(), StatusError> {
        Ok(())
    }
    async fn create_boot_set(&self, _session_id: &str, _boot_set: &str, _body: serde_json::Value) -> Result<(), StatusError> {
        Ok(())
    }
    async fn create_phase(&self, _session_id: &str, _boot_set: &str, _phase: PhaseName, _body: serde_json::Value) -> Result<(), StatusError> {
        Ok(())
    }
    async fn patch_move_nodes(&self, _session_id: &str, boot_set: &str, phase: Option<PhaseName>, change: &NodeChangeList) -> Result<(), StatusError> {
        let phase = phase.expect("this test suite always moves nodes within a phase");
        self.calls.lock().unwrap().push((boot_set.to_string(), phase, change.src, change.dst, change.nodes.clone()));
        let mut current = self.current.lock().unwrap();
        for n in &change.nodes {
            current.insert((boot_set.to_string(), key(phase, n)), change.dst);
        }
        Ok(())
    }
    async fn patch_metadata(&self, _session_id: &str, _boot_set: &str, _phase: Option<PhaseName>, _meta: &boa_status::GenericMetadata) -> Result<(), StatusError> {
        Ok(())
    }
    async fn patch_errors(&self, _session_id: &str, _boot_set: &str, _phase: PhaseName, _errors: &NodeErrorsList) -> Result<(), StatusError> {
        Ok(())
    }
}

fn harness(world: Arc<World>, status: Arc<RecordingStatusClient>) -> PhaseClients {
    let hsm: Arc<dyn HardwareStateClient> = Arc::new(FakeHsm(world.clone()));
    let power: Arc<dyn PowerClient> = Arc::new(FakePower(world.clone()));
    let boot_script: Arc<dyn BootScriptClient> = Arc::new(FakeBootScript);
    let object_store: Arc<dyn ObjectStoreClient> = Arc::new(FakeObjectStore);
    let config: Arc<dyn ConfigurationClient> = Arc::new(FakeConfig);
    let status_client: Arc<dyn StatusClient> = status;

    PhaseClients {
        inventory: Arc::new(Inventory::new(hsm.clone())),
        recorder: Arc::new(StatusRecorder::new(status_client)),
        artifacts: Arc::new(ArtifactResolver::new(object_store)),
        boot_script: Arc::new(BootScriptRegistrar::new(boot_script)),
        power: Arc::new(PowerController::new(power)),
        state_waiter: Arc::new(StateWaiter::new(hsm)),
        config: Arc::new(ConfigurationDriver::new(config, "boa-".to_string(), String::new(), "site.yml".to_string())),
    }
}

fn fast_timing() -> TimingParams {
    TimingParams {
        node_state_check_sleep_interval: 0,
        node_state_check_number_of_retries: 3,
        graceful_shutdown_timeout: 1,
        forceful_shutdown_timeout: 1,
        graceful_shutdown_prewait: 0,
        power_status_frequency: 0,
        cfs_completion_sleep_interval: 0,
    }
}

fn executor(boot_set_name: &str, operation: Operation, enable_cfs: bool, node_list: &[&str], timing: TimingParams, clients: PhaseClients) -> PhaseExecutor {
    PhaseExecutor {
        boot_set_name: boot_set_name.to_string(),
        boot_set: BootSet {
            node_list: Some(node_list.iter().map(|s| s.to_string()).collect()),
            path: Some("s3://manifests/example".to_string()),
            ..Default::default()
        },
        operation,
        session_id: "sess-1".to_string(),
        partition: None,
        limit: None,
        cfs: CfsSpec::default(),
        enable_cfs,
        session_configuration: None,
        timing,
        clients,
    }
}

fn session_handle() -> boa_status::SessionStatusHandle {
    boa_status::SessionStatusHandle { session_id: "sess-1".to_string() }
}

#[tokio::test]
async fn scenario_a_clean_reboot_of_two_nodes() {
    let world = Arc::new(World {
        powered_on: Mutex::new(nodes(&["nA", "nB"])),
        ..Default::default()
    });
    let status = Arc::new(RecordingStatusClient::default());
    let clients = harness(world, status.clone());

    let report = executor("compute", Operation::Reboot, true, &["nA", "nB"], fast_timing(), clients)
        .run(session_handle())
        .await
        .expect("clean reboot should succeed");

    assert!(report.failed_nodes.is_empty());
    for n in ["nA", "nB"] {
        assert_eq!(status.current_category("compute", PhaseName::Shutdown, &node(n)), Some(Category::Succeeded));
        assert_eq!(status.current_category("compute", PhaseName::Boot, &node(n)), Some(Category::Succeeded));
    }
}

#[tokio::test]
async fn scenario_b_partial_power_off_failure() {
    let world = Arc::new(World {
        powered_on: Mutex::new(nodes(&["nA", "nB"])),
        stuck_on: nodes(&["nB"]),
        ..Default::default()
    });
    let status = Arc::new(RecordingStatusClient::default());
    let clients = harness(world, status.clone());

    let report = executor("compute", Operation::Reboot, true, &["nA", "nB"], fast_timing(), clients)
        .run(session_handle())
        .await
        .expect("one stuck node must not fail the whole boot set");

    assert_eq!(report.failed_nodes, nodes(&["nB"]));
    assert_eq!(status.current_category("compute", PhaseName::Shutdown, &node("nA")), Some(Category::Succeeded));
    assert_eq!(status.current_category("compute", PhaseName::Shutdown, &node("nB")), Some(Category::Failed));
    assert_eq!(status.current_category("compute", PhaseName::Boot, &node("nA")), Some(Category::Succeeded));
    // nB failed Shutdown, so the Boot Set narrows and nB never gets a Boot phase entry at all.
    assert_eq!(status.current_category("compute", PhaseName::Boot, &node("nB")), None);
}

#[tokio::test]
async fn scenario_c_all_boots_fail() {
    let world = Arc::new(World {
        powered_on: Mutex::new(HashSet::new()),
        stuck_not_ready: nodes(&["nA", "nB"]),
        ..Default::default()
    });
    let status = Arc::new(RecordingStatusClient::default());
    let clients = harness(world, status.clone());

    let err = executor("compute", Operation::Boot, false, &["nA", "nB"], fast_timing(), clients).run(session_handle()).await.unwrap_err();

    // Nothing ever reached Ready, so StateWaiter raises rather than partially
    // crediting the boot set.
    assert!(matches!(err, boa_executor::ExecutorError::Client(ClientError::NodesNotReady(2, 2))));
}

#[tokio::test]
async fn scenario_d_configure_only_never_touches_power() {
    let world = Arc::new(World {
        powered_on: Mutex::new(HashSet::new()),
        ..Default::default()
    });
    let status = Arc::new(RecordingStatusClient::default());
    let clients = harness(world.clone(), status.clone());

    let report = executor("compute", Operation::Configure, true, &["nA", "nB"], fast_timing(), clients)
        .run(session_handle())
        .await
        .expect("configure-only should succeed without powering anything");

    assert!(report.failed_nodes.is_empty());
    assert!(world.powered_on.lock().unwrap().is_empty(), "configure must never power on a node");
    for n in ["nA", "nB"] {
        assert_eq!(status.current_category("compute", PhaseName::StageConfiguration, &node(n)), Some(Category::Succeeded));
        assert_eq!(status.current_category("compute", PhaseName::WaitForConfiguration, &node(n)), Some(Category::Succeeded));
    }
    // Shutdown/Boot never ran for this operation at all.
    assert_eq!(status.current_category("compute", PhaseName::Shutdown, &node("nA")), None);
}

#[tokio::test]
async fn scenario_e_reentry_resets_every_node_before_resuming() {
    let world = Arc::new(World {
        powered_on: Mutex::new(nodes(&["n1", "n2", "n3", "n4", "n5"])),
        ..Default::default()
    });
    let status = Arc::new(RecordingStatusClient::default());

    // Simulate a crash mid-shutdown: 3 of 5 nodes already recorded succeeded,
    // the other 2 still in_progress, from a prior attempt's writes.
    for n in ["n1", "n2", "n3"] {
        status.seed("compute", PhaseName::Shutdown, &node(n), Category::Succeeded);
    }
    for n in ["n4", "n5"] {
        status.seed("compute", PhaseName::Shutdown, &node(n), Category::InProgress);
    }

    let clients = harness(world, status.clone());
    let report = executor("compute", Operation::Shutdown, false, &["n1", "n2", "n3", "n4", "n5"], fast_timing(), clients)
        .run(session_handle())
        .await
        .expect("re-entered shutdown should still converge");

    assert!(report.failed_nodes.is_empty());

    let first_in_progress = status.first_in_progress_move("compute").expect("shutdown must move nodes to in_progress eventually");
    let reset_moves = status.moves_before("compute", first_in_progress);
    assert!(!reset_moves.is_empty(), "a reset sweep must precede any in_progress move on re-entry");
    for (_, dst, _) in &reset_moves {
        assert_eq!(*dst, Category::NotStarted, "every pre-work move must reset to not_started");
    }

    for n in ["n1", "n2", "n3", "n4", "n5"] {
        assert_eq!(status.current_category("compute", PhaseName::Shutdown, &node(n)), Some(Category::Succeeded), "node {n} must end in exactly one terminal category");
    }
}
