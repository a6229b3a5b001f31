use std::sync::Arc;

use boa_clients::{
    ArtifactResolver, BootScriptClient, BootScriptRegistrar, ConfigurationClient, ConfigurationDriver, HttpBootScriptClient, HttpConfigurationClient, HttpHardwareStateClient, HttpObjectStoreClient,
    HttpPowerClient, HttpStatusClient, ObjectStoreClient, PowerClient, PowerController, S3Config, ServiceConfig, StateWaiter,
};
use boa_config::{EnvConfig, ServiceEndpoints};
use boa_domain::{Classify, ErrorKind};
use boa_executor::{PhaseClients, SessionCoordinator, SessionReport, TimingParams};
use boa_nodeset::{HardwareStateClient, Inventory};
use boa_status::{StatusClient, StatusRecorder};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let exit_code = run().await;
    std::process::exit(exit_code);
}

fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok().filter(|v| !v.is_empty()).unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(level)).with_target(false).init();
}

async fn run() -> i32 {
    let env = match EnvConfig::from_process_env() {
        Ok(env) => env,
        Err(e) => {
            error!(error = %e, "failed to load environment configuration");
            return exit_code_for(e.kind());
        }
    };

    let endpoints = match ServiceEndpoints::from_process_env() {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "failed to load service endpoint configuration");
            return exit_code_for(e.kind());
        }
    };

    let session = match boa_config::load_session(&env) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to load session");
            return exit_code_for(e.kind());
        }
    };

    info!(session_id = %session.session_id, operation = %session.operation, boot_sets = session.boot_sets.len(), "starting BOA session");

    let clients = build_clients(&endpoints);
    let timing = TimingParams::from(&env);
    let coordinator = SessionCoordinator::new(session, timing, clients);

    match coordinator.run().await {
        Ok(report) => {
            // Partial node failures are reported above but don't fail the
            // process: a Session that ran to completion exits clean even if
            // some nodes need a `--limit` rerun.
            log_report(&report);
            0
        }
        Err(e) => {
            error!(error = %e, "session failed");
            exit_code_for(e.kind())
        }
    }
}

fn exit_code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Nontransient => 0,
        ErrorKind::Transient => 1,
    }
}

fn log_report(report: &SessionReport) {
    for (name, outcome) in &report.boot_sets {
        match (&outcome.report, &outcome.error) {
            (Some(r), _) if r.failed_nodes.is_empty() => {
                info!(boot_set = %name, "boot set completed with no failures");
            }
            (Some(r), _) => {
                let limit: String = r.failed_nodes.iter().map(|n| n.as_str().to_string()).collect::<Vec<_>>().join(",");
                warn!(boot_set = %name, failed = r.failed_nodes.len(), "boot set completed with failures; rerun with --limit {}", limit);
            }
            (None, Some(err)) => {
                error!(boot_set = %name, error = %err, "boot set did not complete");
            }
            (None, None) => {}
        }
    }
}

fn build_clients(endpoints: &ServiceEndpoints) -> PhaseClients {
    let http = reqwest::Client::new();

    let hsm_client: Arc<dyn HardwareStateClient> = Arc::new(HttpHardwareStateClient::new(http.clone(), ServiceConfig::new(&endpoints.hardware_state_base_url)));
    let inventory = Arc::new(Inventory::new(hsm_client.clone()));

    let status_client: Arc<dyn StatusClient> = Arc::new(HttpStatusClient::new(http.clone(), ServiceConfig::new(&endpoints.status_base_url)));
    let recorder = Arc::new(StatusRecorder::new(status_client));

    let object_store: Arc<dyn ObjectStoreClient> = Arc::new(HttpObjectStoreClient::new(
        http.clone(),
        S3Config {
            access_key: endpoints.s3_access_key.clone(),
            secret_key: endpoints.s3_secret_key.clone(),
            protocol: endpoints.s3_protocol.clone(),
            gateway: endpoints.s3_gateway.clone(),
            region: endpoints.s3_region.clone(),
        },
    ));
    let artifacts = Arc::new(ArtifactResolver::new(object_store));

    let boot_script_client: Arc<dyn BootScriptClient> = Arc::new(HttpBootScriptClient::new(http.clone(), ServiceConfig::new(&endpoints.boot_script_base_url)));
    let boot_script = Arc::new(BootScriptRegistrar::new(boot_script_client));

    let power_client: Arc<dyn PowerClient> = Arc::new(HttpPowerClient::new(http.clone(), ServiceConfig::new(&endpoints.power_base_url)));
    let power = Arc::new(PowerController::new(power_client));

    let state_waiter = Arc::new(StateWaiter::new(hsm_client));

    let config_client: Arc<dyn ConfigurationClient> = Arc::new(HttpConfigurationClient::new(http, ServiceConfig::new(&endpoints.configuration_base_url)));
    let config = Arc::new(ConfigurationDriver::new(
        config_client,
        endpoints.cfs_name_prefix.clone(),
        endpoints.cfs_default_clone_url.clone(),
        endpoints.cfs_default_playbook.clone(),
    ));

    PhaseClients {
        inventory,
        recorder,
        artifacts,
        boot_script,
        power,
        state_waiter,
        config,
    }
}
