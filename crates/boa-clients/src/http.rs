//! Thin `reqwest` veneers over the five external services. Each
//! wraps one `reqwest::Client` per instance — one driver, one client — and
//! maps non-2xx responses to a transient `ClientError::Http`/
//! `StatusError::Http`/`NodeSetError::StateServiceUnreachable`, leaving retry
//! policy to the caller's polling loops rather than baking it into the
//! transport.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use boa_domain::{NodeId, PhaseName};
use boa_nodeset::{HardwareStateClient, NodeSetError, NodeState};
use boa_status::{GenericMetadata, NodeChangeList, NodeErrorsList, StatusClient, StatusError};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::boot_script::BootScriptClient;
use crate::configuration::{ComponentDesiredConfig, ConfigLayer, ConfigurationClient, ConfigurationSummary};
use crate::error::ClientError;
use crate::power::{PowerClient, PowerState, VendorResponse};

/// One base URL, reused across the five HTTP clients below — each service
/// gets its own instance.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        ServiceConfig { base_url: base_url.into() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

// ── Hardware state ───────────────────────────────────────────────────────────

pub struct HttpHardwareStateClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpHardwareStateClient {
    pub fn new(client: reqwest::Client, config: ServiceConfig) -> Self {
        HttpHardwareStateClient { client, config }
    }

    async fn get_grouping(&self, path: &str) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        let resp = self
            .client
            .get(self.config.url(path))
            .send()
            .await
            .map_err(|e| NodeSetError::StateServiceUnreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NodeSetError::StateServiceUnreachable(format!("{} returned {}", path, resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| NodeSetError::StateServiceUnreachable(e.to_string()))
    }
}

#[async_trait]
impl HardwareStateClient for HttpHardwareStateClient {
    async fn groups(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        self.get_grouping("/groups").await
    }

    async fn partitions(&self) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        self.get_grouping("/partitions").await
    }

    async fn roles(&self, partition: Option<&str>) -> Result<HashMap<String, HashSet<NodeId>>, NodeSetError> {
        let path = match partition {
            Some(p) => format!("/roles?partition={}", urlencoding::encode(p)),
            None => "/roles".to_string(),
        };
        self.get_grouping(&path).await
    }

    async fn node_states(&self, nodes: &HashSet<NodeId>) -> Result<HashMap<NodeId, NodeState>, NodeSetError> {
        #[derive(Serialize)]
        struct Req<'a> {
            nodes: Vec<&'a str>,
        }
        #[derive(Deserialize)]
        struct Entry {
            state: String,
            enabled: bool,
        }

        let body = Req {
            nodes: nodes.iter().map(NodeId::as_str).collect(),
        };
        let resp = self
            .client
            .post(self.config.url("/query/node_states"))
            .json(&body)
            .send()
            .await
            .map_err(|e| NodeSetError::StateServiceUnreachable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(NodeSetError::StateServiceUnreachable(format!("node state query returned {}", resp.status())));
        }
        let raw: HashMap<String, Entry> = resp.json().await.map_err(|e| NodeSetError::StateServiceUnreachable(e.to_string()))?;
        Ok(raw
            .into_iter()
            .map(|(id, e)| (NodeId::new(id), NodeState { state: e.state, enabled: e.enabled }))
            .collect())
    }
}

// ── Power controller ─────────────────────────────────────────────────────────

pub struct HttpPowerClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpPowerClient {
    pub fn new(client: reqwest::Client, config: ServiceConfig) -> Self {
        HttpPowerClient { client, config }
    }
}

#[async_trait]
impl PowerClient for HttpPowerClient {
    async fn get_xname_status(&self, targets: &HashSet<NodeId>, filter: &str) -> Result<(HashMap<String, HashSet<NodeId>>, VendorResponse), ClientError> {
        #[derive(Serialize)]
        struct Req<'a> {
            xnames: Vec<&'a str>,
            filter_type: &'a str,
        }
        #[derive(Deserialize, Default)]
        struct Resp {
            #[serde(default)]
            e: i64,
            #[serde(default)]
            err_msg: String,
            #[serde(default)]
            undefined: Vec<String>,
            #[serde(default, flatten)]
            states: HashMap<String, Vec<String>>,
        }

        let body = Req {
            xnames: targets.iter().map(NodeId::as_str).collect(),
            filter_type: filter,
        };
        let resp = self
            .client
            .post(self.config.url("/get_xname_status"))
            .json(&body)
            .send()
            .await
            .map_err(|e| http_err("power", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "power", message: format!("get_xname_status returned {}", resp.status()) });
        }
        let parsed: Resp = resp.json().await.map_err(|e| http_err("power", e))?;

        let mut buckets = HashMap::new();
        for (state, xnames) in parsed.states {
            if state == "e" || state == "err_msg" || state == "undefined" {
                continue;
            }
            buckets.insert(state, xnames.into_iter().map(NodeId::new).collect());
        }
        let vendor = VendorResponse {
            e: parsed.e,
            err_msg: parsed.err_msg,
            undefined: parsed.undefined.into_iter().map(NodeId::new).collect(),
            xnames: Vec::new(),
        };
        Ok((buckets, vendor))
    }

    async fn power(&self, nodes: &HashSet<NodeId>, state: PowerState, force: bool, reason: &str) -> Result<VendorResponse, ClientError> {
        #[derive(Serialize)]
        struct Req<'a> {
            xnames: Vec<&'a str>,
            reason: &'a str,
            force: bool,
        }
        #[derive(Deserialize, Default)]
        struct Resp {
            #[serde(default)]
            e: i64,
            #[serde(default)]
            err_msg: String,
            #[serde(default)]
            undefined: Vec<String>,
        }

        let path = match state {
            PowerState::On => "/xname_on",
            PowerState::Off => "/xname_off",
        };
        let body = Req {
            xnames: nodes.iter().map(NodeId::as_str).collect(),
            reason,
            force,
        };
        let resp = self
            .client
            .post(self.config.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| http_err("power", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "power", message: format!("{} returned {}", path, resp.status()) });
        }
        let parsed: Resp = resp.json().await.map_err(|e| http_err("power", e))?;
        Ok(VendorResponse {
            e: parsed.e,
            err_msg: parsed.err_msg,
            undefined: parsed.undefined.into_iter().map(NodeId::new).collect(),
            xnames: Vec::new(),
        })
    }
}

// ── Boot-script registry ─────────────────────────────────────────────────────

pub struct HttpBootScriptClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpBootScriptClient {
    pub fn new(client: reqwest::Client, config: ServiceConfig) -> Self {
        HttpBootScriptClient { client, config }
    }
}

#[async_trait]
impl BootScriptClient for HttpBootScriptClient {
    async fn known_hosts(&self, hosts: &[NodeId]) -> Result<HashSet<NodeId>, ClientError> {
        let query: String = hosts.iter().map(|h| h.as_str().to_string()).collect::<Vec<_>>().join(",");
        let resp = self
            .client
            .get(self.config.url(&format!("/bootparameters?hosts={}", urlencoding::encode(&query))))
            .send()
            .await
            .map_err(|e| http_err("boot-script", e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(HashSet::new());
        }
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "boot-script", message: format!("known_hosts returned {}", resp.status()) });
        }
        #[derive(Deserialize)]
        struct Entry {
            hosts: Vec<String>,
        }
        let entries: Vec<Entry> = resp.json().await.map_err(|e| http_err("boot-script", e))?;
        Ok(entries.into_iter().flat_map(|e| e.hosts).map(NodeId::new).collect())
    }

    async fn put_hosts(&self, hosts: &[NodeId], params: &str, kernel: &str, initrd: &str) -> Result<(), ClientError> {
        #[derive(Serialize)]
        struct Req<'a> {
            hosts: Vec<&'a str>,
            params: &'a str,
            kernel: &'a str,
            initrd: &'a str,
        }
        let body = Req {
            hosts: hosts.iter().map(NodeId::as_str).collect(),
            params,
            kernel,
            initrd,
        };
        let resp = self
            .client
            .put(self.config.url("/bootparameters"))
            .json(&body)
            .send()
            .await
            .map_err(|e| http_err("boot-script", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "boot-script", message: format!("put_hosts returned {}", resp.status()) });
        }
        Ok(())
    }
}

// ── Configuration service ────────────────────────────────────────────────────

pub struct HttpConfigurationClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpConfigurationClient {
    pub fn new(client: reqwest::Client, config: ServiceConfig) -> Self {
        HttpConfigurationClient { client, config }
    }
}

#[async_trait]
impl ConfigurationClient for HttpConfigurationClient {
    async fn stage(&self, batch: Vec<ComponentDesiredConfig>) -> Result<(), ClientError> {
        let resp = self
            .client
            .patch(self.config.url("/components"))
            .json(&batch)
            .send()
            .await
            .map_err(|e| http_err("configuration", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "configuration", message: format!("stage returned {}", resp.status()) });
        }
        Ok(())
    }

    async fn list_configurations(&self) -> Result<Vec<ConfigurationSummary>, ClientError> {
        #[derive(Deserialize)]
        struct Layer {
            #[serde(rename = "cloneUrl")]
            clone_url: String,
            playbook: String,
            commit: Option<String>,
            branch: Option<String>,
        }
        #[derive(Deserialize)]
        struct Summary {
            name: String,
            layers: Vec<Layer>,
        }

        let resp = self
            .client
            .get(self.config.url("/configurations"))
            .send()
            .await
            .map_err(|e| http_err("configuration", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "configuration", message: format!("list_configurations returned {}", resp.status()) });
        }
        let summaries: Vec<Summary> = resp.json().await.map_err(|e| http_err("configuration", e))?;
        Ok(summaries
            .into_iter()
            .map(|s| ConfigurationSummary {
                name: s.name,
                layers: s
                    .layers
                    .into_iter()
                    .map(|l| ConfigLayer {
                        clone_url: l.clone_url,
                        playbook: l.playbook,
                        commit: l.commit,
                        branch: l.branch,
                    })
                    .collect(),
            })
            .collect())
    }

    async fn create_configuration(&self, name: &str, layer: ConfigLayer) -> Result<(), ClientError> {
        let body = serde_json::json!({
            "layers": [{
                "cloneUrl": layer.clone_url,
                "playbook": layer.playbook,
                "commit": layer.commit,
                "branch": layer.branch,
            }]
        });
        let resp = self
            .client
            .put(self.config.url(&format!("/configurations/{}", urlencoding::encode(name))))
            .json(&body)
            .send()
            .await
            .map_err(|e| http_err("configuration", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "configuration", message: format!("create_configuration returned {}", resp.status()) });
        }
        Ok(())
    }

    async fn component_status(&self, ids: &[String]) -> Result<HashMap<String, String>, ClientError> {
        let query = ids.join(",");
        let resp = self
            .client
            .get(self.config.url(&format!("/components?ids={}", urlencoding::encode(&query))))
            .send()
            .await
            .map_err(|e| http_err("configuration", e))?;
        if !resp.status().is_success() {
            return Err(ClientError::Http { service: "configuration", message: format!("component_status returned {}", resp.status()) });
        }
        #[derive(Deserialize)]
        struct Component {
            id: String,
            #[serde(rename = "configurationStatus")]
            configuration_status: String,
        }
        let components: Vec<Component> = resp.json().await.map_err(|e| http_err("configuration", e))?;
        Ok(components.into_iter().map(|c| (c.id, c.configuration_status)).collect())
    }
}

// ── Status service ───────────────────────────────────────────────────────────

pub struct HttpStatusClient {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpStatusClient {
    pub fn new(client: reqwest::Client, config: ServiceConfig) -> Self {
        HttpStatusClient { client, config }
    }

    fn boot_set_path(&self, session_id: &str, boot_set: &str) -> String {
        format!("/session/{}/status/{}", urlencoding::encode(session_id), urlencoding::encode(boot_set))
    }

    async fn post(&self, path: &str, body: Value) -> Result<(), StatusError> {
        let resp = self
            .client
            .post(self.config.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| StatusError::Http(e.to_string()))?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(StatusError::Conflict);
        }
        if !resp.status().is_success() {
            return Err(StatusError::Http(format!("{} returned {}", path, resp.status())));
        }
        Ok(())
    }

    async fn patch(&self, path: &str, body: Value) -> Result<(), StatusError> {
        let resp = self
            .client
            .patch(self.config.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| StatusError::Http(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StatusError::Http(format!("{} returned {}", path, resp.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl StatusClient for HttpStatusClient {
    async fn create_session(&self, session_id: &str, body: Value) -> Result<(), StatusError> {
        self.post(&format!("/session/{}/status", urlencoding::encode(session_id)), body).await
    }

    async fn create_boot_set(&self, session_id: &str, boot_set: &str, body: Value) -> Result<(), StatusError> {
        self.post(&self.boot_set_path(session_id, boot_set), body).await
    }

    async fn create_phase(&self, session_id: &str, boot_set: &str, phase: PhaseName, body: Value) -> Result<(), StatusError> {
        self.post(&format!("{}/{}", self.boot_set_path(session_id, boot_set), phase), body).await
    }

    async fn patch_move_nodes(&self, session_id: &str, boot_set: &str, phase: Option<PhaseName>, change: &NodeChangeList) -> Result<(), StatusError> {
        let path = phase_scoped_path(&self.boot_set_path(session_id, boot_set), phase);
        self.patch(&path, serde_json::to_value(change)?).await
    }

    async fn patch_metadata(&self, session_id: &str, boot_set: &str, phase: Option<PhaseName>, meta: &GenericMetadata) -> Result<(), StatusError> {
        let path = phase_scoped_path(&self.boot_set_path(session_id, boot_set), phase);
        self.patch(&path, serde_json::to_value(meta)?).await
    }

    async fn patch_errors(&self, session_id: &str, boot_set: &str, phase: PhaseName, errors: &NodeErrorsList) -> Result<(), StatusError> {
        let path = format!("{}/{}", self.boot_set_path(session_id, boot_set), phase);
        self.patch(&path, serde_json::to_value(errors)?).await
    }
}

fn phase_scoped_path(boot_set_path: &str, phase: Option<PhaseName>) -> String {
    match phase {
        Some(p) => format!("{}/{}", boot_set_path, p),
        None => boot_set_path.to_string(),
    }
}

fn http_err(service: &'static str, e: reqwest::Error) -> ClientError {
    ClientError::Http { service, message: e.to_string() }
}
