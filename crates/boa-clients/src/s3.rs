use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use boa_domain::BootArtifacts;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::ClientError;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "s3";

/// `S3_ACCESS_KEY`/`S3_SECRET_KEY`/`S3_PROTOCOL`/`S3_GATEWAY`.
#[derive(Clone)]
pub struct S3Config {
    pub access_key: String,
    pub secret_key: String,
    pub protocol: String,
    pub gateway: String,
    pub region: String,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn derive_signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, SERVICE.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// Sign a GET/HEAD S3 object request, specialised from the same canonical-
/// request construction used for POST-form AWS Query-API calls: no body, no
/// `Content-Type`, the verb and path vary instead.
fn sigv4_headers(method: &str, uri_path: &str, host: &str, config: &S3Config) -> BTreeMap<String, String> {
    let now = chrono::Utc::now();
    let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = sha256_hex(b"");

    let mut canon_hdrs: BTreeMap<String, String> = BTreeMap::new();
    canon_hdrs.insert("host".into(), host.into());
    canon_hdrs.insert("x-amz-content-sha256".into(), payload_hash.clone());
    canon_hdrs.insert("x-amz-date".into(), timestamp.clone());

    let signed_headers: String = canon_hdrs.keys().cloned().collect::<Vec<_>>().join(";");
    let canonical_headers: String = canon_hdrs.iter().map(|(k, v)| format!("{}:{}\n", k, v.trim())).collect();

    let canonical_request = format!("{}\n{}\n\n{}\n{}\n{}", method, uri_path, canonical_headers, signed_headers, payload_hash);

    let scope = format!("{}/{}/{}/aws4_request", date, config.region, SERVICE);
    let string_to_sign = format!("AWS4-HMAC-SHA256\n{}\n{}\n{}", timestamp, scope, sha256_hex(canonical_request.as_bytes()));

    let signing_key = derive_signing_key(&config.secret_key, &date, &config.region);
    let signature = hmac_sha256(&signing_key, string_to_sign.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>();

    let auth = format!(
        "AWS4-HMAC-SHA256 Credential={}/{},SignedHeaders={},Signature={}",
        config.access_key, scope, signed_headers, signature
    );

    let mut out = BTreeMap::new();
    out.insert("Authorization".to_string(), auth);
    out.insert("x-amz-date".to_string(), timestamp);
    out.insert("x-amz-content-sha256".to_string(), payload_hash);
    out
}

/// The S3-style object store's query surface: HEAD for etag, GET for body.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn head_etag(&self, path: &str) -> Result<Option<String>, ClientError>;
    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ClientError>;
}

pub struct HttpObjectStoreClient {
    client: reqwest::Client,
    config: S3Config,
}

impl HttpObjectStoreClient {
    pub fn new(client: reqwest::Client, config: S3Config) -> Self {
        HttpObjectStoreClient { client, config }
    }

    fn url_and_host(&self, path: &str) -> (String, String) {
        let host = self
            .config
            .gateway
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();
        (format!("{}://{}/{}", self.config.protocol, host, path.trim_start_matches('/')), host)
    }
}

#[async_trait]
impl ObjectStoreClient for HttpObjectStoreClient {
    async fn head_etag(&self, path: &str) -> Result<Option<String>, ClientError> {
        let (url, host) = self.url_and_host(path);
        let uri_path = format!("/{}", path.trim_start_matches('/'));
        let headers = sigv4_headers("HEAD", &uri_path, &host, &self.config);

        let mut req = self.client.head(&url);
        for (k, v) in &headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| ClientError::Http {
            service: "s3-head",
            message: e.to_string(),
        })?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let etag = resp
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim_matches('"').to_string());
        Ok(etag)
    }

    async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let (url, host) = self.url_and_host(path);
        let uri_path = format!("/{}", path.trim_start_matches('/'));
        let headers = sigv4_headers("GET", &uri_path, &host, &self.config);

        let mut req = self.client.get(&url);
        for (k, v) in &headers {
            req = req.header(k, v);
        }
        let resp = req.send().await.map_err(|e| ClientError::Http {
            service: "s3-get",
            message: e.to_string(),
        })?;
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ClientError::Http {
                service: "s3-get",
                message: e.to_string(),
            })
    }
}

// ── Manifest parsing ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Manifest {
    artifacts: Vec<ManifestArtifact>,
}

#[derive(Debug, Deserialize)]
struct ManifestArtifact {
    #[serde(rename = "type")]
    content_type: String,
    link: ManifestLink,
    #[allow(dead_code)]
    md5: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManifestLink {
    path: String,
    etag: Option<String>,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    link_type: Option<String>,
}

const KERNEL_TYPE: &str = "application/vnd.cray.image.kernel";
const INITRD_TYPE: &str = "application/vnd.cray.image.initrd";
const ROOTFS_TYPE: &str = "application/vnd.cray.image.rootfs.squashfs";
const PARAMS_TYPE: &str = "application/vnd.cray.image.parameters.boot";

/// Resolves a Boot Set's `(path, etag)` pair into concrete kernel/initrd/rootfs
/// (+optional boot-parameters) artifact URLs.
pub struct ArtifactResolver {
    client: Arc<dyn ObjectStoreClient>,
}

impl ArtifactResolver {
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        ArtifactResolver { client }
    }

    pub async fn resolve(&self, path: &str, etag: Option<&str>) -> Result<BootArtifacts, ClientError> {
        if let Some(expected) = etag {
            match self.client.head_etag(path).await? {
                Some(actual) if actual != expected => {
                    warn!(%path, expected, actual, "boot artifact etag mismatch, continuing");
                }
                _ => {}
            }
        }

        let body = self.client.get_bytes(path).await?;
        let manifest: Manifest = serde_json::from_slice(&body)?;

        let mut by_type: std::collections::HashMap<&str, Vec<&ManifestArtifact>> = std::collections::HashMap::new();
        for artifact in &manifest.artifacts {
            by_type.entry(artifact.content_type.as_str()).or_default().push(artifact);
        }

        let kernel = required_one(&by_type, KERNEL_TYPE)?;
        let initrd = required_one(&by_type, INITRD_TYPE)?;
        let rootfs = required_one(&by_type, ROOTFS_TYPE)?;
        let params = optional_at_most_one(&by_type, PARAMS_TYPE)?;

        Ok(BootArtifacts {
            kernel_url: kernel.link.path.clone(),
            initrd_url: initrd.link.path.clone(),
            rootfs_url: rootfs.link.path.clone(),
            rootfs_etag: rootfs.link.etag.clone().unwrap_or_default(),
            boot_parameters_url: params.map(|p| p.link.path.clone()),
            boot_parameters_etag: params.and_then(|p| p.link.etag.clone()),
        })
    }

    /// Fetch an arbitrary object's body as text — used to pull the optional
    /// image-embedded boot-parameters file referenced by a manifest.
    pub async fn fetch_text(&self, path: &str) -> Result<String, ClientError> {
        let bytes = self.client.get_bytes(path).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn required_one<'a>(
    by_type: &std::collections::HashMap<&str, Vec<&'a ManifestArtifact>>,
    content_type: &str,
) -> Result<&'a ManifestArtifact, ClientError> {
    match by_type.get(content_type) {
        None | Some([]) => Err(ClientError::ArtifactMissing(content_type.to_string())),
        Some([one]) => Ok(one),
        Some(_) => Err(ClientError::TooManyArtifacts(content_type.to_string())),
    }
}

fn optional_at_most_one<'a>(
    by_type: &std::collections::HashMap<&str, Vec<&'a ManifestArtifact>>,
    content_type: &str,
) -> Result<Option<&'a ManifestArtifact>, ClientError> {
    match by_type.get(content_type) {
        None | Some([]) => Ok(None),
        Some([one]) => Ok(Some(one)),
        Some(_) => Err(ClientError::TooManyArtifacts(content_type.to_string())),
    }
}
