use crate::error::ClientError;

/// Contributes the `root=` (and optionally `nmd_data=`) kernel command-line
/// fragment for a Boot Set's chosen rootfs provider.
pub trait RootfsProvider: Send + Sync {
    fn root_fragment(&self) -> String;
    fn nmd_fragment(&self) -> Option<String>;
}

/// The only supported provider. The deprecated `ars`/`cps` spellings, and
/// anything else, are rejected in [`make_rootfs_provider`].
pub struct CpsS3Provider {
    rootfs_url: String,
    rootfs_etag: String,
    passthrough: Option<String>,
}

impl CpsS3Provider {
    pub fn new(rootfs_url: String, rootfs_etag: String, passthrough: Option<String>) -> Self {
        CpsS3Provider {
            rootfs_url,
            rootfs_etag,
            passthrough,
        }
    }
}

impl RootfsProvider for CpsS3Provider {
    fn root_fragment(&self) -> String {
        let passthrough = self.passthrough.as_deref().unwrap_or("");
        let segments = ["craycps-s3", &self.rootfs_url, &self.rootfs_etag, passthrough];
        let joined: String = segments.iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join(":");
        format!("root={}", joined)
    }

    fn nmd_fragment(&self) -> Option<String> {
        Some(format!("nmd_data=url={},etag={}", self.rootfs_url, self.rootfs_etag))
    }
}

/// Select the rootfs provider named by `BootSet.rootfs_provider`
/// (case-insensitive). Only `cpss3` is implemented; anything else, including
/// the deprecated `ars`/`cps` spellings, is a nontransient construction-time
/// error.
pub fn make_rootfs_provider(name: &str, rootfs_url: String, rootfs_etag: String, passthrough: Option<String>) -> Result<Box<dyn RootfsProvider>, ClientError> {
    match name.to_ascii_lowercase().as_str() {
        "cpss3" => Ok(Box::new(CpsS3Provider::new(rootfs_url, rootfs_etag, passthrough))),
        other => Err(ClientError::UnsupportedProvider(other.to_string())),
    }
}

/// Assemble the full kernel command line in order:
/// image-embedded parameters, Boot-Set kernel parameters, the rootfs
/// fragment, the NMD fragment (if any), then the session id marker.
pub fn build_kernel_cmdline(
    image_embedded_parameters: Option<&str>,
    boot_set_kernel_parameters: Option<&str>,
    provider: &dyn RootfsProvider,
    session_id: &str,
) -> String {
    let mut pieces: Vec<String> = Vec::new();
    if let Some(p) = image_embedded_parameters {
        pieces.extend(p.split_whitespace().map(str::to_string));
    }
    if let Some(p) = boot_set_kernel_parameters {
        if !p.is_empty() {
            pieces.push(p.to_string());
        }
    }
    pieces.push(provider.root_fragment());
    if let Some(nmd) = provider.nmd_fragment() {
        pieces.push(nmd);
    }
    pieces.push(format!("bos_session_id={}", session_id));
    pieces.join(" ")
}
