use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ── Node identity ──────────────────────────────────────────────────────────────

/// Opaque node identifier.
///
/// Two naming schemes exist in the wild: a legacy all-numeric form (e.g. `"1000"`)
/// and the hierarchical xname form (e.g. `"x3000c0s1b0n0"`). The core treats both
/// as opaque strings; only [`NodeId::is_legacy`] distinguishes them, because the
/// power controller must refuse to act on the legacy form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(s: impl Into<String>) -> Self {
        NodeId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this id is the deprecated all-numeric form rather than an xname.
    pub fn is_legacy(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_digit())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId::new(s)
    }
}

// ── Operation / Phase / Category ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Boot,
    Shutdown,
    Reboot,
    Configure,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Boot => "boot",
            Operation::Shutdown => "shutdown",
            Operation::Reboot => "reboot",
            Operation::Configure => "configure",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Operation {
    type Err = crate::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boot" => Ok(Operation::Boot),
            "shutdown" => Ok(Operation::Shutdown),
            "reboot" => Ok(Operation::Reboot),
            "configure" => Ok(Operation::Configure),
            other => Err(crate::error::DomainError::InvalidOperation(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseName {
    StageConfiguration,
    Shutdown,
    Boot,
    WaitForConfiguration,
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseName::StageConfiguration => "stage_configuration",
            PhaseName::Shutdown => "shutdown",
            PhaseName::Boot => "boot",
            PhaseName::WaitForConfiguration => "wait_for_configuration",
        };
        write!(f, "{}", s)
    }
}

/// The phase sequence for an operation is a pure function of the operation (I-2).
pub fn phases_for(operation: Operation) -> &'static [PhaseName] {
    match operation {
        Operation::Shutdown => &[PhaseName::Shutdown],
        Operation::Configure => &[PhaseName::StageConfiguration, PhaseName::WaitForConfiguration],
        Operation::Boot => &[PhaseName::StageConfiguration, PhaseName::Boot, PhaseName::WaitForConfiguration],
        Operation::Reboot => &[
            PhaseName::StageConfiguration,
            PhaseName::Shutdown,
            PhaseName::Boot,
            PhaseName::WaitForConfiguration,
        ],
    }
}

/// Every node in a Phase belongs to exactly one of these five categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    Excluded,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::NotStarted,
        Category::InProgress,
        Category::Succeeded,
        Category::Failed,
        Category::Excluded,
    ];
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::NotStarted => "not_started",
            Category::InProgress => "in_progress",
            Category::Succeeded => "succeeded",
            Category::Failed => "failed",
            Category::Excluded => "excluded",
        };
        write!(f, "{}", s)
    }
}

// ── CFS spec ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfsSpec {
    pub configuration: Option<String>,
    #[serde(default)]
    pub clone_url: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub playbook: Option<String>,
}

// ── BootSet / Session ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSet {
    #[serde(default)]
    pub node_list: Option<Vec<String>>,
    #[serde(default)]
    pub node_groups: Option<Vec<String>>,
    #[serde(default)]
    pub node_roles_groups: Option<Vec<String>>,
    #[serde(default)]
    pub path: Option<String>,
    /// Always `"s3"` today; kept as a string rather than a unit enum because
    /// the upstream manifest schema may grow other backends.
    #[serde(default)]
    pub path_type: Option<String>,
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub kernel_parameters: Option<String>,
    #[serde(default)]
    pub rootfs_provider: Option<String>,
    #[serde(default)]
    pub rootfs_provider_passthrough: Option<String>,
}

impl BootSet {
    /// True if none of the three node sources are populated — a legal but
    /// useless Boot Set whose resolution will be logged and skipped.
    pub fn has_no_node_source(&self) -> bool {
        self.node_list.as_ref().map_or(true, |v| v.is_empty())
            && self.node_groups.as_ref().map_or(true, |v| v.is_empty())
            && self.node_roles_groups.as_ref().map_or(true, |v| v.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    #[serde(default)]
    pub session_template_id: Option<String>,
    pub operation: Operation,
    #[serde(default)]
    pub limit: Option<String>,
    pub boot_sets: HashMap<String, BootSet>,
    #[serde(default)]
    pub cfs: Option<CfsSpec>,
    #[serde(default)]
    pub enable_cfs: bool,
    /// Hardware-state partition to scope group/role inventory queries to.
    #[serde(default)]
    pub partition: Option<String>,
}

// ── Boot artifacts ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootArtifacts {
    pub kernel_url: String,
    pub initrd_url: String,
    pub rootfs_url: String,
    pub rootfs_etag: String,
    #[serde(default)]
    pub boot_parameters_url: Option<String>,
    #[serde(default)]
    pub boot_parameters_etag: Option<String>,
}
