//! CRI request and response types.
//!
//! Rust mirrors of the runtime and image service messages the reconciliation
//! loop exchanges with its container runtime. Field names follow the protocol
//! (camelCase on the wire), enum values use the protocol's constant names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Pod Sandbox
// =============================================================================

/// Identity of a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSandboxMetadata {
    /// Pod name.
    pub name: String,
    /// Pod UID.
    pub uid: String,
    /// Pod namespace.
    pub namespace: String,
    /// Number of times this sandbox has been created for the pod.
    pub attempt: u32,
}

/// Configuration for creating a pod sandbox.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSandboxConfig {
    /// Sandbox identity. Required.
    pub metadata: Option<PodSandboxMetadata>,
    /// Hostname of the sandbox.
    pub hostname: String,
    /// Directory for container logs.
    pub log_directory: String,
    /// Key-value pairs identifying the sandbox; carries simulation directives.
    pub labels: HashMap<String, String>,
    /// Unstructured metadata.
    pub annotations: HashMap<String, String>,
}

/// Readiness of a pod sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PodSandboxState {
    /// Sandbox is running.
    SandboxReady,
    /// Sandbox is stopped or terminated.
    SandboxNotready,
}

impl std::fmt::Display for PodSandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SandboxReady => write!(f, "SANDBOX_READY"),
            Self::SandboxNotready => write!(f, "SANDBOX_NOTREADY"),
        }
    }
}

/// Network status of a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSandboxNetworkStatus {
    /// Primary IP address.
    pub ip: String,
}

/// Detailed status of a pod sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSandboxStatus {
    /// Sandbox ID.
    pub id: String,
    /// Sandbox identity.
    pub metadata: Option<PodSandboxMetadata>,
    /// Readiness.
    pub state: PodSandboxState,
    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,
    /// Network status.
    pub network: Option<PodSandboxNetworkStatus>,
    /// Labels from the sandbox config.
    pub labels: HashMap<String, String>,
    /// Annotations from the sandbox config.
    pub annotations: HashMap<String, String>,
    /// Runtime handler the sandbox was created with.
    pub runtime_handler: String,
}

/// Sandbox entry returned by `ListPodSandbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSandbox {
    /// Sandbox ID.
    pub id: String,
    /// Sandbox identity.
    pub metadata: Option<PodSandboxMetadata>,
    /// Readiness.
    pub state: PodSandboxState,
    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,
    /// Labels from the sandbox config.
    pub labels: HashMap<String, String>,
    /// Annotations from the sandbox config.
    pub annotations: HashMap<String, String>,
    /// Runtime handler the sandbox was created with.
    pub runtime_handler: String,
}

/// Filter for `ListPodSandbox`. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSandboxFilter {
    /// Exact sandbox ID.
    pub id: Option<String>,
    /// Sandbox state.
    pub state: Option<PodSandboxState>,
    /// Labels the sandbox must carry.
    pub label_selector: HashMap<String, String>,
}

// =============================================================================
// Container
// =============================================================================

/// Identity of a container within its sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerMetadata {
    /// Container name.
    pub name: String,
    /// Number of times this container has been created in the sandbox.
    pub attempt: u32,
}

/// Image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageSpec {
    /// Image name or digest.
    pub image: String,
    /// Unstructured metadata.
    pub annotations: HashMap<String, String>,
}

impl ImageSpec {
    /// Creates an image spec with no annotations.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            annotations: HashMap::new(),
        }
    }
}

/// Environment variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValue {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
}

/// Configuration for creating a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerConfig {
    /// Container identity. Required.
    pub metadata: Option<ContainerMetadata>,
    /// Image to run. Required.
    pub image: Option<ImageSpec>,
    /// Entrypoint.
    pub command: Vec<String>,
    /// Entrypoint arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: String,
    /// Environment variables.
    pub envs: Vec<KeyValue>,
    /// Key-value pairs identifying the container; may carry simulation directives.
    pub labels: HashMap<String, String>,
    /// Unstructured metadata.
    pub annotations: HashMap<String, String>,
    /// Log path relative to the sandbox log directory.
    pub log_path: String,
}

/// State of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    /// Created, not started.
    ContainerCreated,
    /// Running.
    ContainerRunning,
    /// Exited.
    ContainerExited,
    /// Unknown.
    ContainerUnknown,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContainerCreated => write!(f, "CONTAINER_CREATED"),
            Self::ContainerRunning => write!(f, "CONTAINER_RUNNING"),
            Self::ContainerExited => write!(f, "CONTAINER_EXITED"),
            Self::ContainerUnknown => write!(f, "CONTAINER_UNKNOWN"),
        }
    }
}

/// Detailed status of a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    /// Container ID.
    pub id: String,
    /// Container identity.
    pub metadata: Option<ContainerMetadata>,
    /// Current state.
    pub state: ContainerState,
    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,
    /// Start time in nanoseconds since the epoch (0 if not started).
    pub started_at: i64,
    /// Finish time in nanoseconds since the epoch (0 if not finished).
    pub finished_at: i64,
    /// Exit code (meaningful once exited).
    pub exit_code: i32,
    /// Image spec.
    pub image: Option<ImageSpec>,
    /// Digest of the image the container runs.
    pub image_ref: String,
    /// Brief reason for the current state.
    pub reason: String,
    /// Human-readable message for the current state.
    pub message: String,
    /// Labels from the container config.
    pub labels: HashMap<String, String>,
    /// Annotations from the container config.
    pub annotations: HashMap<String, String>,
    /// Log path.
    pub log_path: String,
}

/// Container entry returned by `ListContainers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Container ID.
    pub id: String,
    /// Sandbox the container belongs to.
    pub pod_sandbox_id: String,
    /// Container identity.
    pub metadata: Option<ContainerMetadata>,
    /// Image spec.
    pub image: Option<ImageSpec>,
    /// Digest of the image the container runs.
    pub image_ref: String,
    /// Current state.
    pub state: ContainerState,
    /// Creation time in nanoseconds since the epoch.
    pub created_at: i64,
    /// Labels from the container config.
    pub labels: HashMap<String, String>,
    /// Annotations from the container config.
    pub annotations: HashMap<String, String>,
}

/// Filter for `ListContainers`. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerFilter {
    /// Exact container ID.
    pub id: Option<String>,
    /// Container state.
    pub state: Option<ContainerState>,
    /// Sandbox the container belongs to.
    pub pod_sandbox_id: Option<String>,
    /// Labels the container must carry.
    pub label_selector: HashMap<String, String>,
}

/// Result of `ExecSync`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecSyncResponse {
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
    /// Exit code of the command.
    pub exit_code: i32,
}

// =============================================================================
// Runtime
// =============================================================================

/// Result of `Version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    /// Kubelet-facing API version.
    pub version: String,
    /// Runtime name.
    pub runtime_name: String,
    /// Runtime version.
    pub runtime_version: String,
    /// CRI API version.
    pub runtime_api_version: String,
}

/// Runtime condition type reporting the runtime is ready.
pub const RUNTIME_READY: &str = "RuntimeReady";

/// Runtime condition type reporting the pod network is ready.
pub const NETWORK_READY: &str = "NetworkReady";

/// A single runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCondition {
    /// Condition type.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// Whether the condition holds.
    pub status: bool,
    /// Brief reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

/// Result of `Status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    /// Runtime conditions.
    pub conditions: Vec<RuntimeCondition>,
}

// =============================================================================
// Images
// =============================================================================

/// Image known to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Image ID (digest).
    pub id: String,
    /// Tags referring to the image.
    pub repo_tags: Vec<String>,
    /// Digests referring to the image.
    pub repo_digests: Vec<String>,
    /// Image size in bytes.
    pub size: u64,
}

/// Filter for `ListImages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageFilter {
    /// Image the listing is restricted to.
    pub image: Option<ImageSpec>,
}

/// Filesystem usage entry returned by `ImageFsInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemUsage {
    /// Collection time in nanoseconds since the epoch.
    pub timestamp: i64,
    /// Mountpoint of the filesystem.
    pub mountpoint: String,
    /// Bytes used.
    pub used_bytes: u64,
    /// Inodes used.
    pub inodes_used: u64,
}
