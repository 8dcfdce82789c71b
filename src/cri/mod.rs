//! # Container Runtime Interface Types
//!
//! The message shapes of the CRI runtime and image services, plus the status
//! verification the reconciliation loop applies to every status response.
//!
//! ```text
//! RunPodSandbox ──▶ CreateContainer ──▶ StartContainer ──▶ ContainerStatus
//!       │                                                       │
//!       ▼                                                       ▼
//! PodSandboxStatus ◀── StopPodSandbox ◀── StopContainer ◀── ListContainers
//!       │
//!       ▼
//! RemovePodSandbox (cascades to containers)
//! ```

mod types;
mod validate;

pub use types::{
    Container, ContainerConfig, ContainerFilter, ContainerMetadata, ContainerState,
    ContainerStatus, ExecSyncResponse, FilesystemUsage, Image, ImageFilter, ImageSpec, KeyValue,
    NETWORK_READY, PodSandbox, PodSandboxConfig, PodSandboxFilter, PodSandboxMetadata,
    PodSandboxNetworkStatus, PodSandboxState, PodSandboxStatus, RUNTIME_READY, RuntimeCondition,
    RuntimeStatus, VersionResponse,
};
pub use validate::{verify_container_status, verify_sandbox_status};
