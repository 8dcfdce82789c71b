//! CRI service traits.
//!
//! The two capability interfaces the reconciliation loop drives:
//! - [`RuntimeService`]: pod sandbox and container lifecycle
//! - [`ImageService`]: image presence and pulls
//!
//! # Lifecycle
//!
//! ```text
//! run_pod_sandbox → create_container → start_container → container_status*
//!        │                                                      │
//!        ▼                                                      ▼
//! stop_pod_sandbox ──────────────────────────────────────► stop_container
//!        │
//!        ▼
//! remove_pod_sandbox (removes the sandbox's containers too)
//! ```
//!
//! Implementations must be safe to call concurrently from many tasks.
//! Optional operations default to [`Error::NotSupported`].

use crate::cri::{
    Container, ContainerConfig, ContainerFilter, ContainerStatus, ExecSyncResponse,
    FilesystemUsage, Image, ImageFilter, ImageSpec, PodSandbox, PodSandboxConfig,
    PodSandboxFilter, PodSandboxStatus, RuntimeStatus, VersionResponse,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

// =============================================================================
// Runtime Service
// =============================================================================

/// Pod sandbox and container lifecycle operations.
///
/// # Implementations
///
/// - `HollowRuntime`: simulated records, no processes
#[async_trait]
pub trait RuntimeService: Send + Sync {
    /// Returns runtime name and API versions.
    async fn version(&self) -> Result<VersionResponse>;

    /// Returns runtime and network readiness.
    async fn status(&self) -> Result<RuntimeStatus>;

    // =========================================================================
    // Pod Sandboxes
    // =========================================================================

    /// Creates and starts a pod sandbox.
    ///
    /// # Returns
    ///
    /// The new sandbox ID.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the metadata name, namespace or uid is
    /// missing.
    async fn run_pod_sandbox(
        &self,
        config: &PodSandboxConfig,
        runtime_handler: &str,
    ) -> Result<String>;

    /// Stops a pod sandbox and every container in it. Idempotent.
    async fn stop_pod_sandbox(&self, id: &str) -> Result<()>;

    /// Removes a pod sandbox and every container in it.
    async fn remove_pod_sandbox(&self, id: &str) -> Result<()>;

    /// Returns the status of a pod sandbox.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the sandbox does not exist
    /// - [`Error::Validation`] if the status misses required fields
    async fn pod_sandbox_status(&self, id: &str) -> Result<PodSandboxStatus>;

    /// Lists pod sandboxes matching `filter`.
    async fn list_pod_sandbox(&self, filter: Option<&PodSandboxFilter>)
    -> Result<Vec<PodSandbox>>;

    // =========================================================================
    // Containers
    // =========================================================================

    /// Creates a container inside an existing sandbox.
    ///
    /// # Returns
    ///
    /// The new container ID.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the metadata name or image is missing
    /// - [`Error::ParentNotFound`] if the sandbox does not exist
    async fn create_container(
        &self,
        pod_sandbox_id: &str,
        config: ContainerConfig,
        sandbox_config: &PodSandboxConfig,
    ) -> Result<String>;

    /// Starts a created container.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stops a container. `timeout_secs` is the grace period the caller
    /// allows before a forced kill.
    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<()>;

    /// Removes a container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Returns the status of a container.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the container does not exist
    /// - [`Error::Validation`] if the status misses required fields
    async fn container_status(&self, id: &str) -> Result<ContainerStatus>;

    /// Lists containers matching `filter`.
    async fn list_containers(&self, filter: Option<&ContainerFilter>) -> Result<Vec<Container>>;

    /// Runs a command in a container and waits for it.
    async fn exec_sync(
        &self,
        _id: &str,
        _cmd: &[String],
        _timeout: Duration,
    ) -> Result<ExecSyncResponse> {
        Err(Error::NotSupported("exec_sync".to_string()))
    }
}

// =============================================================================
// Image Service
// =============================================================================

/// Image operations.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Lists images matching `filter`.
    async fn list_images(&self, filter: Option<&ImageFilter>) -> Result<Vec<Image>>;

    /// Returns the image if present, `None` otherwise.
    async fn image_status(&self, image: &ImageSpec) -> Result<Option<Image>>;

    /// Pulls an image.
    ///
    /// # Returns
    ///
    /// The image reference (digest).
    async fn pull_image(&self, image: &ImageSpec) -> Result<String>;

    /// Removes an image.
    async fn remove_image(&self, _image: &ImageSpec) -> Result<()> {
        Err(Error::NotSupported("remove_image".to_string()))
    }

    /// Returns usage of the filesystems holding images.
    async fn image_fs_info(&self) -> Result<Vec<FilesystemUsage>> {
        Err(Error::NotSupported("image_fs_info".to_string()))
    }
}
