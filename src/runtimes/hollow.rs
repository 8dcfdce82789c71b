//! # Hollow Runtime - Simulated CRI Runtime
//!
//! Implements [`RuntimeService`] and [`ImageService`] without running any
//! process. Every sandbox and container is a record in a [`StateStore`]; its
//! state is derived from the record's timeline on each query, driven by the
//! simulation labels:
//!
//! | Label                      | Example     | Effect                          |
//! |----------------------------|-------------|---------------------------------|
//! | `simulation.runDuration`   | `5m`        | How long the record runs        |
//! | `simulation.terminalPhase` | `Succeeded` | Phase reached after the duration |
//!
//! Containers without their own labels inherit the sandbox's.
//!
//! ## State Mapping
//!
//! | Phase       | Sandbox state      | Container state     | Exit code |
//! |-------------|--------------------|---------------------|-----------|
//! | Created     | -                  | `CONTAINER_CREATED` | -         |
//! | Running     | `SANDBOX_READY`    | `CONTAINER_RUNNING` | -         |
//! | Succeeded   | `SANDBOX_NOTREADY` | `CONTAINER_EXITED`  | 0         |
//! | Failed      | `SANDBOX_NOTREADY` | `CONTAINER_EXITED`  | 1         |
//! | Terminated  | `SANDBOX_NOTREADY` | `CONTAINER_EXITED`  | 143       |
//!
//! ## Images
//!
//! Images are never transferred. Every image is reported present with a
//! synthetic `sha256:` digest of its name, so the loop never tries to pull.
//!
//! ## Example
//!
//! ```rust,ignore
//! use hollowrun::{HollowRuntime, RuntimeService};
//!
//! let runtime = HollowRuntime::new();
//! let id = runtime.run_pod_sandbox(&config, "").await?;
//! let status = runtime.pod_sandbox_status(&id).await?;
//! ```

use crate::clock::Clock;
use crate::constants::{
    CRI_API_VERSION, DEFAULT_RUNTIME_HANDLER, FAKE_POD_IP, KUBE_API_VERSION,
    RUNTIME_NAME, RUNTIME_REQUEST_TIMEOUT, RUNTIME_VERSION,
};
use crate::cri::{
    self, Container, ContainerConfig, ContainerFilter, ContainerState,
    ContainerStatus, ExecSyncResponse, FilesystemUsage, Image, ImageFilter, ImageSpec,
    NETWORK_READY, PodSandbox, PodSandboxConfig, PodSandboxFilter, PodSandboxNetworkStatus,
    PodSandboxState, PodSandboxStatus, RUNTIME_READY, RuntimeCondition, RuntimeStatus,
    VersionResponse,
};
use crate::directive::TerminalPhase;
use crate::error::{Error, RecordKind, Result};
use crate::events::{EventKind, LifecycleEvent, LifecycleHook};
use crate::lifecycle::{self, Phase};
use crate::runtime::{ImageService, RuntimeService};
use crate::store::{ContainerRecord, SandboxRecord, StateStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

// =============================================================================
// Configuration
// =============================================================================

/// What mutations do when they reference an unknown record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingRecordPolicy {
    /// Removing anything, or stopping a sandbox, that does not exist succeeds.
    #[default]
    Tolerant,
    /// Those calls fail with [`Error::NotFound`].
    Strict,
}

/// Hollow runtime settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Handler recorded for sandboxes created without one.
    pub runtime_handler: String,
    /// IP reported for every sandbox.
    pub pod_ip: String,
    /// Behaviour of remove/stop calls on unknown ids.
    pub missing_record_policy: MissingRecordPolicy,
    /// Upper bound on a single request served over the transport.
    pub request_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_handler: DEFAULT_RUNTIME_HANDLER.to_string(),
            pod_ip: FAKE_POD_IP.to_string(),
            missing_record_policy: MissingRecordPolicy::default(),
            request_timeout: RUNTIME_REQUEST_TIMEOUT,
        }
    }
}

impl RuntimeConfig {
    /// Sets the default runtime handler.
    #[must_use]
    pub fn with_runtime_handler(mut self, handler: impl Into<String>) -> Self {
        self.runtime_handler = handler.into();
        self
    }

    /// Sets the reported pod IP.
    #[must_use]
    pub fn with_pod_ip(mut self, ip: impl Into<String>) -> Self {
        self.pod_ip = ip.into();
        self
    }

    /// Sets the missing-record policy.
    #[must_use]
    pub fn with_missing_record_policy(mut self, policy: MissingRecordPolicy) -> Self {
        self.missing_record_policy = policy;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

// =============================================================================
// Hollow Runtime
// =============================================================================

/// Simulated CRI runtime for one hollow node.
pub struct HollowRuntime {
    store: Arc<StateStore>,
    config: RuntimeConfig,
    hook: Option<Arc<dyn LifecycleHook>>,
}

impl HollowRuntime {
    /// Creates a runtime with an empty store and wall-clock time.
    pub fn new() -> Self {
        Self::with_store(Arc::new(StateStore::new()))
    }

    /// Creates a runtime whose store uses `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(StateStore::with_clock(clock)))
    }

    /// Creates a runtime over an existing store.
    pub fn with_store(store: Arc<StateStore>) -> Self {
        Self {
            store,
            config: RuntimeConfig::default(),
            hook: None,
        }
    }

    /// Replaces the runtime settings.
    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Installs a lifecycle hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Backing state store.
    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Runtime settings.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn emit(&self, kind: EventKind, id: &str, sandbox_id: &str) {
        if let Some(hook) = &self.hook {
            hook.on_event(&LifecycleEvent {
                kind,
                id: id.to_string(),
                sandbox_id: sandbox_id.to_string(),
                at: self.store.now(),
            });
        }
    }

    fn missing(&self, kind: RecordKind, id: &str) -> Result<()> {
        match self.config.missing_record_policy {
            MissingRecordPolicy::Tolerant => {
                debug!("{} {} does not exist, nothing to do", kind, id);
                Ok(())
            }
            MissingRecordPolicy::Strict => Err(Error::not_found(kind, id)),
        }
    }

    // =========================================================================
    // Record Conversion
    // =========================================================================

    fn sandbox_state(record: &SandboxRecord, now: DateTime<Utc>) -> PodSandboxState {
        match lifecycle::phase(&record.timeline(), now) {
            Phase::Running => PodSandboxState::SandboxReady,
            _ => PodSandboxState::SandboxNotready,
        }
    }

    fn build_sandbox_status(&self, record: &SandboxRecord, now: DateTime<Utc>) -> PodSandboxStatus {
        PodSandboxStatus {
            id: record.id.clone(),
            metadata: record.config.metadata.clone(),
            state: Self::sandbox_state(record, now),
            created_at: nanos(record.created_at),
            network: Some(PodSandboxNetworkStatus {
                ip: self.config.pod_ip.clone(),
            }),
            labels: record.config.labels.clone(),
            annotations: record.config.annotations.clone(),
            runtime_handler: record.runtime_handler.clone(),
        }
    }

    fn sandbox_summary(record: &SandboxRecord, now: DateTime<Utc>) -> PodSandbox {
        PodSandbox {
            id: record.id.clone(),
            metadata: record.config.metadata.clone(),
            state: Self::sandbox_state(record, now),
            created_at: nanos(record.created_at),
            labels: record.config.labels.clone(),
            annotations: record.config.annotations.clone(),
            runtime_handler: record.runtime_handler.clone(),
        }
    }

    fn build_container_status(record: &ContainerRecord, now: DateTime<Utc>) -> ContainerStatus {
        let timeline = record.timeline();
        let phase = lifecycle::phase(&timeline, now);

        let (state, exit_code, reason, message) = match phase {
            Phase::Created => (ContainerState::ContainerCreated, 0, "", String::new()),
            Phase::Running => (ContainerState::ContainerRunning, 0, "", String::new()),
            Phase::Terminal(terminal) => {
                let exit_code = terminal.exit_code();
                let reason = if exit_code == 0 { "Completed" } else { "Error" };
                let message = match terminal {
                    TerminalPhase::Terminated if record.stopped_at.is_some() => {
                        "stopped".to_string()
                    }
                    other => format!("simulated run ended: {}", other),
                };
                (ContainerState::ContainerExited, exit_code, reason, message)
            }
        };

        ContainerStatus {
            id: record.id.clone(),
            metadata: record.config.metadata.clone(),
            state,
            created_at: nanos(record.created_at),
            started_at: record.started_at.map(nanos).unwrap_or_default(),
            finished_at: lifecycle::finished_at(&timeline, now)
                .map(nanos)
                .unwrap_or_default(),
            exit_code,
            image: record.config.image.clone(),
            image_ref: record.image_ref.clone(),
            reason: reason.to_string(),
            message,
            labels: record.config.labels.clone(),
            annotations: record.config.annotations.clone(),
            log_path: record.config.log_path.clone(),
        }
    }

    fn container_summary(record: &ContainerRecord, now: DateTime<Utc>) -> Container {
        Container {
            id: record.id.clone(),
            pod_sandbox_id: record.sandbox_id.clone(),
            metadata: record.config.metadata.clone(),
            image: record.config.image.clone(),
            image_ref: record.image_ref.clone(),
            state: container_state(lifecycle::phase(&record.timeline(), now)),
            created_at: nanos(record.created_at),
            labels: record.config.labels.clone(),
            annotations: record.config.annotations.clone(),
        }
    }
}

impl Default for HollowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Runtime Service
// =============================================================================

#[async_trait]
impl RuntimeService for HollowRuntime {
    async fn version(&self) -> Result<VersionResponse> {
        Ok(VersionResponse {
            version: KUBE_API_VERSION.to_string(),
            runtime_name: RUNTIME_NAME.to_string(),
            runtime_version: RUNTIME_VERSION.to_string(),
            runtime_api_version: CRI_API_VERSION.to_string(),
        })
    }

    async fn status(&self) -> Result<RuntimeStatus> {
        let ready = |condition_type: &str| RuntimeCondition {
            condition_type: condition_type.to_string(),
            status: true,
            reason: String::new(),
            message: String::new(),
        };
        Ok(RuntimeStatus {
            conditions: vec![ready(RUNTIME_READY), ready(NETWORK_READY)],
        })
    }

    async fn run_pod_sandbox(
        &self,
        config: &PodSandboxConfig,
        runtime_handler: &str,
    ) -> Result<String> {
        let Some(metadata) = &config.metadata else {
            return Err(Error::InvalidArgument(
                "pod sandbox config has no metadata".to_string(),
            ));
        };
        if metadata.name.is_empty() || metadata.namespace.is_empty() || metadata.uid.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "pod sandbox metadata needs name, namespace and uid: {:?}",
                metadata
            )));
        }

        debug!(
            "Running pod sandbox {}/{}",
            metadata.namespace, metadata.name
        );

        let handler = if runtime_handler.is_empty() {
            self.config.runtime_handler.as_str()
        } else {
            runtime_handler
        };

        let id = new_id();
        self.store.add_sandbox(&id, config.clone(), handler)?;
        self.emit(EventKind::SandboxCreated, &id, &id);

        info!(
            "Pod sandbox {} running for {}/{}",
            id, metadata.namespace, metadata.name
        );
        Ok(id)
    }

    async fn stop_pod_sandbox(&self, id: &str) -> Result<()> {
        debug!("Stopping pod sandbox {}", id);

        if !self.store.stop_sandbox(id)? {
            return self.missing(RecordKind::Sandbox, id);
        }
        self.emit(EventKind::SandboxStopped, id, id);

        info!("Pod sandbox {} stopped", id);
        Ok(())
    }

    async fn remove_pod_sandbox(&self, id: &str) -> Result<()> {
        debug!("Removing pod sandbox {}", id);

        if !self.store.remove_sandbox(id)? {
            return self.missing(RecordKind::Sandbox, id);
        }
        self.emit(EventKind::SandboxRemoved, id, id);

        info!("Pod sandbox {} removed", id);
        Ok(())
    }

    async fn pod_sandbox_status(&self, id: &str) -> Result<PodSandboxStatus> {
        let record = self.store.sandbox(id)?;
        let status = self.build_sandbox_status(&record, self.store.now());
        cri::verify_sandbox_status(&status)?;
        Ok(status)
    }

    async fn list_pod_sandbox(
        &self,
        filter: Option<&PodSandboxFilter>,
    ) -> Result<Vec<PodSandbox>> {
        let mut sandboxes = self.store.snapshot()?.sandboxes;
        sandboxes.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let now = self.store.now();
        Ok(sandboxes
            .iter()
            .map(|record| Self::sandbox_summary(record, now))
            .filter(|sandbox| filter.is_none_or(|f| sandbox_matches(sandbox, f)))
            .collect())
    }

    async fn create_container(
        &self,
        pod_sandbox_id: &str,
        config: ContainerConfig,
        sandbox_config: &PodSandboxConfig,
    ) -> Result<String> {
        let name = config
            .metadata
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or_default();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "container config needs metadata with a name".to_string(),
            ));
        }
        let image = config
            .image
            .as_ref()
            .map(|i| i.image.as_str())
            .unwrap_or_default();
        if image.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "container '{}' has no image",
                name
            )));
        }

        debug!(
            "Creating container {} in pod sandbox {} ({})",
            name,
            pod_sandbox_id,
            sandbox_config
                .metadata
                .as_ref()
                .map(|m| m.name.as_str())
                .unwrap_or_default()
        );

        let id = new_id();
        let image_ref = image_digest(image);
        self.store
            .add_container(&id, pod_sandbox_id, config, &image_ref)?;
        self.emit(EventKind::ContainerCreated, &id, pod_sandbox_id);

        info!("Container {} created in pod sandbox {}", id, pod_sandbox_id);
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        debug!("Starting container {}", id);

        let sandbox_id = self.store.start_container(id)?;
        self.emit(EventKind::ContainerStarted, id, &sandbox_id);

        info!("Container {} started", id);
        Ok(())
    }

    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<()> {
        debug!("Stopping container {} (timeout {}s)", id, timeout_secs);

        // Stopping an unknown container is always an error, whatever the policy.
        let Some(sandbox_id) = self.store.stop_container(id)? else {
            return Err(Error::not_found(RecordKind::Container, id));
        };
        self.emit(EventKind::ContainerStopped, id, &sandbox_id);

        info!("Container {} stopped", id);
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        debug!("Removing container {}", id);

        let sandbox_id = match self.store.container(id) {
            Ok(record) => record.sandbox_id,
            Err(e) if e.is_not_found() => return self.missing(RecordKind::Container, id),
            Err(e) => return Err(e),
        };
        if !self.store.remove_container(id)? {
            // Lost a race with a concurrent remove.
            return self.missing(RecordKind::Container, id);
        }
        self.emit(EventKind::ContainerRemoved, id, &sandbox_id);

        info!("Container {} removed", id);
        Ok(())
    }

    async fn container_status(&self, id: &str) -> Result<ContainerStatus> {
        let record = self.store.container(id)?;
        let status = Self::build_container_status(&record, self.store.now());
        cri::verify_container_status(&status)?;
        Ok(status)
    }

    async fn list_containers(&self, filter: Option<&ContainerFilter>) -> Result<Vec<Container>> {
        let mut containers = self.store.snapshot()?.containers;
        containers.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let now = self.store.now();
        Ok(containers
            .iter()
            .map(|record| Self::container_summary(record, now))
            .filter(|container| filter.is_none_or(|f| container_matches(container, f)))
            .collect())
    }

    async fn exec_sync(
        &self,
        id: &str,
        cmd: &[String],
        _timeout: Duration,
    ) -> Result<ExecSyncResponse> {
        debug!("Exec in container {}: {:?}", id, cmd);

        let record = self.store.container(id)?;
        let phase = lifecycle::phase(&record.timeline(), self.store.now());
        if phase != Phase::Running {
            return Err(Error::InvalidState {
                kind: RecordKind::Container,
                id: id.to_string(),
                state: phase.to_string(),
                expected: Phase::Running.to_string(),
            });
        }

        Ok(ExecSyncResponse::default())
    }
}

// =============================================================================
// Image Service
// =============================================================================

#[async_trait]
impl ImageService for HollowRuntime {
    async fn list_images(&self, filter: Option<&ImageFilter>) -> Result<Vec<Image>> {
        let wanted = filter
            .and_then(|f| f.image.as_ref())
            .map(|i| i.image.as_str())
            .filter(|name| !name.is_empty());

        // Name -> image, de-duplicated and ordered by name.
        let mut images = BTreeMap::new();
        for record in self.store.snapshot()?.containers {
            let Some(spec) = record.config.image.as_ref() else {
                continue;
            };
            if wanted.is_some_and(|w| w != spec.image) {
                continue;
            }
            images
                .entry(spec.image.clone())
                .or_insert_with(|| synthetic_image(&spec.image));
        }
        Ok(images.into_values().collect())
    }

    async fn image_status(&self, image: &ImageSpec) -> Result<Option<Image>> {
        if image.image.is_empty() {
            return Err(Error::InvalidArgument("image name is empty".to_string()));
        }
        Ok(Some(synthetic_image(&image.image)))
    }

    async fn pull_image(&self, image: &ImageSpec) -> Result<String> {
        if image.image.is_empty() {
            return Err(Error::InvalidArgument("image name is empty".to_string()));
        }
        let image_ref = image_digest(&image.image);
        info!("Image {} pulled as {}", image.image, image_ref);
        Ok(image_ref)
    }

    async fn remove_image(&self, image: &ImageSpec) -> Result<()> {
        debug!("Ignoring removal of image {}", image.image);
        Ok(())
    }

    async fn image_fs_info(&self) -> Result<Vec<FilesystemUsage>> {
        Ok(Vec::new())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn nanos(t: DateTime<Utc>) -> i64 {
    t.timestamp_nanos_opt().unwrap_or_default()
}

fn container_state(phase: Phase) -> ContainerState {
    match phase {
        Phase::Created => ContainerState::ContainerCreated,
        Phase::Running => ContainerState::ContainerRunning,
        Phase::Terminal(_) => ContainerState::ContainerExited,
    }
}

/// Synthetic content digest for an image name.
pub fn image_digest(image: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(image.as_bytes()))
}

fn synthetic_image(name: &str) -> Image {
    Image {
        id: image_digest(name),
        repo_tags: vec![name.to_string()],
        repo_digests: Vec::new(),
        size: 0,
    }
}

fn labels_match(labels: &HashMap<String, String>, selector: &HashMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

fn sandbox_matches(sandbox: &PodSandbox, filter: &PodSandboxFilter) -> bool {
    filter.id.as_ref().is_none_or(|id| *id == sandbox.id)
        && filter.state.is_none_or(|state| state == sandbox.state)
        && labels_match(&sandbox.labels, &filter.label_selector)
}

fn container_matches(container: &Container, filter: &ContainerFilter) -> bool {
    filter.id.as_ref().is_none_or(|id| *id == container.id)
        && filter.state.is_none_or(|state| state == container.state)
        && filter
            .pod_sandbox_id
            .as_ref()
            .is_none_or(|id| *id == container.pod_sandbox_id)
        && labels_match(&container.labels, &filter.label_selector)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_image_digest_is_stable() {
        let a = image_digest("nginx:1.25");
        assert_eq!(a, image_digest("nginx:1.25"));
        assert_ne!(a, image_digest("nginx:1.26"));
        assert!(a.starts_with("sha256:"));
        assert_eq!(a.len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_labels_match() {
        let l = labels(&[("app", "web"), ("tier", "front")]);
        assert!(labels_match(&l, &HashMap::new()));
        assert!(labels_match(&l, &labels(&[("app", "web")])));
        assert!(!labels_match(&l, &labels(&[("app", "db")])));
        assert!(!labels_match(&l, &labels(&[("zone", "a")])));
    }

    #[test]
    fn test_container_state_mapping() {
        assert_eq!(container_state(Phase::Created), ContainerState::ContainerCreated);
        assert_eq!(container_state(Phase::Running), ContainerState::ContainerRunning);
        assert_eq!(
            container_state(Phase::Terminal(TerminalPhase::Failed)),
            ContainerState::ContainerExited
        );
    }

    #[test]
    fn test_config_builders() {
        let config = RuntimeConfig::default()
            .with_runtime_handler("runc")
            .with_pod_ip("10.0.0.1")
            .with_missing_record_policy(MissingRecordPolicy::Strict)
            .with_request_timeout(Duration::from_secs(1));
        assert_eq!(config.runtime_handler, "runc");
        assert_eq!(config.pod_ip, "10.0.0.1");
        assert_eq!(config.missing_record_policy, MissingRecordPolicy::Strict);
        assert_eq!(config.request_timeout, Duration::from_secs(1));

        let default = RuntimeConfig::default();
        assert_eq!(default.runtime_handler, DEFAULT_RUNTIME_HANDLER);
        assert_eq!(default.missing_record_policy, MissingRecordPolicy::Tolerant);
    }
}
