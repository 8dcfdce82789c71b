//! # Lifecycle State Store
//!
//! Concurrency-safe registry of simulated sandbox and container records. The
//! store is the only shared mutable state in the hollow runtime; every other
//! component works on the copies it hands out.
//!
//! ## Locking
//!
//! One [`RwLock`] guards both maps so cascading removal and parent checks are
//! atomic. The lock is held only for the map lookup or mutation itself. Phase
//! derivation ([`crate::lifecycle`]) runs on cloned records after the guard is
//! dropped.
//!
//! ## Records
//!
//! Configurations are stored behind [`Arc`], so cloning a record (and taking a
//! [`Snapshot`]) is cheap and the copies cannot reach store-internal state.
//! Records are kept until explicitly removed; there is no garbage collection
//! of long-terminated records.

use crate::clock::{Clock, SystemClock};
use crate::cri::{ContainerConfig, PodSandboxConfig};
use crate::directive::Directive;
use crate::error::{Error, RecordKind, Result};
use crate::lifecycle::Timeline;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

// =============================================================================
// Records
// =============================================================================

/// Simulated pod sandbox.
#[derive(Debug, Clone)]
pub struct SandboxRecord {
    /// Sandbox ID.
    pub id: String,
    /// Configuration the sandbox was created with.
    pub config: Arc<PodSandboxConfig>,
    /// Runtime handler the sandbox was created with.
    pub runtime_handler: String,
    /// Directive parsed from the configuration labels.
    pub directive: Directive,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Explicit stop time (the forced-terminal flag).
    pub stopped_at: Option<DateTime<Utc>>,
}

impl SandboxRecord {
    /// Timeline for phase derivation. Sandboxes run from creation.
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        Timeline {
            created_at: self.created_at,
            started_at: Some(self.created_at),
            stopped_at: self.stopped_at,
            directive: self.directive,
        }
    }
}

/// Simulated container.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    /// Container ID.
    pub id: String,
    /// Parent sandbox ID.
    pub sandbox_id: String,
    /// Configuration the container was created with.
    pub config: Arc<ContainerConfig>,
    /// Digest of the container image.
    pub image_ref: String,
    /// Directive from the container labels, completed by the sandbox directive.
    pub directive: Directive,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Start time.
    pub started_at: Option<DateTime<Utc>>,
    /// Explicit stop time (the forced-terminal flag).
    pub stopped_at: Option<DateTime<Utc>>,
}

impl ContainerRecord {
    /// Timeline for phase derivation.
    #[must_use]
    pub fn timeline(&self) -> Timeline {
        Timeline {
            created_at: self.created_at,
            started_at: self.started_at,
            stopped_at: self.stopped_at,
            directive: self.directive,
        }
    }
}

/// Independent copy of every record in the store.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// All sandboxes.
    pub sandboxes: Vec<SandboxRecord>,
    /// All containers.
    pub containers: Vec<ContainerRecord>,
}

#[derive(Debug, Default)]
struct Records {
    sandboxes: HashMap<String, SandboxRecord>,
    containers: HashMap<String, ContainerRecord>,
}

// =============================================================================
// State Store
// =============================================================================

/// Registry of simulated sandboxes and containers.
///
/// ## Thread Safety
///
/// `StateStore` is `Send + Sync` and meant to be shared (usually behind an
/// [`Arc`]) by every worker of the reconciliation loop of one hollow node.
#[derive(Debug)]
pub struct StateStore {
    records: RwLock<Records>,
    clock: Arc<dyn Clock>,
}

impl StateStore {
    /// Creates an empty store using wall-clock time.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping records with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            clock,
        }
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Clock used to stamp records.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Records>> {
        self.records
            .read()
            .map_err(|e| Error::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Records>> {
        self.records
            .write()
            .map_err(|e| Error::Internal(format!("lock poisoned: {}", e)))
    }

    // =========================================================================
    // Sandboxes
    // =========================================================================

    /// Inserts a new sandbox record stamped with the current time.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateId`] if `id` already exists; the existing record is
    /// left untouched.
    pub fn add_sandbox(
        &self,
        id: &str,
        config: PodSandboxConfig,
        runtime_handler: &str,
    ) -> Result<()> {
        // Parse and stamp before taking the lock.
        let record = SandboxRecord {
            id: id.to_string(),
            directive: Directive::from_labels(&config.labels),
            config: Arc::new(config),
            runtime_handler: runtime_handler.to_string(),
            created_at: self.clock.now(),
            stopped_at: None,
        };

        {
            let mut records = self.write()?;
            if records.sandboxes.contains_key(id) {
                return Err(Error::duplicate(RecordKind::Sandbox, id));
            }
            records.sandboxes.insert(id.to_string(), record);
        }

        debug!("Added sandbox record {}", id);
        Ok(())
    }

    /// Removes a sandbox and every container inside it.
    ///
    /// Returns `false` if the sandbox did not exist (not an error).
    pub fn remove_sandbox(&self, id: &str) -> Result<bool> {
        let (removed, children) = {
            let mut records = self.write()?;
            let removed = records.sandboxes.remove(id).is_some();
            let before = records.containers.len();
            records.containers.retain(|_, c| c.sandbox_id != id);
            (removed, before - records.containers.len())
        };

        if removed || children > 0 {
            debug!(
                "Removed sandbox record {} and {} container record(s)",
                id, children
            );
        }
        Ok(removed)
    }

    /// Marks a sandbox and all its containers as explicitly stopped.
    ///
    /// The first stop wins; later stops keep the original stop time. Returns
    /// `false` if the sandbox does not exist.
    pub fn stop_sandbox(&self, id: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut records = self.write()?;

        let Some(sandbox) = records.sandboxes.get_mut(id) else {
            return Ok(false);
        };
        sandbox.stopped_at.get_or_insert(now);

        for container in records.containers.values_mut() {
            if container.sandbox_id == id {
                container.stopped_at.get_or_insert(now);
            }
        }
        Ok(true)
    }

    /// Returns a copy of a sandbox record.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the sandbox does not exist.
    pub fn sandbox(&self, id: &str) -> Result<SandboxRecord> {
        self.read()?
            .sandboxes
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Sandbox, id))
    }

    // =========================================================================
    // Containers
    // =========================================================================

    /// Inserts a new container record inside an existing sandbox.
    ///
    /// The container's directive falls back field-wise to its sandbox's.
    ///
    /// # Errors
    ///
    /// - [`Error::ParentNotFound`] if `sandbox_id` does not exist
    /// - [`Error::DuplicateId`] if `id` already exists
    pub fn add_container(
        &self,
        id: &str,
        sandbox_id: &str,
        config: ContainerConfig,
        image_ref: &str,
    ) -> Result<()> {
        let own = Directive::from_labels(&config.labels);
        let config = Arc::new(config);
        let created_at = self.clock.now();

        {
            let mut records = self.write()?;

            let Some(parent) = records.sandboxes.get(sandbox_id) else {
                return Err(Error::ParentNotFound {
                    sandbox_id: sandbox_id.to_string(),
                    container_id: id.to_string(),
                });
            };
            let directive = own.or(parent.directive);

            if records.containers.contains_key(id) {
                return Err(Error::duplicate(RecordKind::Container, id));
            }

            records.containers.insert(
                id.to_string(),
                ContainerRecord {
                    id: id.to_string(),
                    sandbox_id: sandbox_id.to_string(),
                    config,
                    image_ref: image_ref.to_string(),
                    directive,
                    created_at,
                    started_at: None,
                    stopped_at: None,
                },
            );
        }

        debug!("Added container record {} in sandbox {}", id, sandbox_id);
        Ok(())
    }

    /// Marks a container as started. Starting a running container is a no-op.
    ///
    /// Returns the id of the owning sandbox.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the container does not exist
    /// - [`Error::InvalidState`] if the container was already stopped
    pub fn start_container(&self, id: &str) -> Result<String> {
        let now = self.clock.now();
        let mut records = self.write()?;

        let container = records
            .containers
            .get_mut(id)
            .ok_or_else(|| Error::not_found(RecordKind::Container, id))?;

        if container.stopped_at.is_some() {
            return Err(Error::InvalidState {
                kind: RecordKind::Container,
                id: id.to_string(),
                state: "exited".to_string(),
                expected: "created".to_string(),
            });
        }
        container.started_at.get_or_insert(now);
        Ok(container.sandbox_id.clone())
    }

    /// Marks a container as explicitly stopped. The first stop wins.
    ///
    /// Returns the id of the owning sandbox, or `None` if the container does
    /// not exist.
    pub fn stop_container(&self, id: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut records = self.write()?;

        Ok(records.containers.get_mut(id).map(|container| {
            container.stopped_at.get_or_insert(now);
            container.sandbox_id.clone()
        }))
    }

    /// Removes a container record.
    ///
    /// Returns `false` if the container did not exist (not an error).
    pub fn remove_container(&self, id: &str) -> Result<bool> {
        let removed = self.write()?.containers.remove(id).is_some();
        if removed {
            debug!("Removed container record {}", id);
        }
        Ok(removed)
    }

    /// Returns a copy of a container record.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the container does not exist.
    pub fn container(&self, id: &str) -> Result<ContainerRecord> {
        self.read()?
            .containers
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(RecordKind::Container, id))
    }

    // =========================================================================
    // Whole-store Reads
    // =========================================================================

    /// Returns an independent copy of all records.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let records = self.read()?;
        Ok(Snapshot {
            sandboxes: records.sandboxes.values().cloned().collect(),
            containers: records.containers.values().cloned().collect(),
        })
    }

    /// Number of sandbox records.
    pub fn sandbox_count(&self) -> Result<usize> {
        Ok(self.read()?.sandboxes.len())
    }

    /// Number of container records.
    pub fn container_count(&self) -> Result<usize> {
        Ok(self.read()?.containers.len())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::constants::{RUN_DURATION_LABEL, TERMINAL_PHASE_LABEL};
    use crate::cri::{ContainerMetadata, ImageSpec, PodSandboxMetadata};
    use crate::directive::TerminalPhase;
    use std::time::Duration;

    fn sandbox_config(labels: &[(&str, &str)]) -> PodSandboxConfig {
        PodSandboxConfig {
            metadata: Some(PodSandboxMetadata {
                name: "pod".to_string(),
                uid: "uid".to_string(),
                namespace: "default".to_string(),
                attempt: 0,
            }),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    fn container_config(labels: &[(&str, &str)]) -> ContainerConfig {
        ContainerConfig {
            metadata: Some(ContainerMetadata {
                name: "app".to_string(),
                attempt: 0,
            }),
            image: Some(ImageSpec::new("busybox")),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_sandbox_captures_directive_and_time() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = StateStore::with_clock(clock.clone());
        store
            .add_sandbox(
                "sb1",
                sandbox_config(&[(RUN_DURATION_LABEL, "2s"), (TERMINAL_PHASE_LABEL, "Terminated")]),
                "hollow",
            )
            .unwrap();

        let record = store.sandbox("sb1").unwrap();
        assert_eq!(record.created_at, clock.now());
        assert_eq!(record.directive.duration, Some(Duration::from_secs(2)));
        assert_eq!(record.directive.terminal_phase, Some(TerminalPhase::Terminated));
        assert_eq!(record.stopped_at, None);
    }

    #[test]
    fn test_duplicate_sandbox_leaves_original() {
        let store = StateStore::new();
        store
            .add_sandbox("sb1", sandbox_config(&[]), "first")
            .unwrap();

        let err = store
            .add_sandbox("sb1", sandbox_config(&[(RUN_DURATION_LABEL, "1s")]), "second")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateId {
                kind: RecordKind::Sandbox,
                ..
            }
        ));

        let record = store.sandbox("sb1").unwrap();
        assert_eq!(record.runtime_handler, "first");
        assert_eq!(record.directive, Directive::default());
    }

    #[test]
    fn test_container_requires_parent() {
        let store = StateStore::new();
        let err = store
            .add_container("c1", "missing", container_config(&[]), "sha256:x")
            .unwrap_err();
        assert!(matches!(err, Error::ParentNotFound { ref sandbox_id, .. } if sandbox_id == "missing"));
        assert_eq!(store.container_count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_container() {
        let store = StateStore::new();
        store.add_sandbox("sb1", sandbox_config(&[]), "").unwrap();
        store
            .add_container("c1", "sb1", container_config(&[]), "sha256:x")
            .unwrap();
        let err = store
            .add_container("c1", "sb1", container_config(&[]), "sha256:y")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateId {
                kind: RecordKind::Container,
                ..
            }
        ));
        assert_eq!(store.container("c1").unwrap().image_ref, "sha256:x");
    }

    #[test]
    fn test_container_inherits_sandbox_directive() {
        let store = StateStore::new();
        store
            .add_sandbox(
                "sb1",
                sandbox_config(&[(RUN_DURATION_LABEL, "10m"), (TERMINAL_PHASE_LABEL, "Succeeded")]),
                "",
            )
            .unwrap();
        store
            .add_container(
                "c1",
                "sb1",
                container_config(&[(RUN_DURATION_LABEL, "1m")]),
                "sha256:x",
            )
            .unwrap();

        let directive = store.container("c1").unwrap().directive;
        assert_eq!(directive.duration, Some(Duration::from_secs(60)));
        assert_eq!(directive.terminal_phase, Some(TerminalPhase::Succeeded));
    }

    #[test]
    fn test_remove_sandbox_cascades() {
        let store = StateStore::new();
        store.add_sandbox("sb1", sandbox_config(&[]), "").unwrap();
        store.add_sandbox("sb2", sandbox_config(&[]), "").unwrap();
        store.add_container("c1", "sb1", container_config(&[]), "r").unwrap();
        store.add_container("c2", "sb1", container_config(&[]), "r").unwrap();
        store.add_container("c3", "sb2", container_config(&[]), "r").unwrap();

        assert!(store.remove_sandbox("sb1").unwrap());
        assert!(store.sandbox("sb1").unwrap_err().is_not_found());
        assert!(store.container("c1").unwrap_err().is_not_found());
        assert!(store.container("c2").unwrap_err().is_not_found());
        assert!(store.container("c3").is_ok());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let store = StateStore::new();
        assert!(!store.remove_sandbox("nope").unwrap());
        assert!(!store.remove_container("nope").unwrap());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = StateStore::with_clock(clock.clone());
        store.add_sandbox("sb1", sandbox_config(&[]), "").unwrap();
        store.add_container("c1", "sb1", container_config(&[]), "r").unwrap();

        let first_stop = clock.now();
        assert!(store.stop_sandbox("sb1").unwrap());
        clock.advance(Duration::from_secs(30));
        assert!(store.stop_sandbox("sb1").unwrap());

        assert_eq!(store.sandbox("sb1").unwrap().stopped_at, Some(first_stop));
        assert_eq!(store.container("c1").unwrap().stopped_at, Some(first_stop));
        assert!(!store.stop_sandbox("missing").unwrap());
    }

    #[test]
    fn test_start_after_stop_rejected() {
        let store = StateStore::new();
        store.add_sandbox("sb1", sandbox_config(&[]), "").unwrap();
        store.add_container("c1", "sb1", container_config(&[]), "r").unwrap();
        assert_eq!(store.stop_container("c1").unwrap().as_deref(), Some("sb1"));

        let err = store.start_container("c1").unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert!(store.start_container("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_start_and_stop_report_parent() {
        let store = StateStore::new();
        store.add_sandbox("sb1", sandbox_config(&[]), "").unwrap();
        store.add_container("c1", "sb1", container_config(&[]), "r").unwrap();

        assert_eq!(store.start_container("c1").unwrap(), "sb1");
        // Repeated start still reports the parent.
        assert_eq!(store.start_container("c1").unwrap(), "sb1");
        assert_eq!(store.stop_container("c1").unwrap().as_deref(), Some("sb1"));
        assert_eq!(store.stop_container("missing").unwrap(), None);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let store = StateStore::new();
        store.add_sandbox("sb1", sandbox_config(&[]), "").unwrap();

        let mut snapshot = store.snapshot().unwrap();
        snapshot.sandboxes[0].stopped_at = Some(Utc::now());
        snapshot.sandboxes.clear();

        assert_eq!(store.sandbox_count().unwrap(), 1);
        assert_eq!(store.sandbox("sb1").unwrap().stopped_at, None);
    }
}
