//! Lifecycle event hook.
//!
//! The hollow runtime reports every successful lifecycle mutation to an
//! optional [`LifecycleHook`]. Hooks run synchronously on the caller's task,
//! after the store lock is released, and must not block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SandboxCreated,
    SandboxStopped,
    SandboxRemoved,
    ContainerCreated,
    ContainerStarted,
    ContainerStopped,
    ContainerRemoved,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::SandboxCreated => "sandbox_created",
            Self::SandboxStopped => "sandbox_stopped",
            Self::SandboxRemoved => "sandbox_removed",
            Self::ContainerCreated => "container_created",
            Self::ContainerStarted => "container_started",
            Self::ContainerStopped => "container_stopped",
            Self::ContainerRemoved => "container_removed",
        };
        f.write_str(s)
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// What happened.
    pub kind: EventKind,
    /// ID of the sandbox or container the event is about.
    pub id: String,
    /// Sandbox the record belongs to (equal to `id` for sandbox events).
    pub sandbox_id: String,
    /// When it happened.
    pub at: DateTime<Utc>,
}

/// Receiver of lifecycle events.
pub trait LifecycleHook: Send + Sync {
    /// Called once per event.
    fn on_event(&self, event: &LifecycleEvent);
}

impl<F> LifecycleHook for F
where
    F: Fn(&LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, event: &LifecycleEvent) {
        self(event)
    }
}
