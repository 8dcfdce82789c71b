//! # hollowrun
//!
//! **Simulated CRI Runtime for Hollow Nodes**
//!
//! A hollow node runs the real kubelet reconciliation loop against a
//! container runtime that never starts anything. This crate is that runtime:
//! it answers the CRI runtime and image services from an in-memory registry,
//! and makes each simulated pod appear to run for a configured time before
//! reaching a configured terminal phase.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Reconciliation loop (kubelet)                      │
//! └───────────────┬─────────────────────────────────────┬───────────────┘
//!                 │ RuntimeService / ImageService       │ JSON lines
//!                 │ (in process)                        ▼ (transport)
//! ┌───────────────┴─────────────────────────────────────────────────────┐
//! │                           HollowRuntime                             │
//! │   validate request → mutate store → derive phase → verify status    │
//! │                              │                       │              │
//! │                              │             LifecycleHook / sink     │
//! ├──────────────────────────────┼──────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────┴────────┐   ┌─────────────────────┐   │
//! │  │  directive  │──►│    StateStore    │──►│     lifecycle       │   │
//! │  │ labels →    │   │ sandboxes        │   │ timeline + now →    │   │
//! │  │ duration,   │   │ containers       │   │ Created / Running / │   │
//! │  │ phase       │   │ (one RwLock)     │   │ Terminal(phase)     │   │
//! │  └─────────────┘   └──────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Simulation Labels
//!
//! | Label                      | Value                                | Default |
//! |----------------------------|--------------------------------------|---------|
//! | `simulation.runDuration`   | duration (`30s`, `5m`, `1h30m`, `0`) | forever |
//! | `simulation.terminalPhase` | `Succeeded`, `Failed`, `Terminated`  | none    |
//!
//! A record only expires when both labels are present and valid. Malformed
//! values are ignored. Containers inherit whatever their sandbox sets.
//!
//! # Lifecycle
//!
//! ```text
//!   ┌─────────┐   start   ┌─────────┐   runDuration elapsed   ┌───────────────┐
//!   │ Created │ ────────► │ Running │ ──────────────────────► │ terminalPhase │
//!   └─────────┘           └─────────┘                         └───────────────┘
//!        │                     │          stop                        ▲
//!        └─────────────────────┴──────────────────────────────────────┘
//!                                    (Terminated)
//! ```
//!
//! Phases are derived at query time; nothing runs in the background.
//!
//! # Example
//!
//! ```rust,ignore
//! use hollowrun::{HollowRuntime, RuntimeService};
//! use hollowrun::cri::{PodSandboxConfig, PodSandboxMetadata};
//!
//! #[tokio::main]
//! async fn main() -> hollowrun::Result<()> {
//!     let runtime = HollowRuntime::new();
//!     let mut config = PodSandboxConfig::default();
//!     config.metadata = Some(PodSandboxMetadata {
//!         name: "web".into(),
//!         namespace: "default".into(),
//!         uid: "8c0e7a".into(),
//!         attempt: 0,
//!     });
//!     config.labels.insert("simulation.runDuration".into(), "5m".into());
//!     config.labels.insert("simulation.terminalPhase".into(), "Succeeded".into());
//!
//!     let id = runtime.run_pod_sandbox(&config, "").await?;
//!     let status = runtime.pod_sandbox_status(&id).await?;
//!     println!("{} is {}", id, status.state);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod constants;
pub mod cri;
pub mod directive;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod node;
pub mod runtime;
pub mod runtimes;
pub mod store;
pub mod transport;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use constants::*;
pub use directive::{Directive, TerminalPhase};
pub use error::{Error, RecordKind, Result};
pub use events::{EventKind, LifecycleEvent, LifecycleHook};
pub use lifecycle::{Phase, Timeline};
pub use metrics::{LogSink, MetricsSink, NodeMetric, SinkConfig};
pub use runtime::{ImageService, RuntimeService};
pub use runtimes::{HollowRuntime, MissingRecordPolicy, RuntimeConfig};
pub use store::{ContainerRecord, SandboxRecord, Snapshot, StateStore};
