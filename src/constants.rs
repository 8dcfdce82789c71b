//! # Hollow Runtime Constants
//!
//! Label keys, protocol versions, timeouts and fake machine values shared
//! across the crate. These are the single source of truth for values the
//! external reconciliation loop observes.
//!
//! ## Cross-References
//!
//! - [`crate::directive`]: reads the simulation label keys
//! - [`crate::runtimes`]: reports versions and the fake pod IP
//! - [`crate::transport`]: bounds message size and request time
//! - [`crate::node`]: falls back to the fake machine values

use std::time::Duration;

// =============================================================================
// Simulation Directive Labels
// =============================================================================
//
// The only persisted input controlling simulated lifecycle. Both keys are read
// from sandbox and container configuration labels. Absence of either means the
// record never expires on its own.
// =============================================================================

/// Label carrying the simulated run duration (e.g. `"5m"`, `"30s"`).
pub const RUN_DURATION_LABEL: &str = "simulation.runDuration";

/// Label carrying the terminal phase reached once the run duration elapses.
///
/// Accepted values: `Terminated`, `Succeeded`, `Failed` (case-insensitive).
pub const TERMINAL_PHASE_LABEL: &str = "simulation.terminalPhase";

// =============================================================================
// Runtime Identity
// =============================================================================

/// Runtime name reported by `Version`.
pub const RUNTIME_NAME: &str = "hollowrun";

/// Runtime version reported by `Version`.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CRI API version this runtime speaks.
pub const CRI_API_VERSION: &str = "v1alpha2";

/// Kubelet-facing API version string reported by `Version`.
pub const KUBE_API_VERSION: &str = "0.1.0";

/// Runtime handler used when the caller does not name one.
pub const DEFAULT_RUNTIME_HANDLER: &str = "hollow";

/// IP address reported for every simulated sandbox.
pub const FAKE_POD_IP: &str = "192.168.192.168";

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit code reported for containers that reach `Succeeded`.
pub const EXIT_CODE_SUCCEEDED: i32 = 0;

/// Exit code reported for containers that reach `Failed`.
pub const EXIT_CODE_FAILED: i32 = 1;

/// Exit code reported for containers that reach `Terminated`.
///
/// 128 + SIGTERM, the shell convention for a signal-terminated process.
pub const EXIT_CODE_TERMINATED: i32 = 128 + 15;

// =============================================================================
// Transport Limits
// =============================================================================

/// Maximum size of a single transport message (16 MiB).
///
/// Matches the gRPC message limit the reconciliation loop configures for its
/// runtime client; the default 4 MiB is too small for large list responses.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Timeout applied to every runtime request (15 seconds).
///
/// Facade calls complete in local time; hitting this bound indicates a defect
/// rather than expected blocking.
pub const RUNTIME_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Fake Machine Info
// =============================================================================
//
// Reported when no node class is configured or a capacity value cannot be
// read. 1 core and 3.75 GiB keep hollow nodes schedulable.
// =============================================================================

/// Default number of cores for a hollow node.
pub const FAKE_NUM_CORES: u32 = 1;

/// Default memory capacity for a hollow node in bytes (3.75 GiB).
pub const FAKE_MEMORY_CAPACITY: u64 = 4_026_531_840;

/// Kernel version reported by the fake machine.
pub const FAKE_KERNEL_VERSION: &str = "3.16.0-0.bpo.4-amd64";

/// Container OS version reported by the fake machine.
pub const FAKE_CONTAINER_OS_VERSION: &str = "Debian GNU/Linux 7 (wheezy)";

/// Docker version reported by the fake machine.
pub const FAKE_DOCKER_VERSION: &str = "1.13.1";

/// Maximum number of pods a hollow node advertises.
pub const MAX_PODS: u32 = 110;
