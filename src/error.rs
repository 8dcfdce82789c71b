//! Error types for the hollow runtime.

use std::path::PathBuf;

/// Result type alias for hollow runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A pod sandbox.
    Sandbox,
    /// A container inside a sandbox.
    Container,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "pod sandbox"),
            Self::Container => write!(f, "container"),
        }
    }
}

/// Errors that can occur in the hollow runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    /// A required top-level request field is missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not supported by this runtime.
    #[error("operation not supported: {0}")]
    NotSupported(String),

    // =========================================================================
    // Record Lifecycle Errors
    // =========================================================================
    /// A create call used an identifier that already exists.
    #[error("{kind} '{id}' already exists")]
    DuplicateId { kind: RecordKind, id: String },

    /// Container creation referenced a sandbox that does not exist.
    #[error("parent pod sandbox '{sandbox_id}' not found for container '{container_id}'")]
    ParentNotFound {
        sandbox_id: String,
        container_id: String,
    },

    /// A status or mutation call referenced an unknown record.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// The record is in the wrong state for the operation.
    #[error("{kind} '{id}' is in state '{state}', expected '{expected}'")]
    InvalidState {
        kind: RecordKind,
        id: String,
        state: String,
        expected: String,
    },

    // =========================================================================
    // Status Verification Errors
    // =========================================================================
    /// A status response is missing required fields.
    #[error("invalid {kind} status: {reason}")]
    Validation { kind: RecordKind, reason: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file could not be parsed or is inconsistent.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Metrics sink failure.
    #[error("metrics sink error: {0}")]
    Metrics(String),

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn not_found(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn duplicate(kind: RecordKind, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn validation(kind: RecordKind, reason: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns true if this error reports an unknown record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
