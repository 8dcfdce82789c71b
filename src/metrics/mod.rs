//! # Metrics Sink
//!
//! Hook points for reporting hollow node metrics to an external sink. The
//! hollow runtime itself is metrics-agnostic: surrounding orchestration (the
//! `hollowrun` binary) initializes a sink and reports node capacity through
//! it. Persistent backends live outside this crate; the built-in
//! [`LogSink`] writes metrics to the tracing log.
//!
//! ```text
//! SinkConfig (YAML) ──▶ manufacture_sink() ──▶ Box<dyn MetricsSink>
//!                                                  │
//!                     initialization() ◀───────────┤
//!                     log_node_metrics(NodeMetric) ◀┘
//! ```

mod config;
mod log;

pub use config::SinkConfig;
pub use log::LogSink;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Name of the built-in log sink.
pub const LOG_SINK: &str = "log";

/// How a node metric was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Configured capacity, reported once at startup.
    Static,
    /// Sampled usage.
    Real,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Real => write!(f, "real"),
        }
    }
}

/// Node-level metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetric {
    /// Static or sampled.
    pub metric_type: MetricType,
    /// Resource name to quantity (e.g. `cpu` → `4`, `memory` → `8Gi`).
    pub capacity: HashMap<String, String>,
    /// When the sample was taken (sampled metrics only).
    pub sample_time: Option<DateTime<Utc>>,
}

impl NodeMetric {
    /// Creates a static capacity metric.
    pub fn static_capacity(capacity: HashMap<String, String>) -> Self {
        Self {
            metric_type: MetricType::Static,
            capacity,
            sample_time: None,
        }
    }

    /// Creates a sampled metric.
    pub fn sampled(capacity: HashMap<String, String>, at: DateTime<Utc>) -> Self {
        Self {
            metric_type: MetricType::Real,
            capacity,
            sample_time: Some(at),
        }
    }
}

/// Destination for hollow node metrics.
pub trait MetricsSink: Send + Sync {
    /// Prepares the sink. Called once before any metric is logged.
    fn initialization(&self) -> Result<()>;

    /// Records a node metric.
    fn log_node_metrics(&self, metric: &NodeMetric) -> Result<()>;
}

/// Builds the sink named by `config` for `node`.
///
/// A missing config or an unknown sink name yields a [`LogSink`].
pub fn manufacture_sink(config: Option<&SinkConfig>, node: &str) -> Box<dyn MetricsSink> {
    let sink = config.map(|c| c.sink.as_str()).unwrap_or(LOG_SINK);
    match sink {
        LOG_SINK | "" => Box::new(LogSink::new(node)),
        other => {
            warn!("metrics sink '{}' is not built in, using '{}'", other, LOG_SINK);
            Box::new(LogSink::new(node))
        }
    }
}
