//! Tracing-backed metrics sink.

use super::{MetricType, MetricsSink, NodeMetric};
use crate::error::Result;
use crate::events::{LifecycleEvent, LifecycleHook};
use chrono::Utc;
use tracing::{debug, info};

/// Writes metrics and lifecycle events to the tracing log.
#[derive(Debug, Clone)]
pub struct LogSink {
    node: String,
}

impl LogSink {
    /// Creates a log sink reporting for `node`.
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }

    /// Node this sink reports for.
    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }
}

impl MetricsSink for LogSink {
    fn initialization(&self) -> Result<()> {
        info!(node = %self.node, "log metrics sink initialized");
        Ok(())
    }

    fn log_node_metrics(&self, metric: &NodeMetric) -> Result<()> {
        let cpu = metric.capacity.get("cpu").map(String::as_str).unwrap_or("");
        let memory = metric.capacity.get("memory").map(String::as_str).unwrap_or("");
        let pods = metric.capacity.get("pods").map(String::as_str).unwrap_or("");

        match metric.metric_type {
            MetricType::Static => {
                info!(
                    metric_type = %metric.metric_type,
                    node = %self.node,
                    cpu,
                    memory,
                    pods,
                    "node metric"
                );
            }
            MetricType::Real => {
                let at = metric.sample_time.unwrap_or_else(Utc::now);
                info!(
                    metric_type = %metric.metric_type,
                    node = %self.node,
                    cpu,
                    memory,
                    pods,
                    timestamp = at.timestamp(),
                    "node metric"
                );
            }
        }
        Ok(())
    }
}

impl LifecycleHook for LogSink {
    fn on_event(&self, event: &LifecycleEvent) {
        debug!(
            node = %self.node,
            kind = %event.kind,
            id = %event.id,
            sandbox = %event.sandbox_id,
            "lifecycle event"
        );
    }
}
