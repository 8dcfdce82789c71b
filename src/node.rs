//! Hollow node capacity and machine info.
//!
//! A node resource file describes classes of simulated nodes:
//!
//! ```yaml
//! nodeclasses:
//!   - name: small
//!     labels:
//!       node.kubernetes.io/instance-type: small
//!     resources:
//!       capacity:
//!         cpu: "4"
//!         memory: 8Gi
//! ```
//!
//! Each hollow node picks one class at startup. The capacity is reported as
//! is; values that cannot be read fall back to the fake machine defaults.

use crate::constants::{
    FAKE_CONTAINER_OS_VERSION, FAKE_DOCKER_VERSION, FAKE_KERNEL_VERSION, FAKE_MEMORY_CAPACITY,
    FAKE_NUM_CORES, MAX_PODS,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Capacity resource name for CPU cores.
pub const RESOURCE_CPU: &str = "cpu";

/// Capacity resource name for memory.
pub const RESOURCE_MEMORY: &str = "memory";

/// Capacity resource name for the pod limit.
pub const RESOURCE_PODS: &str = "pods";

// =============================================================================
// Node Resource Config
// =============================================================================

/// All node classes in a node resource file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeResourceConfig {
    /// Node classes; names are unique ignoring case.
    #[serde(rename = "nodeclasses", default)]
    pub node_classes: Vec<NodeClass>,
}

/// A class of simulated nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeClass {
    /// Class name.
    pub name: String,
    /// Labels added to nodes of this class.
    pub labels: HashMap<String, String>,
    /// Node resources.
    pub resources: NodeResources,
}

/// Resources of a node class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeResources {
    /// Resource name to quantity.
    pub capacity: HashMap<String, String>,
}

impl NodeResourceConfig {
    /// Parses and validates a node resource file.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if the YAML is malformed or two classes share a name.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let config: Self = serde_yaml::from_slice(data)
            .map_err(|e| Error::Config(format!("node resource config: {}", e)))?;

        let mut seen = HashSet::new();
        for class in &config.node_classes {
            let name = class.name.to_lowercase();
            if !seen.insert(name.clone()) {
                return Err(Error::Config(format!(
                    "node class name [{}] is not unique",
                    name
                )));
            }
        }
        Ok(config)
    }

    /// Loads a node resource file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    /// Finds a class by name, ignoring case.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&NodeClass> {
        let name = name.to_lowercase();
        self.node_classes
            .iter()
            .find(|c| c.name.to_lowercase() == name)
    }
}

// =============================================================================
// Machine Info
// =============================================================================

/// Machine description reported for a hollow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Number of CPU cores.
    pub num_cores: u32,
    /// Memory capacity in bytes.
    pub memory_capacity: u64,
    /// Instance ID (the node name).
    pub instance_id: String,
}

impl MachineInfo {
    /// Builds machine info for `node_name` from an optional node class.
    pub fn from_node_class(node_name: &str, class: Option<&NodeClass>) -> Self {
        let capacity = class.map(|c| &c.resources.capacity);

        let num_cores = capacity
            .and_then(|c| c.get(RESOURCE_CPU))
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(FAKE_NUM_CORES);

        let memory_capacity = capacity
            .and_then(|c| c.get(RESOURCE_MEMORY))
            .and_then(|v| parse_quantity(v))
            .unwrap_or(FAKE_MEMORY_CAPACITY);

        Self {
            num_cores,
            memory_capacity,
            instance_id: node_name.to_string(),
        }
    }

    /// Capacity map suitable for a static [`crate::metrics::NodeMetric`].
    #[must_use]
    pub fn capacity(&self) -> HashMap<String, String> {
        HashMap::from([
            (RESOURCE_CPU.to_string(), self.num_cores.to_string()),
            (RESOURCE_MEMORY.to_string(), self.memory_capacity.to_string()),
            (RESOURCE_PODS.to_string(), MAX_PODS.to_string()),
        ])
    }
}

/// Software versions reported for a hollow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub kernel_version: String,
    pub container_os_version: String,
    pub docker_version: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            kernel_version: FAKE_KERNEL_VERSION.to_string(),
            container_os_version: FAKE_CONTAINER_OS_VERSION.to_string(),
            docker_version: FAKE_DOCKER_VERSION.to_string(),
        }
    }
}

/// Parses a Kubernetes memory quantity (`8Gi`, `3750Mi`, `16G`, `1e9`,
/// `4026531840`) into bytes.
fn parse_quantity(value: &str) -> Option<u64> {
    const SUFFIXES: &[(&str, u64)] = &[
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
        ("Pi", 1 << 50),
        ("Ei", 1 << 60),
        ("k", 1_000),
        ("M", 1_000_000),
        ("G", 1_000_000_000),
        ("T", 1_000_000_000_000),
        ("P", 1_000_000_000_000_000),
        ("E", 1_000_000_000_000_000_000),
    ];

    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = value.strip_suffix(suffix) {
            let n: f64 = number.parse().ok()?;
            return to_bytes(n * *multiplier as f64);
        }
    }

    // Plain number, possibly in exponent form.
    to_bytes(value.parse().ok()?)
}

fn to_bytes(n: f64) -> Option<u64> {
    (n.is_finite() && n >= 0.0 && n <= u64::MAX as f64).then(|| n.ceil() as u64)
}
