//! Metrics sink configuration.
//!
//! ```yaml
//! sink: log
//! parameter:
//!   key: value
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Selects and parameterizes a metrics sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Sink name (`log`).
    pub sink: String,
    /// Sink-specific parameters.
    pub parameter: HashMap<String, String>,
}

impl SinkConfig {
    /// Loads a sink configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigRead`] if the file cannot be read
    /// - [`Error::Config`] if the YAML is malformed
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&data)
    }

    /// Parses a sink configuration from YAML bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(data)
            .map_err(|e| Error::Config(format!("sink config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_sink_config() {
        let yaml = b"sink: log\nparameter:\n  interval: 10s\n";
        let config = SinkConfig::from_bytes(yaml).unwrap();
        assert_eq!(config.sink, "log");
        assert_eq!(config.parameter.get("interval").map(String::as_str), Some("10s"));
    }

    #[test]
    fn test_parse_without_parameters() {
        let config = SinkConfig::from_bytes(b"sink: mysql\n").unwrap();
        assert_eq!(config.sink, "mysql");
        assert!(config.parameter.is_empty());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = SinkConfig::from_bytes(b"sink: [unclosed").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"sink: log\n").unwrap();
        let config = SinkConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.sink, "log");

        let err = SinkConfig::from_yaml_file("/nonexistent/sink.yaml").unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
