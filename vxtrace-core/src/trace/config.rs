//! Trace configuration.
//!
//! File names are fixed and joined to a prefix by plain string concatenation,
//! so `TRACE_DUMP_PREFIX=/tmp/run1_` yields `/tmp/run1_trace_log.cc`.

use crate::trace::error::{TraceError, TraceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable holding the dump prefix.
pub const PREFIX_ENV: &str = "TRACE_DUMP_PREFIX";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TraceConfig {
    /// Prepended verbatim to every file name.
    pub prefix: String,
    pub log_file: String,
    pub payload_file: String,
    pub replay_log_file: String,
    pub replay_payload_file: String,
    /// Namespace the emitted statements qualify constructors with.
    pub namespace: String,
    /// Name prefix for types without an entry in `object_prefixes`.
    pub default_prefix: String,
    pub object_prefixes: BTreeMap<String, String>,
    /// Emit fill statements for constant tensors created without data.
    pub fill_constant_tensors: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        let object_prefixes = [
            ("Quantization", "quant_"),
            ("TensorSpec", "spec_"),
            ("Tensor", "tensor_"),
            ("Graph", "graph_"),
            ("Context", "context_"),
        ]
        .into_iter()
        .map(|(ty, prefix)| (ty.to_string(), prefix.to_string()))
        .collect();

        Self {
            prefix: String::new(),
            log_file: "trace_log.cc".to_string(),
            payload_file: "trace_bin.bin".to_string(),
            replay_log_file: "trace_log.rpl.cc".to_string(),
            replay_payload_file: "trace_bin.rpl.bin".to_string(),
            namespace: "tim::vx".to_string(),
            default_prefix: "obj_".to_string(),
            object_prefixes,
            fill_constant_tensors: true,
        }
    }
}

impl TraceConfig {
    /// Create a configuration rooted at `prefix`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    /// Default configuration with the prefix taken from `TRACE_DUMP_PREFIX`.
    pub fn from_env() -> Self {
        match std::env::var(PREFIX_ENV) {
            Ok(prefix) => Self::with_prefix(prefix),
            Err(_) => Self::default(),
        }
    }

    pub fn load(path: &Path) -> TraceResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TraceError::Config(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| TraceError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> TraceResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| TraceError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Name prefix for objects of `type_name`.
    pub fn object_prefix(&self, type_name: &str) -> &str {
        self.object_prefixes
            .get(type_name)
            .map(String::as_str)
            .unwrap_or(&self.default_prefix)
    }

    pub fn log_path(&self) -> PathBuf {
        self.prefixed(&self.log_file)
    }

    pub fn payload_path(&self) -> PathBuf {
        self.prefixed(&self.payload_file)
    }

    pub fn replay_log_path(&self) -> PathBuf {
        self.prefixed(&self.replay_log_file)
    }

    pub fn replay_payload_path(&self) -> PathBuf {
        self.prefixed(&self.replay_payload_file)
    }

    fn prefixed(&self, file: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", self.prefix, file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_is_prepended_verbatim() {
        let config = TraceConfig::with_prefix("/tmp/run1_");
        assert_eq!(config.log_path(), PathBuf::from("/tmp/run1_trace_log.cc"));
        assert_eq!(config.payload_path(), PathBuf::from("/tmp/run1_trace_bin.bin"));
        assert_eq!(
            config.replay_payload_path(),
            PathBuf::from("/tmp/run1_trace_bin.rpl.bin")
        );
    }

    #[test]
    fn test_unknown_type_uses_default_prefix() {
        let config = TraceConfig::default();
        assert_eq!(config.object_prefix("Tensor"), "tensor_");
        assert_eq!(config.object_prefix("Whatever"), "obj_");
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trace.json");
        let mut config = TraceConfig::with_prefix("x_");
        config.fill_constant_tensors = false;
        config.save(&path).unwrap();
        assert_eq!(TraceConfig::load(&path).unwrap(), config);
    }
}
