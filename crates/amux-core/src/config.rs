//! Minimal config loader (`.amux/config.yaml`'s sibling `config.toml` for
//! amux-core-owned defaults). Schema/validation depth is out of scope;
//! this loader reads the file, falls back to defaults when absent, the
//! same way `kild-config` loads `config.toml` (ground: `kild-config`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse '{path}': {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AmuxConfig {
    pub default_semaphore_capacity: u32,
    pub default_runtime: String,
    pub default_base_branch: String,
    pub tmux_remain_on_exit: bool,
}

impl Default for AmuxConfig {
    fn default() -> Self {
        Self {
            default_semaphore_capacity: 1,
            default_runtime: "local".to_string(),
            default_base_branch: "main".to_string(),
            tmux_remain_on_exit: false,
        }
    }
}

impl AmuxConfig {
    /// Loads `path`, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })
            }
        };

        toml::from_str(&content).map_err(|e| {
            warn!(event = "core.config.parse_failed", path = %path.display(), error = %e);
            ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AmuxConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.default_runtime, "local");
        assert_eq!(config.default_semaphore_capacity, 1);
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_runtime = \"tmux\"\n").unwrap();
        let config = AmuxConfig::load(&path).unwrap();
        assert_eq!(config.default_runtime, "tmux");
        assert_eq!(config.default_base_branch, "main");
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not valid toml :::").unwrap();
        assert!(matches!(AmuxConfig::load(&path), Err(ConfigError::Parse { .. })));
    }
}
