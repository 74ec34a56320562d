//! Engine settings
//!
//! ```yaml
//! max_steps: 10000          # null disables the ceiling
//! adb:
//!   binary: adb
//!   serial: !env_var ANDROID_SERIAL emulator-5554
//!   command_timeout_ms: 15000
//!   text_chunk: 64
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;
use adbflow_device::AdbConfig;
use adbflow_engine::{RunnerConfig, DEFAULT_MAX_STEPS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Engine configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Step ceiling per run
    pub max_steps: Option<usize>,

    /// Device client settings
    pub adb: AdbConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(DEFAULT_MAX_STEPS),
            adb: AdbConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let value = load_yaml(path)?;

        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_yaml::from_value(value).map_err(|source| ConfigError::Shape {
                path: path.to_path_buf(),
                document: "engine settings file",
                source,
            })?
        };

        config.validate()?;
        debug!(?config, "Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Load from a YAML file, falling back to defaults when it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No engine config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Check value ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_steps == Some(0) {
            return Err(invalid("max_steps", "must be at least 1, or null to disable"));
        }
        if self.adb.command_timeout_ms == 0 {
            return Err(invalid("adb.command_timeout_ms", "must be greater than 0"));
        }
        if self.adb.text_chunk == 0 {
            return Err(invalid("adb.text_chunk", "must be greater than 0"));
        }
        Ok(())
    }

    /// Settings for the workflow runner
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_steps: self.max_steps,
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_steps, Some(10_000));
        assert_eq!(config.adb.binary, PathBuf::from("adb"));
        assert_eq!(config.runner_config(), RunnerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "adb:\n  serial: emulator-5556\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.max_steps, Some(10_000));
        assert_eq!(config.adb.serial.as_deref(), Some("emulator-5556"));
        assert_eq!(config.adb.command_timeout_ms, 15_000);
    }

    #[test]
    fn test_null_disables_step_ceiling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.yaml");
        fs::write(&path, "max_steps: null\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.runner_config().max_steps, None);
    }

    #[test]
    fn test_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.yaml");

        fs::write(&path, "max_steps: 0\n").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::InvalidValue { key, .. }) if key == "max_steps"
        ));

        fs::write(&path, "max_steps: lots\n").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(ConfigError::Shape { .. })
        ));
    }

    #[test]
    fn test_load_or_default() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.yaml");

        assert_eq!(
            EngineConfig::load_or_default(&missing).unwrap(),
            EngineConfig::default()
        );
        assert!(matches!(
            EngineConfig::load(&missing),
            Err(ConfigError::Io { .. })
        ));

        let empty = dir.path().join("empty.yaml");
        fs::write(&empty, "").unwrap();
        assert_eq!(EngineConfig::load(&empty).unwrap(), EngineConfig::default());
    }
}
