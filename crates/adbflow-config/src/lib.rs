//! YAML configuration for adbflow
//!
//! Engine settings, workflow files and variable files are all plain YAML
//! with a few custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_list dir` - Concatenate lists from a directory
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use adbflow_config::{load_variables, load_workflow, EngineConfig};
//!
//! let config = EngineConfig::load_or_default("engine.yaml")?;
//! let graph = load_workflow("workflows/login.yaml")?;
//! let values = load_variables("workflows/login.vars.yaml")?;
//! ```

mod engine_config;
mod error;
mod loader;
mod secrets;
mod workflow;

pub use engine_config::EngineConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use secrets::Secrets;
pub use workflow::{load_variables, load_workflow, YamlWorkflowStore};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
