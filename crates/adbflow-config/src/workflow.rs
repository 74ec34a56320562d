//! Workflow and variable files
//!
//! A workflow file is the serialized form of a
//! [`WorkflowGraph`](adbflow_engine::WorkflowGraph). A variable file is a
//! flat mapping of names to scalar values, usually with `!secret` for
//! credentials.

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;
use crate::secrets::scalar_to_string;
use adbflow_core::VariableValueMap;
use adbflow_engine::{StoreError, StoreResult, WorkflowGraph, WorkflowStore};
use async_trait::async_trait;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Load a workflow graph from a YAML file
///
/// Only the shape is checked here; structural problems such as dangling
/// edges are reported by [`WorkflowGraph::validate`].
pub fn load_workflow(path: impl AsRef<Path>) -> ConfigResult<WorkflowGraph> {
    let path = path.as_ref();
    let value = load_yaml(path)?;
    let graph: WorkflowGraph =
        serde_yaml::from_value(value).map_err(|source| ConfigError::Shape {
            path: path.to_path_buf(),
            document: "workflow",
            source,
        })?;

    debug!(workflow = %graph.id(), steps = graph.len(), "Loaded workflow from {:?}", path);
    Ok(graph)
}

/// Load run-time variables from a YAML mapping
pub fn load_variables(path: impl AsRef<Path>) -> ConfigResult<VariableValueMap> {
    let path = path.as_ref();
    let mapping = match load_yaml(path)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(VariableValueMap::new()),
        _ => {
            return Err(ConfigError::InvalidValue {
                key: path.display().to_string(),
                reason: "variable file must be a mapping".to_string(),
            })
        }
    };

    let mut values = VariableValueMap::new();
    for (key, value) in mapping {
        let Value::String(name) = key else {
            return Err(ConfigError::InvalidValue {
                key: format!("{:?}", key),
                reason: "variable names must be strings".to_string(),
            });
        };
        let value = scalar_to_string(&name, value)?;
        values.insert(name, value);
    }

    debug!("Loaded {} variables from {:?}", values.len(), path);
    Ok(values)
}

/// Workflow store over a directory of `<id>.yaml` files
#[derive(Debug, Clone)]
pub struct YamlWorkflowStore {
    dir: PathBuf,
}

impl YamlWorkflowStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding a workflow, if there is one
    pub fn path_for(&self, workflow_id: &str) -> Option<PathBuf> {
        ["yaml", "yml"]
            .iter()
            .map(|ext| self.dir.join(format!("{}.{}", workflow_id, ext)))
            .find(|path| path.is_file())
    }

    /// Ids of all workflow files in the directory, sorted
    pub fn list_ids(&self) -> ConfigResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| ConfigError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .filter(|path| path.file_stem().map(|s| s != "secrets").unwrap_or(false))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();

        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn load_blocking(&self, workflow_id: &str) -> StoreResult<WorkflowGraph> {
        let path = self
            .path_for(workflow_id)
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))?;

        let graph = load_workflow(&path).map_err(|e| StoreError::Load {
            workflow_id: workflow_id.to_string(),
            message: e.to_string(),
        })?;

        if graph.id() != workflow_id {
            warn!(file = ?path, found = %graph.id(), "Workflow id does not match file name");
            return Err(StoreError::Load {
                workflow_id: workflow_id.to_string(),
                message: format!("file declares workflow id '{}'", graph.id()),
            });
        }
        Ok(graph)
    }
}

#[async_trait]
impl WorkflowStore for YamlWorkflowStore {
    async fn load_graph(&self, workflow_id: &str) -> StoreResult<Arc<WorkflowGraph>> {
        if !is_plain_id(workflow_id) {
            return Err(StoreError::Load {
                workflow_id: workflow_id.to_string(),
                message: "workflow ids may not contain path separators".to_string(),
            });
        }

        let store = self.clone();
        let id = workflow_id.to_string();
        tokio::task::spawn_blocking(move || store.load_blocking(&id))
            .await
            .map_err(|e| StoreError::Load {
                workflow_id: workflow_id.to_string(),
                message: e.to_string(),
            })?
            .map(Arc::new)
    }
}

fn is_plain_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(|c| c == '/' || c == '\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_variables() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), "pin: 4321\n").unwrap();
        let path = dir.path().join("vars.yaml");
        fs::write(&path, "username: alice\ndelay: 250\npin: !secret pin\n").unwrap();

        let values = load_variables(&path).unwrap();
        assert_eq!(values.get("username"), Some("alice"));
        assert_eq!(values.get("delay"), Some("250"));
        assert_eq!(values.get("pin"), Some("4321"));
    }

    #[test]
    fn test_variables_must_be_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vars.yaml");
        fs::write(&path, "- a\n- b\n").unwrap();
        assert!(matches!(
            load_variables(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_plain_ids() {
        assert!(is_plain_id("login"));
        assert!(is_plain_id("shop-checkout_2"));
        assert!(!is_plain_id("../etc/passwd"));
        assert!(!is_plain_id("a/b"));
        assert!(!is_plain_id(""));
    }
}
