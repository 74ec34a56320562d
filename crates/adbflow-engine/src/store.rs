//! Workflow sources
//!
//! The engine reads a graph once at run start and never writes back.

use crate::graph::WorkflowGraph;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Workflow store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Failed to load workflow {workflow_id}: {message}")]
    Load { workflow_id: String, message: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Source of workflow graphs
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Load a workflow graph by id
    async fn load_graph(&self, workflow_id: &str) -> StoreResult<Arc<WorkflowGraph>>;
}

/// Workflow store held in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryWorkflowStore {
    graphs: Arc<DashMap<String, Arc<WorkflowGraph>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a graph, keyed by its id
    pub fn insert(&self, graph: WorkflowGraph) -> Option<Arc<WorkflowGraph>> {
        debug!(workflow = %graph.id(), "Storing workflow");
        self.graphs.insert(graph.id().to_string(), Arc::new(graph))
    }

    pub fn remove(&self, workflow_id: &str) -> Option<Arc<WorkflowGraph>> {
        self.graphs.remove(workflow_id).map(|(_, graph)| graph)
    }

    /// Ids of all stored workflows, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.graphs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load_graph(&self, workflow_id: &str) -> StoreResult<Arc<WorkflowGraph>> {
        self.graphs
            .get(workflow_id)
            .map(|graph| Arc::clone(graph.value()))
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::WorkflowStep;
    use adbflow_core::Action;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryWorkflowStore::new();
        let graph = WorkflowGraph::new("home", "go")
            .with_step(WorkflowStep::new("go", Action::press("home")))
            .unwrap();

        assert!(store.insert(graph.clone()).is_none());
        assert_eq!(store.ids(), vec!["home".to_string()]);

        let loaded = store.load_graph("home").await.unwrap();
        assert_eq!(*loaded, graph);

        store.remove("home");
        assert!(matches!(
            store.load_graph("home").await,
            Err(StoreError::NotFound(id)) if id == "home"
        ));
    }
}
