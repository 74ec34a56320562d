//! Workflow step graph
//!
//! A [`WorkflowGraph`] owns its steps and a designated entry step. Steps
//! refer to each other by id only, so convergent paths are fine and the
//! graph can be shared read-only across concurrent runs.

use adbflow_core::{Action, ActionError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Identifier of a step within one graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Final verdict of a step or a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Failure => f.write_str("failure"),
        }
    }
}

/// Which of a step's two edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    OnSuccess,
    OnFailure,
}

impl From<Outcome> for EdgeKind {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => EdgeKind::OnSuccess,
            Outcome::Failure => EdgeKind::OnFailure,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::OnSuccess => f.write_str("on_success"),
            EdgeKind::OnFailure => f.write_str("on_failure"),
        }
    }
}

/// Where a step's edge leads
///
/// Serialized either as a bare step id or as `{terminal: success|failure}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepEdge {
    /// Continue with another step of the same graph
    Next(StepId),
    /// End the run with a verdict
    Terminal { terminal: Outcome },
}

impl StepEdge {
    pub fn to(step: impl Into<StepId>) -> Self {
        StepEdge::Next(step.into())
    }

    pub fn success() -> Self {
        StepEdge::Terminal {
            terminal: Outcome::Success,
        }
    }

    pub fn failure() -> Self {
        StepEdge::Terminal {
            terminal: Outcome::Failure,
        }
    }

    /// Target step, if this edge is not terminal
    pub fn target(&self) -> Option<&StepId> {
        match self {
            StepEdge::Next(id) => Some(id),
            StepEdge::Terminal { .. } => None,
        }
    }
}

impl fmt::Display for StepEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepEdge::Next(id) => write!(f, "-> {}", id),
            StepEdge::Terminal { terminal } => write!(f, "end ({})", terminal),
        }
    }
}

/// One node of the graph: an action and its two successors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,

    pub action: Action,

    #[serde(default = "StepEdge::success")]
    pub on_success: StepEdge,

    #[serde(default = "StepEdge::failure")]
    pub on_failure: StepEdge,
}

impl WorkflowStep {
    /// A step that ends the run with the action's own verdict
    pub fn new(id: impl Into<StepId>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            on_success: StepEdge::success(),
            on_failure: StepEdge::failure(),
        }
    }

    pub fn with_on_success(mut self, edge: StepEdge) -> Self {
        self.on_success = edge;
        self
    }

    pub fn with_on_failure(mut self, edge: StepEdge) -> Self {
        self.on_failure = edge;
        self
    }

    /// The edge taken for a given step outcome
    pub fn edge(&self, outcome: Outcome) -> &StepEdge {
        match outcome {
            Outcome::Success => &self.on_success,
            Outcome::Failure => &self.on_failure,
        }
    }

    fn edge_mut(&mut self, kind: EdgeKind) -> &mut StepEdge {
        match kind {
            EdgeKind::OnSuccess => &mut self.on_success,
            EdgeKind::OnFailure => &mut self.on_failure,
        }
    }

    fn edges(&self) -> [(EdgeKind, &StepEdge); 2] {
        [
            (EdgeKind::OnSuccess, &self.on_success),
            (EdgeKind::OnFailure, &self.on_failure),
        ]
    }
}

/// Structural defects of a workflow graph
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum GraphError {
    #[error("entry step '{0}' does not exist")]
    MissingEntry(StepId),

    #[error("step '{from}' {edge} points to missing step '{to}'")]
    DanglingEdge {
        from: StepId,
        edge: EdgeKind,
        to: StepId,
    },

    #[error("run exceeded the step limit of {0}")]
    StepLimitExceeded(usize),

    #[error("duplicate step id '{0}'")]
    DuplicateStep(StepId),

    #[error("unknown step '{0}'")]
    UnknownStep(StepId),

    #[error("step '{step}' is still referenced by {referenced_by}")]
    StepInUse { step: StepId, referenced_by: String },

    #[error("step '{step}' has an invalid action: {error}")]
    InvalidAction { step: StepId, error: ActionError },
}

/// Serialized form of a graph
#[derive(Serialize, Deserialize)]
struct GraphDocument {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    entry: StepId,
    #[serde(default)]
    steps: Vec<WorkflowStep>,
}

/// A workflow: steps keyed by id, plus the entry step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct WorkflowGraph {
    id: String,
    name: Option<String>,
    description: Option<String>,
    entry: StepId,
    steps: IndexMap<StepId, WorkflowStep>,
}

impl TryFrom<GraphDocument> for WorkflowGraph {
    type Error = GraphError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut steps = IndexMap::with_capacity(doc.steps.len());
        for step in doc.steps {
            if steps.contains_key(&step.id) {
                return Err(GraphError::DuplicateStep(step.id));
            }
            steps.insert(step.id.clone(), step);
        }
        Ok(Self {
            id: doc.id,
            name: doc.name,
            description: doc.description,
            entry: doc.entry,
            steps,
        })
    }
}

impl From<WorkflowGraph> for GraphDocument {
    fn from(graph: WorkflowGraph) -> Self {
        Self {
            id: graph.id,
            name: graph.name,
            description: graph.description,
            entry: graph.entry,
            steps: graph.steps.into_values().collect(),
        }
    }
}

impl WorkflowGraph {
    /// Create an empty graph; the entry step is added afterwards
    pub fn new(id: impl Into<String>, entry: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            entry: entry.into(),
            steps: IndexMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get display name
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn entry(&self) -> &StepId {
        &self.entry
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.get(id)
    }

    /// Steps in authoring order
    pub fn steps(&self) -> impl Iterator<Item = &WorkflowStep> {
        self.steps.values()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The edge a step takes for an outcome
    pub fn successor(&self, id: &str, outcome: Outcome) -> Option<&StepEdge> {
        self.step(id).map(|step| step.edge(outcome))
    }

    /// Add a new step
    ///
    /// Edges may point at steps that are added later; [`Self::validate`]
    /// reports the ones that never appear.
    pub fn add_step(&mut self, step: WorkflowStep) -> Result<(), GraphError> {
        check_action(&step)?;
        if self.steps.contains_key(&step.id) {
            return Err(GraphError::DuplicateStep(step.id));
        }
        debug!(workflow = %self.id, step = %step.id, "Adding step");
        self.steps.insert(step.id.clone(), step);
        Ok(())
    }

    /// Builder-style [`Self::add_step`]
    pub fn with_step(mut self, step: WorkflowStep) -> Result<Self, GraphError> {
        self.add_step(step)?;
        Ok(self)
    }

    /// Replace an existing step, returning the old one
    pub fn replace_step(&mut self, step: WorkflowStep) -> Result<WorkflowStep, GraphError> {
        check_action(&step)?;
        let slot = self
            .steps
            .get_mut(&step.id)
            .ok_or_else(|| GraphError::UnknownStep(step.id.clone()))?;
        debug!(workflow = %self.id, step = %step.id, "Replacing step");
        Ok(std::mem::replace(slot, step))
    }

    /// Remove a step that nothing references any more
    pub fn remove_step(&mut self, id: &str) -> Result<WorkflowStep, GraphError> {
        if !self.steps.contains_key(id) {
            return Err(GraphError::UnknownStep(StepId::from(id)));
        }
        if self.entry.as_str() == id {
            return Err(GraphError::StepInUse {
                step: StepId::from(id),
                referenced_by: "the entry".to_string(),
            });
        }
        if let Some(referrer) = self
            .steps
            .values()
            .find(|s| s.id.as_str() != id && s.edges().iter().any(|(_, e)| is_edge_to(e, id)))
        {
            return Err(GraphError::StepInUse {
                step: StepId::from(id),
                referenced_by: format!("step '{}'", referrer.id),
            });
        }

        debug!(workflow = %self.id, step = %id, "Removing step");
        self.steps
            .shift_remove(id)
            .ok_or_else(|| GraphError::UnknownStep(StepId::from(id)))
    }

    /// Point one edge of a step somewhere else
    pub fn relink(&mut self, id: &str, kind: EdgeKind, edge: StepEdge) -> Result<(), GraphError> {
        if let Some(target) = edge.target() {
            if !self.steps.contains_key(target) {
                return Err(GraphError::UnknownStep(target.clone()));
            }
        }
        let step = self
            .steps
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownStep(StepId::from(id)))?;
        debug!(step = %id, %kind, %edge, "Relinking edge");
        *step.edge_mut(kind) = edge;
        Ok(())
    }

    /// Make an existing step the entry
    pub fn set_entry(&mut self, id: &str) -> Result<(), GraphError> {
        if !self.steps.contains_key(id) {
            return Err(GraphError::UnknownStep(StepId::from(id)));
        }
        self.entry = StepId::from(id);
        Ok(())
    }

    /// Report every structural defect: missing entry, dangling edges,
    /// invalid actions
    pub fn validate(&self) -> Vec<GraphError> {
        let mut issues = Vec::new();

        if !self.steps.contains_key(&self.entry) {
            issues.push(GraphError::MissingEntry(self.entry.clone()));
        }

        for step in self.steps.values() {
            if let Err(e) = check_action(step) {
                issues.push(e);
            }
            for (kind, edge) in step.edges() {
                if let Some(target) = edge.target() {
                    if !self.steps.contains_key(target) {
                        issues.push(GraphError::DanglingEdge {
                            from: step.id.clone(),
                            edge: kind,
                            to: target.clone(),
                        });
                    }
                }
            }
        }

        issues
    }

    /// Step ids reachable from the entry, in breadth-first order
    pub fn reachable_from_entry(&self) -> Vec<StepId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([self.entry.clone()]);

        while let Some(id) = queue.pop_front() {
            let Some(step) = self.steps.get(&id) else {
                continue;
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            order.push(id);
            for (_, edge) in step.edges() {
                if let Some(target) = edge.target() {
                    if !seen.contains(target) {
                        queue.push_back(target.clone());
                    }
                }
            }
        }

        order
    }
}

fn check_action(step: &WorkflowStep) -> Result<(), GraphError> {
    step.action
        .validate()
        .map_err(|error| GraphError::InvalidAction {
            step: step.id.clone(),
            error,
        })
}

fn is_edge_to(edge: &StepEdge, id: &str) -> bool {
    edge.target().map(|t| t.as_str() == id).unwrap_or(false)
}
