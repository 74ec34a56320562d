//! Run state machine
//!
//! ```text
//! Pending(entry) → Running(s) → Pending(next) → Running(next) → ...
//!                            ↘ Completed(success | failure)
//! Pending(s) → Aborted(cancelled | graph error)
//! ```
//!
//! `Running` only ever lasts for one dispatch. Aborting is decided at the
//! `Pending` transition, so an in-flight device command is never cut off.

use crate::graph::{EdgeKind, GraphError, Outcome, StepId};
use adbflow_core::{ExecutionResult, VariableValueMap};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Why a run stopped without reaching a terminal edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "error", rename_all = "snake_case")]
pub enum AbortReason {
    Cancelled,
    Graph(GraphError),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => f.write_str("cancelled"),
            AbortReason::Graph(e) => write!(f, "graph error: {}", e),
        }
    }
}

/// State of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum RunState {
    /// About to run this step
    Pending(StepId),
    /// Dispatching this step's action
    Running(StepId),
    /// A terminal edge was reached
    Completed(Outcome),
    /// Stopped early
    Aborted(AbortReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed(_) | RunState::Aborted(_))
    }

    /// Step the run is at, if any
    pub fn step(&self) -> Option<&StepId> {
        match self {
            RunState::Pending(id) | RunState::Running(id) => Some(id),
            _ => None,
        }
    }

    /// Attempt a transition to a new state.
    ///
    /// Returns the new state if valid, or an error describing why the
    /// transition is invalid.
    pub fn try_transition(&self, to: RunState) -> Result<RunState, InvalidTransition> {
        use RunState::*;

        let valid = match (self, &to) {
            // Only the pending step may start
            (Pending(from), Running(step)) => from == step,
            (Pending(_), Aborted(_)) => true,

            // A dispatch ends by following an edge
            (Running(_), Pending(_)) => true,
            (Running(_), Completed(_)) => true,

            // Terminal states - no transitions allowed
            (Completed(_), _) | (Aborted(_), _) => false,

            _ => false,
        };

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                reason: Self::transition_error_reason(self, &to),
                from: self.clone(),
                to,
            })
        }
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(&self, to: &RunState) -> bool {
        self.try_transition(to.clone()).is_ok()
    }

    fn transition_error_reason(from: &RunState, to: &RunState) -> &'static str {
        use RunState::*;

        match (from, to) {
            (Completed(_), _) | (Aborted(_), _) => "run already finished",
            (Pending(_), Running(_)) => "only the pending step can start",
            (Pending(_), Pending(_)) => "a step must run before the next one is pending",
            (Pending(_), Completed(_)) => "a run completes only by following a step edge",
            (Running(_), Aborted(_)) => "an in-flight step cannot be aborted",
            (Running(_), Running(_)) => "steps of one run never overlap",
            _ => "Invalid state transition",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending(id) => write!(f, "pending({})", id),
            RunState::Running(id) => write!(f, "running({})", id),
            RunState::Completed(outcome) => write!(f, "completed({})", outcome),
            RunState::Aborted(reason) => write!(f, "aborted({})", reason),
        }
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Invalid state transition from {from} to {to}: {reason}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
    pub reason: &'static str,
}

/// One completed step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub step_id: StepId,
    pub result: ExecutionResult,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// What a run owes its caller: how it ended and what happened on the way
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub workflow_id: String,
    pub final_state: RunState,
    /// Completed steps in execution order
    pub trace: Vec<TraceEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// `true` only for `Completed(success)`
    pub fn is_success(&self) -> bool {
        self.final_state == RunState::Completed(Outcome::Success)
    }

    /// Trace step ids, in order
    pub fn step_ids(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.step_id.as_str()).collect()
    }
}

/// Transient state of one run
///
/// Created at run start and consumed into a [`RunOutcome`] at the end.
#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    workflow_id: String,
    state: RunState,
    values: VariableValueMap,
    trace: Vec<TraceEntry>,
    cancel: CancellationToken,
    came_from: Option<(StepId, EdgeKind)>,
    started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(
        workflow_id: impl Into<String>,
        entry: StepId,
        values: VariableValueMap,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_run_id(Ulid::new().to_string(), workflow_id, entry, values, cancel)
    }

    pub(crate) fn with_run_id(
        run_id: String,
        workflow_id: impl Into<String>,
        entry: StepId,
        values: VariableValueMap,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id,
            workflow_id: workflow_id.into(),
            state: RunState::Pending(entry),
            values,
            trace: Vec::new(),
            cancel,
            came_from: None,
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn values(&self) -> &VariableValueMap {
        &self.values
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The step and edge that led to the current pending step
    pub fn came_from(&self) -> Option<&(StepId, EdgeKind)> {
        self.came_from.as_ref()
    }

    /// Move to a new state, enforcing the transition rules
    pub fn transition(&mut self, to: RunState) -> Result<&RunState, InvalidTransition> {
        self.state = self.state.try_transition(to)?;
        Ok(&self.state)
    }

    /// Append a completed step and remember which edge it leaves by
    pub(crate) fn record(&mut self, entry: TraceEntry, edge: EdgeKind) {
        self.came_from = Some((entry.step_id.clone(), edge));
        self.trace.push(entry);
    }

    pub fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            run_id: self.run_id,
            workflow_id: self.workflow_id,
            final_state: self.state,
            trace: self.trace,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
