//! Action Execution Engine
//!
//! This crate runs workflows against a device. A workflow is a directed
//! graph of steps; each step wraps one action and names the step to run
//! next on success and on failure.
//!
//! # Pipeline
//!
//! For every step the [`WorkflowRunner`] resolves variables
//! ([`resolve`]), hands the concrete action to the [`ActionDispatcher`],
//! which picks the handler for the action kind, records the
//! [`ExecutionResult`](adbflow_core::ExecutionResult) in the trace and
//! follows the matching edge.
//!
//! # Key Types
//!
//! - [`WorkflowGraph`] - Steps and their success/failure edges
//! - [`WorkflowRunner`] - Walks a graph for one run
//! - [`RunOutcome`] - Final state plus the ordered trace
//! - [`WorkflowStore`] - Where graphs are loaded from

pub mod controller;
pub mod dispatcher;
pub mod graph;
pub mod handlers;
pub mod resolver;
pub mod run;
pub mod store;

pub use controller::{EngineError, RunHandle, RunnerConfig, WorkflowRunner, DEFAULT_MAX_STEPS};
pub use dispatcher::ActionDispatcher;
pub use graph::{EdgeKind, GraphError, Outcome, StepEdge, StepId, WorkflowGraph, WorkflowStep};
pub use resolver::resolve;
pub use run::{AbortReason, InvalidTransition, RunContext, RunOutcome, RunState, TraceEntry};
pub use store::{InMemoryWorkflowStore, StoreError, StoreResult, WorkflowStore};
