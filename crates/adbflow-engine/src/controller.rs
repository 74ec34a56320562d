//! Execution controller
//!
//! [`WorkflowRunner`] walks a [`WorkflowGraph`] from its entry step. For
//! every step it resolves variables, dispatches the action, appends the
//! result to the trace and follows the success or failure edge, until a
//! terminal edge completes the run or the run is aborted.
//!
//! Runs are independent and may execute concurrently; the graph is only
//! read. Two runs of one runner against the same device serial are refused
//! with [`EngineError::DeviceBusy`] rather than interleaved.

use crate::dispatcher::ActionDispatcher;
use crate::graph::{EdgeKind, GraphError, Outcome, StepEdge, StepId, WorkflowGraph, WorkflowStep};
use crate::resolver::resolve;
use crate::run::{AbortReason, InvalidTransition, RunContext, RunOutcome, RunState, TraceEntry};
use adbflow_core::{ExecutionResult, VariableValueMap};
use adbflow_device::DeviceClient;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use ulid::Ulid;

/// Default step ceiling for a single run
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// Errors that prevent a run from producing an outcome
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("device {serial} is busy with run {run_id}")]
    DeviceBusy { serial: String, run_id: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("run task failed: {0}")]
    TaskFailed(String),
}

/// Runner settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Abort a run after this many steps; `None` disables the ceiling
    pub max_steps: Option<usize>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_steps: Some(DEFAULT_MAX_STEPS),
        }
    }
}

/// Runs workflows
#[derive(Clone)]
pub struct WorkflowRunner {
    config: RunnerConfig,
    dispatcher: ActionDispatcher,
    /// Device serial -> run id of the run holding it
    active: Arc<DashMap<String, String>>,
}

impl Default for WorkflowRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl WorkflowRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            dispatcher: ActionDispatcher::new(),
            active: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Number of runs currently holding a device
    pub fn active_runs(&self) -> usize {
        self.active.len()
    }

    pub fn is_device_busy(&self, serial: &str) -> bool {
        self.active.contains_key(serial)
    }

    /// Run a workflow to completion
    pub async fn run_workflow(
        &self,
        graph: &WorkflowGraph,
        values: VariableValueMap,
        device: &dyn DeviceClient,
    ) -> Result<RunOutcome, EngineError> {
        self.run_with_cancel(graph, values, device, CancellationToken::new())
            .await
    }

    /// Run a workflow, stopping between steps once `cancel` fires
    pub async fn run_with_cancel(
        &self,
        graph: &WorkflowGraph,
        values: VariableValueMap,
        device: &dyn DeviceClient,
        cancel: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        let run_id = Ulid::new().to_string();
        let _lease = self.lease(device, &run_id)?;
        let ctx = RunContext::with_run_id(
            run_id,
            graph.id(),
            graph.entry().clone(),
            values,
            cancel,
        );
        self.drive(graph, ctx, device, None).await
    }

    /// Start a run in the background
    ///
    /// The device is claimed before this returns, so a busy device is
    /// reported here rather than from [`RunHandle::join`].
    pub fn spawn_run(
        &self,
        graph: Arc<WorkflowGraph>,
        values: VariableValueMap,
        device: Arc<dyn DeviceClient>,
    ) -> Result<RunHandle, EngineError> {
        let run_id = Ulid::new().to_string();
        let lease = self.lease(device.as_ref(), &run_id)?;
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(RunState::Pending(graph.entry().clone()));

        let ctx = RunContext::with_run_id(
            run_id.clone(),
            graph.id(),
            graph.entry().clone(),
            values,
            cancel.clone(),
        );
        let runner = self.clone();
        let task = tokio::spawn(async move {
            let _lease = lease;
            runner
                .drive(&graph, ctx, device.as_ref(), Some(&state_tx))
                .await
        });

        Ok(RunHandle {
            run_id,
            cancel,
            state: state_rx,
            task,
        })
    }

    fn lease(&self, device: &dyn DeviceClient, run_id: &str) -> Result<DeviceLease, EngineError> {
        let serial = device.identity().serial.clone();
        match self.active.entry(serial.clone()) {
            Entry::Occupied(holder) => Err(EngineError::DeviceBusy {
                run_id: holder.get().clone(),
                serial,
            }),
            Entry::Vacant(slot) => {
                slot.insert(run_id.to_string());
                Ok(DeviceLease {
                    active: Arc::clone(&self.active),
                    serial,
                })
            }
        }
    }

    #[instrument(skip_all, fields(run_id = %ctx.run_id(), workflow = %graph.id(), device = %device.identity()))]
    async fn drive(
        &self,
        graph: &WorkflowGraph,
        mut ctx: RunContext,
        device: &dyn DeviceClient,
        watch: Option<&watch::Sender<RunState>>,
    ) -> Result<RunOutcome, EngineError> {
        info!(entry = %graph.entry(), "Starting workflow run");
        let mut steps_taken = 0usize;

        while let RunState::Pending(step_id) = ctx.state().clone() {
            let step = match self.check_pending(graph, &ctx, &step_id, steps_taken) {
                Ok(step) => step,
                Err(reason) => {
                    warn!(step_id = %step_id, %reason, "Aborting run");
                    publish(watch, ctx.transition(RunState::Aborted(reason))?);
                    break;
                }
            };

            publish(watch, ctx.transition(RunState::Running(step_id.clone()))?);
            let started_at = Utc::now();

            // Resolution failures never reach the device
            let result = match resolve(&step.action, ctx.values()) {
                Ok(action) => self.dispatcher.dispatch(&action, device).await,
                Err(e) => ExecutionResult::failure(e),
            };

            let outcome = if result.is_success() {
                Outcome::Success
            } else {
                Outcome::Failure
            };
            let edge = step.edge(outcome);
            debug!(step_id = %step_id, %outcome, %edge, "Step finished");

            ctx.record(
                TraceEntry {
                    step_id: step_id.clone(),
                    result,
                    started_at,
                    finished_at: Utc::now(),
                },
                EdgeKind::from(outcome),
            );
            steps_taken += 1;

            let next = match edge {
                StepEdge::Next(target) => RunState::Pending(target.clone()),
                StepEdge::Terminal { terminal } => RunState::Completed(*terminal),
            };
            publish(watch, ctx.transition(next)?);
        }

        let outcome = ctx.into_outcome();
        info!(
            state = %outcome.final_state,
            steps = outcome.trace.len(),
            "Workflow run finished"
        );
        Ok(outcome)
    }

    /// Decide whether the pending step may run
    fn check_pending<'g>(
        &self,
        graph: &'g WorkflowGraph,
        ctx: &RunContext,
        step_id: &StepId,
        steps_taken: usize,
    ) -> Result<&'g WorkflowStep, AbortReason> {
        if ctx.is_cancelled() {
            return Err(AbortReason::Cancelled);
        }

        if let Some(max) = self.config.max_steps {
            if steps_taken >= max {
                return Err(AbortReason::Graph(GraphError::StepLimitExceeded(max)));
            }
        }

        graph.step(step_id.as_str()).ok_or_else(|| {
            AbortReason::Graph(match ctx.came_from() {
                Some((from, edge)) => GraphError::DanglingEdge {
                    from: from.clone(),
                    edge: *edge,
                    to: step_id.clone(),
                },
                None => GraphError::MissingEntry(step_id.clone()),
            })
        })
    }
}

fn publish(watch: Option<&watch::Sender<RunState>>, state: &RunState) {
    if let Some(tx) = watch {
        tx.send_replace(state.clone());
    }
}

/// Claim on a device serial, released on drop
struct DeviceLease {
    active: Arc<DashMap<String, String>>,
    serial: String,
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.active.remove(&self.serial);
    }
}

/// Handle to a run started with [`WorkflowRunner::spawn_run`]
pub struct RunHandle {
    run_id: String,
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    task: JoinHandle<Result<RunOutcome, EngineError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Ask the run to stop before its next step
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run; usable after the handle is consumed
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Subscribe to state changes
    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Latest published state
    pub fn current_state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Wait for the run to finish
    pub async fn join(self) -> Result<RunOutcome, EngineError> {
        self.task
            .await
            .map_err(|e| EngineError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adbflow_core::Action;
    use adbflow_device::ScriptedDevice;

    fn single_step() -> WorkflowGraph {
        WorkflowGraph::new("one", "a")
            .with_step(WorkflowStep::new("a", Action::press("home")))
            .unwrap()
    }

    #[tokio::test]
    async fn test_lease_released_after_run() {
        let runner = WorkflowRunner::default();
        let device = ScriptedDevice::new("emulator-5554");

        let outcome = runner
            .run_workflow(&single_step(), VariableValueMap::new(), &device)
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(runner.active_runs(), 0);
        assert!(!runner.is_device_busy("emulator-5554"));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let mut graph = WorkflowGraph::new("loop", "a");
        graph
            .add_step(
                WorkflowStep::new("a", Action::press("back"))
                    .with_on_success(StepEdge::to("a")),
            )
            .unwrap();

        let runner = WorkflowRunner::new(RunnerConfig { max_steps: Some(3) });
        let device = ScriptedDevice::new("emulator-5554");
        let outcome = runner
            .run_workflow(&graph, VariableValueMap::new(), &device)
            .await
            .unwrap();

        assert_eq!(
            outcome.final_state,
            RunState::Aborted(AbortReason::Graph(GraphError::StepLimitExceeded(3)))
        );
        assert_eq!(outcome.trace.len(), 3);
        assert_eq!(device.call_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_entry_runs_nothing() {
        let graph = WorkflowGraph::new("empty", "start");
        let device = ScriptedDevice::new("emulator-5554");

        let outcome = WorkflowRunner::default()
            .run_workflow(&graph, VariableValueMap::new(), &device)
            .await
            .unwrap();

        assert_eq!(
            outcome.final_state,
            RunState::Aborted(AbortReason::Graph(GraphError::MissingEntry(StepId::from(
                "start"
            ))))
        );
        assert!(outcome.trace.is_empty());
    }
}
