//! Human-readable rendering of graphs and run outcomes

use adbflow_engine::{AbortReason, GraphError, Outcome, RunOutcome, RunState, StepEdge, WorkflowGraph};
use std::collections::BTreeSet;
use std::fmt::Write;

/// Exit status for a finished run: 0 success, 1 failure, 2 aborted
pub fn exit_code(state: &RunState) -> u8 {
    match state {
        RunState::Completed(Outcome::Success) => 0,
        RunState::Completed(Outcome::Failure) => 1,
        _ => 2,
    }
}

fn edge_label(edge: &StepEdge) -> String {
    match edge {
        StepEdge::Next(id) => id.to_string(),
        StepEdge::Terminal { terminal } => format!("[{}]", terminal),
    }
}

/// Trace table plus final state
pub fn render_outcome(outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let width = outcome
        .trace
        .iter()
        .map(|e| e.step_id.as_str().len())
        .max()
        .unwrap_or(0);

    let _ = writeln!(out, "run {} ({})", outcome.run_id, outcome.workflow_id);
    for (i, entry) in outcome.trace.iter().enumerate() {
        let millis = (entry.finished_at - entry.started_at).num_milliseconds();
        let status = match entry.result.error() {
            None => "ok".to_string(),
            Some(e) => format!("FAILED {}", e),
        };
        let _ = writeln!(
            out,
            "{:>3}. {:<width$}  {:>6} ms  {}",
            i + 1,
            entry.step_id.as_str(),
            millis,
            status,
            width = width
        );
    }

    let verdict = match &outcome.final_state {
        RunState::Completed(Outcome::Success) => "completed: success".to_string(),
        RunState::Completed(Outcome::Failure) => "completed: failure".to_string(),
        RunState::Aborted(AbortReason::Cancelled) => "aborted: cancelled".to_string(),
        RunState::Aborted(AbortReason::Graph(e)) => format!("aborted: {}", e),
        other => format!("stopped in state {}", other),
    };
    let _ = writeln!(out, "{}", verdict);
    out
}

/// Step listing with edges and the variables the workflow needs
pub fn render_graph(graph: &WorkflowGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", graph.display_name(), graph.id());
    if let Some(description) = graph.description() {
        let _ = writeln!(out, "  {}", description);
    }

    for step in graph.steps() {
        let marker = if step.id == *graph.entry() { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{} {}  {}  ok -> {}  fail -> {}",
            marker,
            step.id,
            step.action.display_name(),
            edge_label(&step.on_success),
            edge_label(&step.on_failure),
        );
    }

    let variables: BTreeSet<&str> = graph.steps().flat_map(|s| s.action.variables()).collect();
    if !variables.is_empty() {
        let names: Vec<&str> = variables.into_iter().collect();
        let _ = writeln!(out, "variables: {}", names.join(", "));
    }
    out
}

/// Validation report; unreachable steps are listed as notes
pub fn render_issues(graph: &WorkflowGraph, issues: &[GraphError]) -> String {
    let mut out = String::new();
    for issue in issues {
        let _ = writeln!(out, "error: {}", issue);
    }

    let reachable = graph.reachable_from_entry();
    for step in graph.steps().filter(|s| !reachable.contains(&s.id)) {
        let _ = writeln!(out, "note: step '{}' is never reached from the entry", step.id);
    }

    if issues.is_empty() {
        let _ = writeln!(out, "{}: {} steps, no errors", graph.id(), graph.len());
    }
    out
}
