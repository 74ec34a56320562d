//! adbflow
//!
//! Command-line front end for the workflow engine: load a workflow, bind
//! its variables, run it against a device and report the trace.

use adbflow_config::{load_variables, load_workflow, EngineConfig, YamlWorkflowStore};
use adbflow_core::VariableValueMap;
use adbflow_device::{AdbDevice, DeviceClient, ScriptedDevice};
use adbflow_engine::{WorkflowGraph, WorkflowRunner, WorkflowStore};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod output;

use cli::{Cli, Commands, FileArgs, RunArgs};

/// Serial used by `--dry-run` when none is given
const DRY_RUN_SERIAL: &str = "dry-run";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Validate(args) => validate(args),
        Commands::Show(args) => show(args),
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = EngineConfig::load_or_default(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    if let Some(max_steps) = args.max_steps {
        config.max_steps = Some(max_steps);
    }
    if let Some(adb) = &args.adb {
        config.adb.binary = adb.clone();
    }
    config.validate()?;

    let graph = load_graph(&args).await?;
    for issue in graph.validate() {
        warn!(workflow = %graph.id(), "{}", issue);
    }

    let mut values = match &args.vars_file {
        Some(path) => load_variables(path)
            .with_context(|| format!("loading variables {}", path.display()))?,
        None => VariableValueMap::new(),
    };
    for (name, value) in &args.vars {
        values.insert(name.clone(), value.clone());
    }

    let missing: BTreeSet<&str> = graph
        .steps()
        .flat_map(|s| s.action.variables())
        .filter(|name| !values.contains(name))
        .collect();
    if !missing.is_empty() {
        warn!(variables = ?missing, "Unbound variables; the steps using them will fail");
    }

    let serial = args.serial.clone().or_else(|| config.adb.serial.clone());
    let device: Arc<dyn DeviceClient> = if args.dry_run {
        Arc::new(ScriptedDevice::new(serial.unwrap_or_else(|| DRY_RUN_SERIAL.to_string())))
    } else {
        let Some(serial) = serial else {
            bail!("no device serial: pass --serial or set adb.serial in {}", args.config.display());
        };
        Arc::new(AdbDevice::new(config.adb.clone(), serial))
    };

    let runner = WorkflowRunner::new(config.runner_config());
    let handle = runner.spawn_run(graph, values, device)?;
    info!(run_id = %handle.run_id(), "Run started");

    let token = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            token.cancel();
        }
    });

    let outcome = handle.join().await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print!("{}", output::render_outcome(&outcome));
    }

    Ok(ExitCode::from(output::exit_code(&outcome.final_state)))
}

async fn load_graph(args: &RunArgs) -> Result<Arc<WorkflowGraph>> {
    match (&args.workflow, &args.store, &args.id) {
        (Some(path), _, _) => {
            let graph = load_workflow(path)
                .with_context(|| format!("loading workflow {}", path.display()))?;
            Ok(Arc::new(graph))
        }
        (None, Some(dir), Some(id)) => YamlWorkflowStore::new(dir)
            .load_graph(id)
            .await
            .with_context(|| format!("loading workflow '{}' from {}", id, dir.display())),
        _ => bail!("pass a workflow file, or --store with --id"),
    }
}

fn validate(args: FileArgs) -> Result<ExitCode> {
    let graph = load_workflow(&args.workflow)
        .with_context(|| format!("loading workflow {}", args.workflow.display()))?;
    let issues = graph.validate();
    print!("{}", output::render_issues(&graph, &issues));

    Ok(if issues.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn show(args: FileArgs) -> Result<ExitCode> {
    let graph = load_workflow(&args.workflow)
        .with_context(|| format!("loading workflow {}", args.workflow.display()))?;
    print!("{}", output::render_graph(&graph));
    Ok(ExitCode::SUCCESS)
}
