use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "adbflow")]
#[command(about = "Run device automation workflows over adb")]
#[command(version)]
pub struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a workflow against a device
    Run(RunArgs),
    /// Check a workflow file for authoring defects
    Validate(FileArgs),
    /// Print the steps of a workflow
    Show(FileArgs),
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Workflow YAML file
    pub workflow: PathBuf,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow YAML file
    #[arg(required_unless_present = "id", conflicts_with_all = ["store", "id"])]
    pub workflow: Option<PathBuf>,

    /// Directory of workflow files, used with --id
    #[arg(long, requires = "id")]
    pub store: Option<PathBuf>,

    /// Workflow id to load from --store
    #[arg(long, requires = "store")]
    pub id: Option<String>,

    /// Variable value, NAME=VALUE (repeatable)
    #[arg(long = "var", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// YAML file of variable values; --var entries win
    #[arg(long)]
    pub vars_file: Option<PathBuf>,

    /// Device serial (overrides adb.serial from the config)
    #[arg(long, short)]
    pub serial: Option<String>,

    /// Engine config file
    #[arg(long, short, default_value = "adbflow.yaml")]
    pub config: PathBuf,

    /// Step ceiling (overrides max_steps from the config)
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Path to the adb executable (overrides adb.binary)
    #[arg(long)]
    pub adb: Option<PathBuf>,

    /// Run against an in-memory device that accepts every command
    #[arg(long)]
    pub dry_run: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse `NAME=VALUE`
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("user=alice"),
            Ok(("user".to_string(), "alice".to_string()))
        );
        assert_eq!(
            parse_var("query=a=b"),
            Ok(("query".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_var("empty="), Ok(("empty".to_string(), String::new())));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "adbflow", "-v", "run", "login.yaml", "--var", "user=alice", "--var", "pin=1234",
            "--dry-run",
        ]);
        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.workflow, Some(PathBuf::from("login.yaml")));
        assert_eq!(args.vars.len(), 2);
        assert!(args.dry_run);
        assert_eq!(args.config, PathBuf::from("adbflow.yaml"));
    }

    #[test]
    fn test_store_and_file_conflict() {
        assert!(Cli::try_parse_from(["adbflow", "run", "a.yaml", "--store", "wf", "--id", "a"]).is_err());
        assert!(Cli::try_parse_from(["adbflow", "run", "--store", "wf"]).is_err());
        assert!(Cli::try_parse_from(["adbflow", "run", "--store", "wf", "--id", "login"]).is_ok());
    }
}
