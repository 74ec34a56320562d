//! Failures while reading workflow, variable and settings files

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed YAML
    #[error("{path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML that does not describe the expected document,
    /// e.g. a workflow step without an action
    #[error("{path} is not a valid {document}: {source}")]
    Shape {
        path: PathBuf,
        document: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    /// Files including each other, listed from the outermost
    #[error("include cycle: {}", format_chain(.chain))]
    IncludeCycle { chain: Vec<PathBuf> },

    /// `!include_dir_merge_list` pointing at something that is not a directory
    #[error("step directory {path} does not exist")]
    MissingStepDir { path: PathBuf },

    /// A tag this loader does not know, or one with a malformed argument
    #[error("{tag}: {reason}")]
    BadTag { tag: String, reason: String },

    #[error("no secret named '{name}' in secrets.yaml")]
    MissingSecret { name: String },

    #[error("environment variable {name} is not set and has no default")]
    MissingEnvVar { name: String },

    /// A setting or variable with an unusable value
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
