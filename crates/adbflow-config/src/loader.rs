//! Reads YAML documents and expands the custom tags in them
//!
//! - `!include path` - Include another YAML file
//! - `!include_dir_merge_list dir` - Concatenate the lists of every YAML
//!   file in a directory (workflow steps split over several files)
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! Relative paths in `!include` and `!include_dir_merge_list` are taken
//! from the directory of the file the tag appears in.

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Expands tags while reading a tree of included files
pub struct YamlLoader {
    secrets: Secrets,
    /// Files whose expansion is in progress, outermost first
    open: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(secrets: Secrets) -> Self {
        Self {
            secrets,
            open: Vec::new(),
        }
    }

    /// Read one document and expand every tag in it
    pub fn load(&mut self, path: &Path) -> ConfigResult<Value> {
        if self.open.iter().any(|open| open == path) {
            let mut chain = self.open.clone();
            chain.push(path.to_path_buf());
            return Err(ConfigError::IncludeCycle { chain });
        }

        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(file = %path.display(), depth = self.open.len(), "Read YAML document");

        self.open.push(path.to_path_buf());
        let expanded = self.expand(document, path);
        self.open.pop();
        expanded
    }

    fn expand(&mut self, value: Value, file: &Path) -> ConfigResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) => self.apply_tag(*tagged, file)?,
            Value::Mapping(entries) => Value::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| self.expand(value, file).map(|value| (key, value)))
                    .collect::<ConfigResult<_>>()?,
            ),
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.expand(item, file))
                    .collect::<ConfigResult<_>>()?,
            ),
            scalar => scalar,
        })
    }

    fn apply_tag(&mut self, tagged: TaggedValue, file: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        let Value::String(argument) = tagged.value else {
            return Err(ConfigError::BadTag {
                tag,
                reason: "expects a single string argument".to_string(),
            });
        };
        trace!(%tag, %argument, file = %file.display(), "Expanding tag");

        match tag.trim_start_matches('!') {
            "include" => self.load(&next_to(file, &argument)),
            "include_dir_merge_list" => self.merge_step_dir(&next_to(file, &argument)),
            "secret" => self.secrets.get(&argument).map(Value::from),
            "env_var" => env_var(&argument),
            _ => Err(ConfigError::BadTag {
                tag,
                reason: "not a supported tag".to_string(),
            }),
        }
    }

    /// Every YAML file in `dir`, in name order, flattened into one list
    fn merge_step_dir(&mut self, dir: &Path) -> ConfigResult<Value> {
        if !dir.is_dir() {
            return Err(ConfigError::MissingStepDir {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|source| ConfigError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml")
                )
            })
            .collect();
        files.sort();

        let mut merged = Vec::new();
        for file in &files {
            match self.load(file)? {
                Value::Sequence(items) => merged.extend(items),
                Value::Null => {}
                single => merged.push(single),
            }
        }

        debug!(dir = %dir.display(), files = files.len(), items = merged.len(), "Merged step directory");
        Ok(Value::Sequence(merged))
    }
}

/// `target` relative to the directory holding `file`; absolute targets win
fn next_to(file: &Path, target: &str) -> PathBuf {
    file.parent().unwrap_or_else(|| Path::new("")).join(target)
}

/// `!env_var NAME` or `!env_var NAME default value`
fn env_var(argument: &str) -> ConfigResult<Value> {
    let argument = argument.trim();
    let (name, default) = match argument.split_once(char::is_whitespace) {
        Some((name, default)) => (name, Some(default.trim())),
        None => (argument, None),
    };

    match std::env::var(name) {
        Ok(value) => Ok(Value::String(value)),
        Err(_) => default.map(Value::from).ok_or_else(|| ConfigError::MissingEnvVar {
            name: name.to_string(),
        }),
    }
}

/// Load a YAML file with tag expansion, taking secrets from its directory
pub fn load_yaml(path: impl AsRef<Path>) -> ConfigResult<Value> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    YamlLoader::new(Secrets::load(dir)?).load(path)
}
