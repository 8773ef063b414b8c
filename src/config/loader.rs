//! Configuration loader.
//!
//! Loading pipeline: read file → `${VAR}` environment expansion on the raw
//! text → YAML parse → validation → freeze with `Arc`.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use crate::config::schema::Config;
use crate::config::validation::{self, LoadWarning};
use crate::error::{ConfigError, FenceWatchError};

/// Result of loading a configuration file.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<Config>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Loads a configuration file and returns the frozen configuration.
///
/// # Errors
///
/// Returns a config error when the file is missing, references an unset
/// environment variable, fails to parse, or fails validation.
pub fn load(path: &Path) -> Result<LoadResult, FenceWatchError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::MissingFile {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(e) => return Err(FenceWatchError::Io(e)),
    };

    let expanded = expand_env(&raw)?;

    let config: Config = serde_yaml::from_str(&expanded).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings = validation::validate(&config)?;

    Ok(LoadResult {
        config: Arc::new(config),
        warnings,
    })
}

/// Expands `${VAR}` references against the process environment.
///
/// An unset variable is a hard error naming the variable, so a missing
/// secret cannot silently become an empty password.
fn expand_env(raw: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                value: rest[start..].chars().take(24).collect(),
                expected: "a closing '}' for the environment reference".to_string(),
            });
        };
        let var = &after[..end];
        let value =
            std::env::var(var).map_err(|_| ConfigError::EnvVarNotSet { var: var.to_string() })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
