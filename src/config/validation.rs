//! Configuration validation.
//!
//! Structural problems become hard errors; questionable-but-workable
//! configurations produce warnings surfaced at load time.

use crate::config::schema::Config;
use crate::error::{ConfigError, ValidationIssue};

/// Upper bound for `punish_after_seconds`; values beyond this are almost
/// certainly a unit mistake.
const MAX_PUNISH_AFTER_SECONDS: u64 = 600;

/// Warning produced during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,
    /// Location in the configuration the warning refers to.
    pub location: String,
}

/// Validates a parsed configuration.
///
/// # Errors
///
/// Returns `ConfigError::Validation` listing every structural problem
/// found; warnings are returned on success.
pub fn validate(config: &Config) -> Result<Vec<LoadWarning>, ConfigError> {
    let mut errors: Vec<ValidationIssue> = Vec::new();
    let mut warnings: Vec<LoadWarning> = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationIssue {
            path: "servers".to_string(),
            message: "at least one server must be configured".to_string(),
        });
    }

    for (i, server) in config.servers.iter().enumerate() {
        let at = |field: &str| format!("servers[{i}].{field}");

        if server.host.trim().is_empty() {
            errors.push(ValidationIssue {
                path: at("host"),
                message: "host must not be empty".to_string(),
            });
        }
        if server.port == 0 {
            errors.push(ValidationIssue {
                path: at("port"),
                message: "port must not be zero".to_string(),
            });
        }
        if server.password.is_empty() {
            errors.push(ValidationIssue {
                path: at("password"),
                message: "password must not be empty".to_string(),
            });
        }
        if let Some(seconds) = server.punish_after_seconds {
            if seconds == 0 || seconds > MAX_PUNISH_AFTER_SECONDS {
                errors.push(ValidationIssue {
                    path: at("punish_after_seconds"),
                    message: format!(
                        "must be between 1 and {MAX_PUNISH_AFTER_SECONDS}, got {seconds}"
                    ),
                });
            }
        }
        if server.idle_restart_seconds == Some(0) {
            errors.push(ValidationIssue {
                path: at("idle_restart_seconds"),
                message: "must not be zero".to_string(),
            });
        }

        if server.axis_fences.is_empty() && server.allied_fences.is_empty() {
            warnings.push(LoadWarning {
                message: "no fences configured; enforcement is disabled for this server"
                    .to_string(),
                location: format!("servers[{i}]"),
            });
        }
        for (field, template) in [
            ("warning_message", &server.warning_message),
            ("punish_message", &server.punish_message),
        ] {
            if template.as_deref().is_some_and(|t| t.trim().is_empty()) {
                warnings.push(LoadWarning {
                    message: "message template is empty; the default will not apply".to_string(),
                    location: at(field),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::Validation { errors })
    }
}
