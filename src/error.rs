//! Error types for `fencewatch`.
//!
//! Provides the error hierarchy and the mapping from errors to process
//! exit codes.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `fencewatch` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// RCON error (connection failed, command rejected)
    pub const RCON_ERROR: i32 = 4;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `fencewatch` operations.
#[derive(Debug, Error)]
pub enum FenceWatchError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// RCON connection or command error
    #[error(transparent)]
    Rcon(#[from] RconError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FenceWatchError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Rcon(_) => ExitCode::RCON_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    Parse {
        /// Path to the configuration file
        path: PathBuf,
        /// Error message from the parser
        message: String,
    },

    /// Configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
    },

    /// Configuration validation failed
    #[error("validation failed:{}", errors.iter().map(|e| format!("\n  {e}")).collect::<String>())]
    Validation {
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },
}

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., `servers[0].port`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ============================================================================
// RCON Errors
// ============================================================================

/// RCON connection and command errors.
#[derive(Debug, Error)]
pub enum RconError {
    /// I/O error on the underlying connection
    #[error("rcon I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("rcon JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to establish a connection
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed unexpectedly
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Authentication was rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server rejected a command
    #[error("command rejected with status {code}: {message}")]
    Command {
        /// Status code returned by the server
        code: u16,
        /// Status message returned by the server
        message: String,
    },

    /// Protocol-level error (malformed envelope, missing fields)
    #[error("protocol error: {0}")]
    Protocol(String),
}

// ============================================================================
// Tests
// ============================================================================
