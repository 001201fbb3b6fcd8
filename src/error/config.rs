//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors in command-line arguments, the config file or the environment.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing required argument: {name}")]
    MissingArgument { name: &'static str },

    #[error("unknown flag: {flag}")]
    UnknownFlag { flag: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("cannot read config file {}: {message}", .path.display())]
    FileRead { path: PathBuf, message: String },

    #[error("cannot parse config file {}: {message}", .path.display())]
    FileParse { path: PathBuf, message: String },
}

impl ConfigError {
    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::MissingArgument { .. } => "E_CFG_MISSING",
            ConfigError::UnknownFlag { .. } => "E_CFG_UNKNOWN_FLAG",
            ConfigError::InvalidValue { .. } => "E_CFG_INVALID",
            ConfigError::FileRead { .. } => "E_CFG_READ",
            ConfigError::FileParse { .. } => "E_CFG_PARSE",
        }
    }
}
