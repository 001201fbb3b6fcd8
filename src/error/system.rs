//! System-related error types.

use std::fmt;
use std::path::PathBuf;

/// System-specific error variants.
#[derive(Debug, Clone)]
pub enum SystemError {
    /// File not found.
    FileNotFound { path: PathBuf },

    /// Permission denied for file/directory operation.
    PermissionDenied { path: PathBuf, operation: String },

    /// Generic I/O error.
    IoError {
        operation: String,
        path: Option<PathBuf>,
        message: String,
    },

    /// Could not determine the per-user cache directory.
    NoCacheDirectory,

    /// Installing the interrupt handler failed.
    SignalHandler { message: String },
}

impl SystemError {
    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            SystemError::FileNotFound { path } => {
                format!("File not found: '{}'", path.display())
            }
            SystemError::PermissionDenied { path, operation } => {
                format!("Permission denied: cannot {} '{}'.", operation, path.display())
            }
            SystemError::IoError {
                operation,
                path: Some(path),
                message,
            } => format!("Failed to {} '{}': {}", operation, path.display(), message),
            SystemError::IoError {
                operation, message, ..
            } => format!("Failed to {}: {}", operation, message),
            SystemError::NoCacheDirectory => {
                "Could not determine the cache directory for this user.".to_string()
            }
            SystemError::SignalHandler { message } => {
                format!("Could not install the interrupt handler: {}", message)
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SystemError::FileNotFound { .. } => "E_SYS_NOT_FOUND",
            SystemError::PermissionDenied { .. } => "E_SYS_PERM",
            SystemError::IoError { .. } => "E_SYS_IO",
            SystemError::NoCacheDirectory => "E_SYS_NO_CACHE",
            SystemError::SignalHandler { .. } => "E_SYS_SIGNAL",
        }
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemError::FileNotFound { path } => {
                write!(f, "File not found: {}", path.display())
            }
            SystemError::PermissionDenied { path, operation } => {
                write!(f, "Permission denied ({}): {}", operation, path.display())
            }
            SystemError::IoError {
                operation,
                path: Some(path),
                message,
            } => write!(f, "I/O error during {} on {}: {}", operation, path.display(), message),
            SystemError::IoError {
                operation, message, ..
            } => write!(f, "I/O error during {}: {}", operation, message),
            SystemError::NoCacheDirectory => write!(f, "No cache directory"),
            SystemError::SignalHandler { message } => {
                write!(f, "Signal handler error: {}", message)
            }
        }
    }
}

impl std::error::Error for SystemError {}

/// Classify an I/O error into a SystemError.
pub fn classify_io_error(
    err: std::io::Error,
    path: Option<PathBuf>,
    operation: &str,
) -> SystemError {
    use std::io::ErrorKind;

    match (err.kind(), path) {
        (ErrorKind::NotFound, Some(path)) => SystemError::FileNotFound { path },
        (ErrorKind::PermissionDenied, Some(path)) => SystemError::PermissionDenied {
            path,
            operation: operation.to_string(),
        },
        (_, path) => SystemError::IoError {
            operation: operation.to_string(),
            path,
            message: err.to_string(),
        },
    }
}
