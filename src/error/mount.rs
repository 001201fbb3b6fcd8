//! Mount supervisor error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from preparing, launching and supervising the mount process.
#[derive(Debug, Clone, Error)]
pub enum MountError {
    /// Reading or writing the cached executable failed.
    #[error("mount executable I/O error at {}: {message}", .path.display())]
    ExecutableIo { path: PathBuf, message: String },

    /// The cached executable does not match the packaged one.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// The cached executable lacks the execute bits.
    #[error("{} is not executable (mode {mode:o})", .path.display())]
    NotExecutable { path: PathBuf, mode: u32 },

    /// Verification kept failing while the file was busy.
    #[error("mount executable {} still failing verification after {attempts} attempts: {last}", .path.display())]
    VerificationExhausted {
        path: PathBuf,
        attempts: u32,
        last: String,
    },

    /// The mount process could not be started.
    #[error("failed to start the mount process: {message}")]
    SpawnFailed { message: String },

    /// Waiting on the mount process failed.
    #[error("failed to wait on the mount process: {message}")]
    WaitFailed { message: String },

    /// The watcher went away without reporting how the process ended.
    #[error("mount watcher ended without reporting an exit status")]
    WatcherLost,

    /// The process exited with a category that remounting cannot fix.
    #[error("mount process exited ({category}) and cannot be remounted")]
    NotRemountable { category: String },

    /// The process exited and automatic remount is switched off.
    #[error("mount process exited ({category}) and automatic remount is disabled")]
    RemountDisabled { category: String },

    /// All remount attempts are used up.
    #[error("mount process keeps failing, giving up after {attempts} remount attempts")]
    RemountBudgetExhausted { attempts: u32 },
}

impl MountError {
    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            MountError::ChecksumMismatch { .. } | MountError::VerificationExhausted { .. } => {
                "The cached rclone executable is corrupted. Run `sts-wire clean` and try again."
                    .to_string()
            }
            other => other.to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            MountError::ExecutableIo { .. } => "E_MOUNT_EXE_IO",
            MountError::ChecksumMismatch { .. } => "E_MOUNT_CHECKSUM",
            MountError::NotExecutable { .. } => "E_MOUNT_NOT_EXEC",
            MountError::VerificationExhausted { .. } => "E_MOUNT_VERIFY",
            MountError::SpawnFailed { .. } => "E_MOUNT_SPAWN",
            MountError::WaitFailed { .. } => "E_MOUNT_WAIT",
            MountError::WatcherLost => "E_MOUNT_WATCHER",
            MountError::NotRemountable { .. } => "E_MOUNT_FATAL_EXIT",
            MountError::RemountDisabled { .. } => "E_MOUNT_EXIT",
            MountError::RemountBudgetExhausted { .. } => "E_MOUNT_BUDGET",
        }
    }
}
