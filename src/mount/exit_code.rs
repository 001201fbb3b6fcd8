//! rclone exit status taxonomy.
//!
//! See <https://rclone.org/docs/#exit-code>.

use std::process::ExitStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCategory {
    Success,
    UsageError,
    Error,
    DirNotFound,
    FileNotFound,
    /// More retries might fix it.
    Retryable,
    NoRetry,
    /// Account-level failure, retrying cannot help.
    Fatal,
    TransferExceeded,
    NoTransfer,
    Unknown(i32),
    /// Terminated by a signal, no exit code.
    Killed(i32),
}

impl ExitCategory {
    /// Total over all integers.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitCategory::Success,
            1 => ExitCategory::UsageError,
            2 => ExitCategory::Error,
            3 => ExitCategory::DirNotFound,
            4 => ExitCategory::FileNotFound,
            5 => ExitCategory::Retryable,
            6 => ExitCategory::NoRetry,
            7 => ExitCategory::Fatal,
            8 => ExitCategory::TransferExceeded,
            9 => ExitCategory::NoTransfer,
            other => ExitCategory::Unknown(other),
        }
    }

    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::from_code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitCategory::Killed(signal);
            }
        }
        ExitCategory::Unknown(-1)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExitCategory::Success => "success",
            ExitCategory::UsageError => "syntax or usage error",
            ExitCategory::Error => "error not otherwise categorised",
            ExitCategory::DirNotFound => "directory not found",
            ExitCategory::FileNotFound => "file not found",
            ExitCategory::Retryable => "temporary error (retries might fix)",
            ExitCategory::NoRetry => "less serious error (no retry)",
            ExitCategory::Fatal => "fatal error (retries won't fix, e.g. account suspended)",
            ExitCategory::TransferExceeded => "transfer limit reached",
            ExitCategory::NoTransfer => "operation successful, no files transferred",
            ExitCategory::Unknown(_) => "unknown exit code",
            ExitCategory::Killed(_) => "terminated by signal",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitCategory::Success | ExitCategory::NoTransfer)
    }

    /// Whether relaunching the mount can help.
    pub fn is_remountable(&self) -> bool {
        !matches!(self, ExitCategory::UsageError | ExitCategory::Fatal)
    }
}

impl std::fmt::Display for ExitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitCategory::Unknown(code) => write!(f, "{} ({})", self.description(), code),
            ExitCategory::Killed(sig) => write!(f, "{} {}", self.description(), sig),
            _ => write!(f, "{}", self.description()),
        }
    }
}
