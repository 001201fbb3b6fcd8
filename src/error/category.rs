//! Error category classification.
//!
//! Categories drive the two decisions a session has to make about a failure:
//! whether it aborts before any mount is attempted, and whether retrying the
//! same operation can help.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Bad endpoint, bad registration, password problems.
    /// Fatal before any mount is attempted.
    Setup,

    /// Connection, DNS, timeout, 5xx.
    /// Transient; refresh retries these with backoff.
    Network,

    /// The identity provider or STS endpoint answered with an explicit error.
    Provider,

    /// Mount executable or mount process failures.
    Mount,

    /// At-rest data failed authentication (wrong password, wrong machine,
    /// tampered file).
    Integrity,

    /// Missing or invalid settings.
    Configuration,

    /// Filesystem, permissions, OS resources.
    System,
}

impl ErrorCategory {
    /// Returns true if errors in this category are generally transient
    /// and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network)
    }

    /// Returns true if the error must abort the session before mounting.
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Setup | ErrorCategory::Integrity | ErrorCategory::Configuration
        )
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Setup => "setup",
            ErrorCategory::Network => "network",
            ErrorCategory::Provider => "provider",
            ErrorCategory::Mount => "mount",
            ErrorCategory::Integrity => "integrity",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::System => "system",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Setup => "Check the IAM server address and the instance name",
            ErrorCategory::Network => "Check your network connection and the endpoint URLs",
            ErrorCategory::Provider => {
                "The identity provider refused the request. Try logging in again"
            }
            ErrorCategory::Mount => "Inspect rclone.log in the instance directory",
            ErrorCategory::Integrity => {
                "Wrong password or the instance was created on another machine. Run `sts-wire clean` to start over"
            }
            ErrorCategory::Configuration => "Check your flags and configuration file",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::Setup.is_retryable());
        assert!(!ErrorCategory::Provider.is_retryable());
        assert!(!ErrorCategory::Mount.is_retryable());
        assert!(!ErrorCategory::Integrity.is_retryable());
        assert!(!ErrorCategory::Configuration.is_retryable());
        assert!(!ErrorCategory::System.is_retryable());
    }

    #[test]
    fn test_category_fatal_setup() {
        assert!(ErrorCategory::Setup.is_fatal_setup());
        assert!(ErrorCategory::Integrity.is_fatal_setup());
        assert!(ErrorCategory::Configuration.is_fatal_setup());
        assert!(!ErrorCategory::Network.is_fatal_setup());
        assert!(!ErrorCategory::Mount.is_fatal_setup());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(format!("{}", ErrorCategory::Integrity), "integrity");
        assert_eq!(ErrorCategory::Provider.as_str(), "provider");
    }
}
