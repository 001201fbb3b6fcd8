//! Unified error type for sts-wire.

use std::fmt;

use super::auth::AuthError;
use super::category::ErrorCategory;
use super::config::ConfigError;
use super::context::ErrorContext;
use super::mount::MountError;
use super::network::NetworkError;
use super::system::SystemError;
use super::vault::VaultError;

/// Unified error type.
///
/// Every fatal path of a session ends in one of these; `main` turns it into
/// the diagnostic report and a non-zero exit.
#[derive(Debug)]
pub enum WireError {
    /// Registration, login, token endpoint and STS errors.
    Auth(AuthError),

    /// At-rest encryption errors.
    Vault(VaultError),

    /// Transport errors.
    Network(NetworkError),

    /// Mount executable and mount process errors.
    Mount(MountError),

    /// System/filesystem errors.
    System(SystemError),

    /// Argument, config file and environment errors.
    Config(ConfigError),

    /// Wrapped error with additional context.
    WithContext {
        error: Box<WireError>,
        context: ErrorContext,
    },
}

impl WireError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            WireError::Auth(err) => err.category(),
            WireError::Vault(_) => ErrorCategory::Integrity,
            WireError::Network(_) => ErrorCategory::Network,
            WireError::Mount(_) => ErrorCategory::Mount,
            WireError::System(_) => ErrorCategory::System,
            WireError::Config(_) => ErrorCategory::Configuration,
            WireError::WithContext { error, .. } => error.category(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WireError::Network(err) => err.is_retryable(),
            WireError::Auth(AuthError::StsUnreachable { .. }) => true,
            WireError::WithContext { error, .. } => error.is_retryable(),
            _ => false,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            WireError::Auth(err) => err.user_message(),
            WireError::Vault(err) => err.user_message(),
            WireError::Network(err) => err.user_message(),
            WireError::Mount(err) => err.user_message(),
            WireError::System(err) => err.user_message(),
            WireError::Config(err) => err.to_string(),
            WireError::WithContext { error, context } => {
                format!("{}\n\nContext: {}", error.user_message(), context)
            }
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            WireError::Auth(err) => err.error_code(),
            WireError::Vault(err) => err.error_code(),
            WireError::Network(err) => err.error_code(),
            WireError::Mount(err) => err.error_code(),
            WireError::System(err) => err.error_code(),
            WireError::Config(err) => err.error_code(),
            WireError::WithContext { error, .. } => error.error_code(),
        }
    }

    /// Attach context to this error.
    pub fn with_context(self, ctx: ErrorContext) -> Self {
        WireError::WithContext {
            error: Box::new(self),
            context: ctx,
        }
    }

    /// Get the outermost context if this error has one attached.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            WireError::WithContext { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Get the inner error without context.
    pub fn inner(&self) -> &WireError {
        match self {
            WireError::WithContext { error, .. } => error.inner(),
            _ => self,
        }
    }

    /// Get the recovery hint for this error.
    pub fn recovery_hint(&self) -> &'static str {
        self.category().recovery_hint()
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Auth(err) => write!(f, "{}", err),
            WireError::Vault(err) => write!(f, "{}", err),
            WireError::Network(err) => write!(f, "{}", err),
            WireError::Mount(err) => write!(f, "{}", err),
            WireError::System(err) => write!(f, "{}", err),
            WireError::Config(err) => write!(f, "{}", err),
            WireError::WithContext { error, context } => {
                write!(f, "{} ({})", error, context)
            }
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Auth(err) => Some(err),
            WireError::Vault(err) => Some(err),
            WireError::Network(err) => Some(err),
            WireError::Mount(err) => Some(err),
            WireError::System(err) => Some(err),
            WireError::Config(err) => Some(err),
            WireError::WithContext { error, .. } => error.source(),
        }
    }
}

// ============================================================================
// From implementations for automatic error conversion
// ============================================================================

impl From<AuthError> for WireError {
    fn from(err: AuthError) -> Self {
        WireError::Auth(err)
    }
}

impl From<VaultError> for WireError {
    fn from(err: VaultError) -> Self {
        WireError::Vault(err)
    }
}

impl From<NetworkError> for WireError {
    fn from(err: NetworkError) -> Self {
        WireError::Network(err)
    }
}

impl From<MountError> for WireError {
    fn from(err: MountError) -> Self {
        WireError::Mount(err)
    }
}

impl From<SystemError> for WireError {
    fn from(err: SystemError) -> Self {
        WireError::System(err)
    }
}

impl From<ConfigError> for WireError {
    fn from(err: ConfigError) -> Self {
        WireError::Config(err)
    }
}

impl From<std::io::Error> for WireError {
    fn from(err: std::io::Error) -> Self {
        use super::system::classify_io_error;
        WireError::System(classify_io_error(err, None, "I/O operation"))
    }
}

impl From<serde_json::Error> for WireError {
    fn from(err: serde_json::Error) -> Self {
        WireError::Network(NetworkError::InvalidResponse {
            message: err.to_string(),
        })
    }
}

impl From<reqwest::Error> for WireError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        WireError::Network(super::network::classify_reqwest_error(&err, &url))
    }
}
