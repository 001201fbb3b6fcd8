//! Authentication-related error types.
//!
//! Covers client registration, the browser login, the token endpoint and the
//! STS web-identity exchange.

use thiserror::Error;

use super::category::ErrorCategory;

/// Authentication-specific error variants.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The discovery document could not be fetched or parsed.
    #[error("OIDC discovery failed for '{issuer}': {message}")]
    DiscoveryFailed { issuer: String, message: String },

    /// Discovery worked but advertised no registration endpoint.
    #[error("discovery document of '{issuer}' has no registration_endpoint")]
    NoRegistrationEndpoint { issuer: String },

    /// Dynamic client registration failed.
    #[error("client registration at '{endpoint}' failed: {message}")]
    RegistrationFailed { endpoint: String, message: String },

    /// A stored or returned registration is unusable.
    #[error("invalid client registration: {message}")]
    InvalidRegistration { message: String },

    /// The two password entries differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Reading the password from the terminal failed.
    #[error("could not read password: {message}")]
    PasswordInput { message: String },

    /// The callback `state` does not belong to this login attempt.
    #[error("callback state does not match the login attempt")]
    StateMismatch,

    /// Exchanging the authorization code failed.
    #[error("authorization code exchange failed: {message}")]
    CodeExchangeFailed { message: String },

    /// The token endpoint returned an empty or already expired token.
    #[error("received token is empty or expired")]
    TokenInvalid,

    /// The browser login did not finish in time.
    #[error("login did not complete within {secs} seconds")]
    LoginTimedOut { secs: u64 },

    /// The callback handler reported a failure.
    #[error("browser login failed: {reason}")]
    LoginFailed { reason: String },

    /// The local callback server could not be started.
    #[error("callback server error: {message}")]
    CallbackServer { message: String },

    /// Refresh refused to run because a credential is missing.
    #[error("cannot refresh token: {field} is empty")]
    MissingRefreshCredentials { field: &'static str },

    /// The token endpoint answered with an `error` field.
    #[error("provider rejected the request: {error}: {description}")]
    ProviderRejected { error: String, description: String },

    /// The STS endpoint could not be reached at all.
    #[error("STS endpoint '{endpoint}' is unreachable: {message}")]
    StsUnreachable { endpoint: String, message: String },

    /// The STS endpoint answered with something that is not a credential envelope.
    #[error("malformed STS response: {message}")]
    StsMalformedResponse { message: String },

    /// The STS endpoint answered with an explicit error envelope.
    #[error("STS refused the web identity: {code}: {message}")]
    StsRejected { code: String, message: String },
}

impl AuthError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::DiscoveryFailed { .. }
            | AuthError::NoRegistrationEndpoint { .. }
            | AuthError::RegistrationFailed { .. }
            | AuthError::InvalidRegistration { .. }
            | AuthError::PasswordMismatch
            | AuthError::PasswordInput { .. }
            | AuthError::LoginTimedOut { .. } => ErrorCategory::Setup,
            AuthError::StateMismatch
            | AuthError::CodeExchangeFailed { .. }
            | AuthError::TokenInvalid
            | AuthError::LoginFailed { .. }
            | AuthError::ProviderRejected { .. }
            | AuthError::StsMalformedResponse { .. }
            | AuthError::StsRejected { .. } => ErrorCategory::Provider,
            AuthError::CallbackServer { .. } => ErrorCategory::System,
            AuthError::MissingRefreshCredentials { .. } => ErrorCategory::Configuration,
            AuthError::StsUnreachable { .. } => ErrorCategory::Network,
        }
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::PasswordMismatch => {
                "The passwords you entered do not match.".to_string()
            }
            AuthError::LoginTimedOut { secs } => format!(
                "The browser login was not completed within {} seconds. Start sts-wire again to retry.",
                secs
            ),
            AuthError::MissingRefreshCredentials { field } => format!(
                "Cannot refresh the token because the {} is empty. Check IAM_CLIENT_ID, IAM_CLIENT_SECRET and REFRESH_TOKEN.",
                field
            ),
            AuthError::ProviderRejected { error, description } => format!(
                "The identity provider refused the request ({}): {}",
                error, description
            ),
            AuthError::StsUnreachable { endpoint, .. } => format!(
                "Could not reach the storage endpoint '{}' to obtain credentials.",
                endpoint
            ),
            other => other.to_string(),
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::DiscoveryFailed { .. } => "E_AUTH_DISCOVERY",
            AuthError::NoRegistrationEndpoint { .. } => "E_AUTH_NO_REG_ENDPOINT",
            AuthError::RegistrationFailed { .. } => "E_AUTH_REGISTRATION",
            AuthError::InvalidRegistration { .. } => "E_AUTH_BAD_REGISTRATION",
            AuthError::PasswordMismatch => "E_AUTH_PASSWORD_MISMATCH",
            AuthError::PasswordInput { .. } => "E_AUTH_PASSWORD_INPUT",
            AuthError::StateMismatch => "E_AUTH_STATE",
            AuthError::CodeExchangeFailed { .. } => "E_AUTH_CODE_EXCHANGE",
            AuthError::TokenInvalid => "E_AUTH_TOKEN_INVALID",
            AuthError::LoginTimedOut { .. } => "E_AUTH_LOGIN_TIMEOUT",
            AuthError::LoginFailed { .. } => "E_AUTH_LOGIN",
            AuthError::CallbackServer { .. } => "E_AUTH_CALLBACK_SERVER",
            AuthError::MissingRefreshCredentials { .. } => "E_AUTH_MISSING_CREDS",
            AuthError::ProviderRejected { .. } => "E_AUTH_PROVIDER",
            AuthError::StsUnreachable { .. } => "E_STS_UNREACHABLE",
            AuthError::StsMalformedResponse { .. } => "E_STS_MALFORMED",
            AuthError::StsRejected { .. } => "E_STS_REJECTED",
        }
    }
}
