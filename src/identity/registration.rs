//! Dynamic client registration payloads.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::startup::EnvOverrides;

/// Scopes requested at registration and at login.
pub const SCOPES: &[&str] = &["address", "phone", "openid", "email", "profile", "offline_access"];

/// Body of the registration POST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationRequest {
    pub redirect_uris: Vec<String>,
    pub client_name: String,
    pub contacts: Vec<String>,
    pub token_endpoint_auth_method: String,
    pub scope: String,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
}

impl RegistrationRequest {
    pub fn for_callback(host: &str, port: u16) -> Self {
        Self {
            redirect_uris: vec![redirect_uri(host, port)],
            client_name: "oidc-client".to_string(),
            contacts: vec!["client@iam.test".to_string()],
            token_endpoint_auth_method: "client_secret_basic".to_string(),
            scope: SCOPES.join(" "),
            grant_types: vec!["refresh_token".to_string(), "authorization_code".to_string()],
            response_types: vec!["code".to_string()],
        }
    }
}

pub fn redirect_uri(host: &str, port: u16) -> String {
    format!("http://{}:{}/oauth2/callback", host, port)
}

/// A registered OIDC client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: String,
    pub client_secret: String,
    /// Self-URI of the registration, `<issuer>/register/<id>`.
    #[serde(rename = "registration_client_uri", default)]
    pub registration_endpoint: String,
}

impl ClientRegistration {
    /// The issuer, recovered by cutting the self-URI at `/register`.
    pub fn endpoint(&self) -> Result<String, AuthError> {
        let issuer = self
            .registration_endpoint
            .split("/register")
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        if issuer.is_empty() {
            return Err(AuthError::InvalidRegistration {
                message: "registration_client_uri is empty".to_string(),
            });
        }
        Ok(issuer.to_string())
    }

    /// `IAM_CLIENT_ID`/`IAM_CLIENT_SECRET` replace the stored client when tokens
    /// come from the environment.
    pub fn with_overrides(mut self, env: &EnvOverrides) -> Self {
        if !env.is_non_interactive() {
            return self;
        }
        if let Some(ref id) = env.client_id {
            self.client_id = id.clone();
        }
        if let Some(ref secret) = env.client_secret {
            self.client_secret = secret.clone();
        }
        self
    }
}

impl std::fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("registration_endpoint", &self.registration_endpoint)
            .finish()
    }
}
