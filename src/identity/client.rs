//! Registers or loads the OIDC client of an instance.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{
    classify_io_error, classify_reqwest_error, snippet, AuthError, ErrorContext, ResultExt,
    WireResult,
};
use crate::startup::{write_private, DEFAULT_IAM_SERVER};
use crate::vault::{
    ask_with_default, create_passphrase, existing_passphrase, Passphrase, Prompter, SecretVault,
};

use super::discovery::discover_registration_endpoint;
use super::registration::{ClientRegistration, RegistrationRequest};

/// Outcome of [`IdentityClient::init_client`].
#[derive(Debug, Clone)]
pub struct ClientInit {
    /// Issuer base URL (`<endpoint>/authorize`, `<endpoint>/token`).
    pub endpoint: String,
    pub registration: ClientRegistration,
    /// Password that protects the stored registration; `None` when nothing
    /// is stored.
    pub passphrase: Option<Passphrase>,
    /// True when this call registered a new client.
    pub registered: bool,
}

/// Registers an OIDC client once per instance and stores it sealed.
pub struct IdentityClient {
    http: reqwest::Client,
    vault: SecretVault,
    prompter: Arc<dyn Prompter>,
    conf_dir: PathBuf,
    callback_host: String,
    callback_port: u16,
    iam_server: Option<String>,
    no_password: bool,
    non_interactive: bool,
}

impl IdentityClient {
    pub fn new(
        http: reqwest::Client,
        vault: SecretVault,
        prompter: Arc<dyn Prompter>,
        conf_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            vault,
            prompter,
            conf_dir: conf_dir.into(),
            callback_host: "localhost".to_string(),
            callback_port: 0,
            iam_server: None,
            no_password: false,
            non_interactive: false,
        }
    }

    /// Host and port embedded in the registered redirect URI.
    pub fn with_callback(mut self, host: impl Into<String>, port: u16) -> Self {
        self.callback_host = host.into();
        self.callback_port = port;
        self
    }

    pub fn with_iam_server(mut self, server: Option<String>) -> Self {
        self.iam_server = server;
        self
    }

    /// Do not persist the registration and never ask for a password.
    pub fn with_no_password(mut self, no_password: bool) -> Self {
        self.no_password = no_password;
        self
    }

    /// Use the placeholder password instead of prompting.
    pub fn with_non_interactive(mut self, non_interactive: bool) -> Self {
        self.non_interactive = non_interactive;
        self
    }

    pub fn registration_file(&self, instance: &str) -> PathBuf {
        self.conf_dir.join(format!("{}.json", instance))
    }

    /// Return the client of `instance`, registering it on first use.
    ///
    /// A second call against the same on-disk state opens the stored
    /// registration and makes no network request.
    pub async fn init_client(&self, instance: &str) -> WireResult<ClientInit> {
        let path = self.registration_file(instance);
        debug!(file = %path.display(), "init client");

        if !self.no_password && path.exists() {
            self.load(&path)
                .with_context(|| ErrorContext::new("load registration").with_instance(instance))
        } else {
            self.register(&path)
                .await
                .with_context(|| ErrorContext::new("register client").with_instance(instance))
        }
    }

    fn load(&self, path: &Path) -> WireResult<ClientInit> {
        let sealed = std::fs::read(path)
            .map_err(|e| classify_io_error(e, Some(path.to_path_buf()), "read registration"))?;

        let passphrase = if self.non_interactive {
            Passphrase::placeholder()
        } else {
            existing_passphrase(self.prompter.as_ref())?
        };

        let plaintext = self.vault.open(&sealed, &passphrase)?;
        let registration: ClientRegistration =
            serde_json::from_slice(&plaintext).map_err(|e| AuthError::InvalidRegistration {
                message: e.to_string(),
            })?;
        let endpoint = registration.endpoint()?;
        debug!(endpoint = %endpoint, "registration loaded");

        Ok(ClientInit {
            endpoint,
            registration,
            passphrase: Some(passphrase),
            registered: false,
        })
    }

    async fn register(&self, path: &Path) -> WireResult<ClientInit> {
        let endpoint = match self.iam_server {
            Some(ref server) => server.clone(),
            None => ask_with_default(
                self.prompter.as_ref(),
                "Insert the IAM endpoint",
                DEFAULT_IAM_SERVER,
            )?,
        };
        let endpoint = endpoint.trim_end_matches('/').to_string();
        info!(endpoint = %endpoint, "IAM endpoint used");

        let register_url = discover_registration_endpoint(&self.http, &endpoint).await?;
        info!(url = %register_url, "IAM register url");

        let request = RegistrationRequest::for_callback(&self.callback_host, self.callback_port);
        let response = self
            .http
            .post(&register_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, &register_url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e, &register_url))?;
        if !status.is_success() {
            return Err(AuthError::RegistrationFailed {
                endpoint: register_url,
                message: format!("HTTP {}: {}", status.as_u16(), snippet(&body)),
            }
            .into());
        }

        let registration: ClientRegistration =
            serde_json::from_str(&body).map_err(|e| AuthError::RegistrationFailed {
                endpoint: register_url.clone(),
                message: format!("{}. Response: {}", e, snippet(&body)),
            })?;

        if self.no_password {
            debug!("no-password mode, registration is not stored");
            return Ok(ClientInit {
                endpoint,
                registration,
                passphrase: None,
                registered: true,
            });
        }

        let passphrase = if self.non_interactive {
            Passphrase::placeholder()
        } else {
            create_passphrase(self.prompter.as_ref())?
        };

        let sealed = self.vault.seal(body.as_bytes(), &passphrase)?;
        write_private(path, &sealed)
            .map_err(|e| classify_io_error(e, Some(path.to_path_buf()), "write registration"))?;
        debug!(file = %path.display(), "registration stored");

        Ok(ClientInit {
            endpoint,
            registration,
            passphrase: Some(passphrase),
            registered: true,
        })
    }
}
