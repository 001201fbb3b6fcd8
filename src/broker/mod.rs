//! Credential broker: OAuth tokens in, S3 credentials out.
//!
//! # State machine
//!
//! ```text
//! interactive:      Idle -> AwaitingBrowserLogin -> TokenExchanged -> StsCredentialed -> SteadyState
//! non-interactive:  Idle -> StsCredentialed -> SteadyState
//! ```
//!
//! In steady state every refresh renews the access token, rewrites
//! `.token`, renews the storage credentials and rewrites `rclone.conf`.

pub mod callback;
pub mod credentials;
pub mod pages;
pub mod storage_config;
pub mod sts;
pub mod token;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

pub use callback::{random_state, BrowserLogin, LoginResult, PendingLogin};
pub use credentials::{SessionCredentials, TokenFile};
pub use pages::LoginFailure;
pub use storage_config::StorageConfigWriter;
pub use sts::{parse_sts_response, StorageCredentials, StsClient};
pub use token::{jwt_expires_in, TokenClient, TokenResponse};

use crate::error::{AuthError, ErrorContext, WireError, WireResult};
use crate::identity::ClientRegistration;
use crate::startup::{EnvOverrides, InstancePaths, SessionConfig};
use crate::traits::CredentialRefresher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Idle,
    AwaitingBrowserLogin,
    TokenExchanged,
    StsCredentialed,
    SteadyState,
}

const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Run `op` until it succeeds, fails for good, or runs out of retries.
///
/// Only retryable (transport level) errors are retried, with exponential
/// backoff starting at `base_delay`.
pub async fn retry_transient<T, F, Fut>(
    operation: &str,
    retries: u32,
    base_delay: Duration,
    mut op: F,
) -> WireResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = WireResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retries => {
                let delay = base_delay.saturating_mul(2u32.saturating_pow(attempt));
                attempt += 1;
                warn!(
                    operation,
                    attempt,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e.with_context(ErrorContext::new(operation).with_attempt(attempt + 1)))
            }
        }
    }
}

pub struct CredentialBroker {
    instance: String,
    token_client: TokenClient,
    sts: StsClient,
    token_file: TokenFile,
    storage_config: StorageConfigWriter,
    env: EnvOverrides,
    callback_host: String,
    callback_port: u16,
    sts_duration_secs: u64,
    login_timeout: Duration,
    refresh_interval: Duration,
    refresh_retries: u32,
    retry_base_delay: Duration,
    open_browser: bool,
    state: BrokerState,
    credentials: Option<SessionCredentials>,
    storage: Option<StorageCredentials>,
}

impl CredentialBroker {
    pub fn new(
        config: &SessionConfig,
        http: reqwest::Client,
        endpoint: &str,
        registration: &ClientRegistration,
        paths: &InstancePaths,
        env: EnvOverrides,
        callback_port: u16,
    ) -> Self {
        Self {
            instance: config.instance.clone(),
            token_client: TokenClient::new(http.clone(), endpoint, registration),
            sts: StsClient::new(http, config.s3_endpoint.clone()),
            token_file: TokenFile::new(paths.token_file()),
            storage_config: StorageConfigWriter::new(
                paths.storage_config(),
                config.instance.clone(),
                config.s3_endpoint.clone(),
            ),
            env,
            callback_host: config.callback_host.clone(),
            callback_port,
            sts_duration_secs: config.sts_duration_secs(),
            login_timeout: config.login_timeout,
            refresh_interval: config.refresh_interval(),
            refresh_retries: config.refresh_retries,
            retry_base_delay: RETRY_BASE_DELAY,
            open_browser: true,
            state: BrokerState::Idle,
            credentials: None,
            storage: None,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Skip launching a browser; the login URL is only logged.
    pub fn with_browser(mut self, open: bool) -> Self {
        self.open_browser = open;
        self
    }

    pub fn state(&self) -> BrokerState {
        self.state
    }

    pub fn credentials(&self) -> Option<&SessionCredentials> {
        self.credentials.as_ref()
    }

    pub fn storage(&self) -> Option<&StorageCredentials> {
        self.storage.as_ref()
    }

    fn transition(&mut self, next: BrokerState) {
        debug!(instance = %self.instance, from = ?self.state, to = ?next, "broker state");
        self.state = next;
    }

    /// Obtain the first set of credentials and write `rclone.conf`.
    pub async fn start(&mut self) -> WireResult<()> {
        if self.env.is_non_interactive() {
            self.start_from_env().await?;
        } else {
            self.start_interactive().await?;
        }
        self.transition(BrokerState::SteadyState);
        Ok(())
    }

    async fn start_interactive(&mut self) -> WireResult<()> {
        self.transition(BrokerState::AwaitingBrowserLogin);
        let pending = BrowserLogin::new(
            self.token_client.clone(),
            self.sts.clone(),
            self.token_file.clone(),
            self.sts_duration_secs,
        )
        .with_timeout(self.login_timeout)
        .start(&self.callback_host, self.callback_port)
        .await?;

        if self.open_browser {
            pending.open_browser();
        } else {
            info!(url = %pending.login_url(), "waiting for browser login");
        }

        let result = pending.wait().await?;
        self.transition(BrokerState::TokenExchanged);
        self.credentials = Some(result.credentials);

        self.storage_config.write(&result.storage)?;
        self.storage = Some(result.storage);
        self.transition(BrokerState::StsCredentialed);
        Ok(())
    }

    async fn start_from_env(&mut self) -> WireResult<()> {
        let refresh_token = self.env.refresh_token.clone().unwrap_or_default();
        info!(instance = %self.instance, "using tokens from the environment");
        match self.env.access_token.clone() {
            Some(access) => {
                self.credentials = Some(SessionCredentials::new(access, refresh_token));
                self.token_file.write(&self.current_access_token())?;
                self.renew_storage().await?;
                self.transition(BrokerState::StsCredentialed);
                // validate the supplied refresh token right away
                self.refresh().await
            }
            None => {
                self.credentials = Some(SessionCredentials::new(String::new(), refresh_token));
                self.refresh().await?;
                self.transition(BrokerState::StsCredentialed);
                Ok(())
            }
        }
    }

    fn current_access_token(&self) -> String {
        self.credentials
            .as_ref()
            .map(|c| c.access_token.clone())
            .unwrap_or_default()
    }

    async fn renew_storage(&mut self) -> WireResult<()> {
        let access = self.current_access_token();
        let sts = &self.sts;
        let duration = self.sts_duration_secs;
        let storage = retry_transient("sts", self.refresh_retries, self.retry_base_delay, || {
            sts.assume_role_with_web_identity(&access, duration)
        })
        .await?;
        self.storage_config.write(&storage)?;
        if let Some(expiry) = storage.expiry {
            debug!(%expiry, "storage credentials renewed");
        }
        self.storage = Some(storage);
        Ok(())
    }

    /// One refresh cycle: token, `.token`, storage credentials, `rclone.conf`.
    pub async fn refresh(&mut self) -> WireResult<()> {
        let refresh_token = self
            .credentials
            .as_ref()
            .map(|c| c.refresh_token.clone())
            .unwrap_or_default();
        let client = &self.token_client;
        let token = retry_transient(
            "token refresh",
            self.refresh_retries,
            self.retry_base_delay,
            || client.refresh(&refresh_token),
        )
        .await
        .map_err(|e| e.with_context(ErrorContext::new("refresh").with_instance(&self.instance)))?;

        match self.credentials.as_mut() {
            Some(creds) => creds.rotate(token.access_token, token.refresh_token),
            None => {
                return Err(WireError::from(AuthError::MissingRefreshCredentials {
                    field: "refresh token",
                }))
            }
        }
        self.token_file.write(&self.current_access_token())?;
        self.renew_storage().await?;
        info!(instance = %self.instance, "credentials refreshed");
        Ok(())
    }
}

#[async_trait]
impl CredentialRefresher for CredentialBroker {
    async fn refresh(&mut self) -> WireResult<()> {
        CredentialBroker::refresh(self).await
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn network_err() -> WireError {
        NetworkError::HttpStatus {
            status: 503,
            message: "unavailable".into(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let value = retry_transient("op", 3, Duration::from_millis(1), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(network_err())
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = retry_transient::<(), _, _>("op", 2, Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(network_err()) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.context().map(|c| c.attempt), Some(3));
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_provider_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = retry_transient::<(), _, _>("op", 5, Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err(AuthError::ProviderRejected {
                    error: "invalid_grant".into(),
                    description: String::new(),
                }
                .into())
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!err.is_retryable());
    }
}
