//! Local callback server for the authorization-code login.
//!
//! `GET /` sends the browser to the provider; `GET /oauth2/callback` checks
//! `state`, exchanges the code, saves the token, fetches storage
//! credentials and reports the outcome once through a oneshot channel.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::credentials::{SessionCredentials, TokenFile};
use super::pages::{failure_page, mounting_page, LoginFailure};
use super::sts::{StorageCredentials, StsClient};
use super::token::TokenClient;
use crate::error::{AuthError, WireResult};
use crate::identity::redirect_uri;

/// 32 random bytes, URL-safe base64.
pub fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// What a completed browser login yields.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub credentials: SessionCredentials,
    pub storage: StorageCredentials,
}

type Outcome = Result<LoginResult, AuthError>;

struct CallbackState {
    token_client: TokenClient,
    sts: StsClient,
    token_file: TokenFile,
    sts_duration_secs: u64,
    redirect_uri: String,
    authorize_url: String,
    state: String,
    outcome: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl CallbackState {
    /// Fire the outcome channel. Later calls are no-ops.
    fn finish(&self, outcome: Outcome) {
        let sender = self.outcome.lock().ok().and_then(|mut slot| slot.take());
        if let Some(tx) = sender {
            let _ = tx.send(outcome);
        }
    }

    fn fail(&self, failure: LoginFailure) -> Response {
        self.finish(Err(AuthError::LoginFailed {
            reason: failure.to_string(),
        }));
        failure_page(failure)
    }

    /// End the login with the provider's `error` / `error_description`.
    fn deny(&self, error: String, description: String) -> Response {
        warn!(error = %error, description = %description, "login not authorized by provider");
        self.finish(Err(AuthError::ProviderRejected { error, description }));
        failure_page(LoginFailure::Denied)
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn handle_root(State(state): State<Arc<CallbackState>>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.authorize_url.clone())],
    )
        .into_response()
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if params.state.as_deref() != Some(state.state.as_str()) {
        warn!(error = %AuthError::StateMismatch, "callback ignored");
        return failure_page(LoginFailure::StateMismatch);
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return state.deny(
            params.error.unwrap_or_else(|| "missing_code".to_string()),
            params
                .error_description
                .unwrap_or_else(|| "callback carried no authorization code".to_string()),
        );
    };

    let token = match state.token_client.exchange_code(&code, &state.redirect_uri).await {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "code exchange failed");
            return state.fail(LoginFailure::InvalidToken);
        }
    };

    if let Err(e) = state.token_file.write(&token.access_token) {
        error!(error = %e, "could not save token file");
        return state.fail(LoginFailure::SaveFailed);
    }

    let storage = match state
        .sts
        .assume_role_with_web_identity(&token.access_token, state.sts_duration_secs)
        .await
    {
        Ok(storage) => storage,
        Err(e) => {
            error!(error = %e, "could not get STS credentials");
            return state.fail(LoginFailure::StsFailed);
        }
    };

    match serde_json::to_string(&storage) {
        Ok(summary) => info!(credentials = %summary, "storage credentials acquired"),
        Err(e) => {
            error!(error = %e, "could not encode storage credentials");
            return state.fail(LoginFailure::MarshalFailed);
        }
    }

    state.finish(Ok(LoginResult {
        credentials: SessionCredentials::new(
            token.access_token,
            token.refresh_token.unwrap_or_default(),
        ),
        storage,
    }));
    mounting_page()
}

/// Everything the callback needs to turn a code into credentials.
pub struct BrowserLogin {
    token_client: TokenClient,
    sts: StsClient,
    token_file: TokenFile,
    sts_duration_secs: u64,
    timeout: Duration,
}

impl BrowserLogin {
    pub fn new(
        token_client: TokenClient,
        sts: StsClient,
        token_file: TokenFile,
        sts_duration_secs: u64,
    ) -> Self {
        Self {
            token_client,
            sts,
            token_file,
            sts_duration_secs,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind the listener and start serving.
    pub async fn start(self, host: &str, port: u16) -> WireResult<PendingLogin> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| AuthError::CallbackServer {
                message: format!("bind {}:{}: {}", host, port, e),
            })?;
        let local_addr = listener.local_addr().map_err(|e| AuthError::CallbackServer {
            message: e.to_string(),
        })?;

        let state = random_state();
        let redirect = redirect_uri(host, local_addr.port());
        let authorize_url = self.token_client.authorize_url(&redirect, &state);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let shared = Arc::new(CallbackState {
            token_client: self.token_client,
            sts: self.sts,
            token_file: self.token_file,
            sts_duration_secs: self.sts_duration_secs,
            redirect_uri: redirect,
            authorize_url: authorize_url.clone(),
            state: state.clone(),
            outcome: Mutex::new(Some(outcome_tx)),
        });

        let app = Router::new()
            .route("/", get(handle_root))
            .route("/oauth2/callback", get(handle_callback))
            .with_state(shared);

        info!(addr = %local_addr, "callback server listening");
        let server = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %e, "callback server error");
            }
        });

        Ok(PendingLogin {
            local_addr,
            login_url: format!("http://{}:{}/", host, local_addr.port()),
            authorize_url,
            state,
            outcome_rx,
            shutdown_tx,
            server,
            timeout: self.timeout,
        })
    }
}

/// A running callback server waiting for the browser.
pub struct PendingLogin {
    local_addr: SocketAddr,
    login_url: String,
    authorize_url: String,
    state: String,
    outcome_rx: oneshot::Receiver<Outcome>,
    shutdown_tx: oneshot::Sender<()>,
    server: JoinHandle<()>,
    timeout: Duration,
}

impl PendingLogin {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Local URL that redirects to the provider.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    pub fn authorize_url(&self) -> &str {
        &self.authorize_url
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Open the login page, or print how to finish the flow by hand.
    pub fn open_browser(&self) {
        println!("\nLogin required\n");
        if open::that(&self.login_url).is_ok() {
            println!("Browser opened on {}\n", self.login_url);
            return;
        }
        warn!(url = %self.authorize_url, "failed to open browser");
        println!("Could not open a browser. Open this URL yourself:");
        println!("  {}\n", self.authorize_url);
        println!("Then copy the address you are redirected to and run in another shell:");
        println!(
            "  curl \"<resulting address, e.g. http://localhost:{}/oauth2/callback?code=...&state=...>\"\n",
            self.local_addr.port()
        );
    }

    /// Wait for the callback, then shut the server down.
    pub async fn wait(self) -> WireResult<LoginResult> {
        let outcome = tokio::time::timeout(self.timeout, self.outcome_rx).await;

        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.server.await {
            warn!(error = %e, "callback server task ended abnormally");
        }

        match outcome {
            Err(_) => Err(AuthError::LoginTimedOut {
                secs: self.timeout.as_secs(),
            }
            .into()),
            Ok(Err(_)) => Err(AuthError::CallbackServer {
                message: "callback channel closed".to_string(),
            }
            .into()),
            Ok(Ok(Err(e))) => Err(e.into()),
            Ok(Ok(Ok(result))) => {
                info!("browser login completed");
                Ok(result)
            }
        }
    }
}
