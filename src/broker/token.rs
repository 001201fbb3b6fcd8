//! Token endpoint client: authorization-code exchange and refresh grant.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use tracing::debug;

use crate::error::{classify_reqwest_error, snippet, status_error, AuthError, WireResult};
use crate::identity::{ClientRegistration, SCOPES};

/// Response of the token endpoint, success or OAuth error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Seconds until a JWT access token expires; `None` for opaque tokens.
pub fn jwt_expires_in(access_token: &str) -> Option<i64> {
    let payload = URL_SAFE_NO_PAD.decode(access_token.split('.').nth(1)?).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&payload).ok()?;
    Some(claims.exp - chrono::Utc::now().timestamp())
}

impl TokenResponse {
    /// A usable token is non-empty and not already expired.
    pub fn is_fresh(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        if matches!(self.expires_in, Some(secs) if secs <= 0) {
            return false;
        }
        !matches!(jwt_expires_in(&self.access_token), Some(secs) if secs <= 0)
    }
}

/// Talks to `<endpoint>/token` on behalf of one registered client.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, endpoint: &str, registration: &ClientRegistration) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client_id: registration.client_id.clone(),
            client_secret: registration.client_secret.clone(),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.endpoint)
    }

    /// Browser entry point of the authorization-code flow.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Trade an authorization code for tokens (client_secret_basic).
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> WireResult<TokenResponse> {
        let url = self.token_url();
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, &url))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e, &url))?;

        let token: TokenResponse =
            serde_json::from_str(&text).map_err(|e| AuthError::CodeExchangeFailed {
                message: format!("HTTP {}: {}. Response: {}", status.as_u16(), e, snippet(&text)),
            })?;

        if let Some(error) = token.error {
            return Err(AuthError::CodeExchangeFailed {
                message: format!(
                    "{}: {}",
                    error,
                    token.error_description.unwrap_or_default()
                ),
            }
            .into());
        }
        if !status.is_success() {
            return Err(AuthError::CodeExchangeFailed {
                message: format!("HTTP {}", status.as_u16()),
            }
            .into());
        }
        if !token.is_fresh() {
            return Err(AuthError::TokenInvalid.into());
        }
        Ok(token)
    }

    /// Run one `refresh_token` grant.
    ///
    /// An `error` field in the answer is a provider refusal; transport
    /// failures and 5xx come back as retryable network errors.
    pub async fn refresh(&self, refresh_token: &str) -> WireResult<TokenResponse> {
        if self.client_id.is_empty() {
            return Err(AuthError::MissingRefreshCredentials { field: "client id" }.into());
        }
        if self.client_secret.is_empty() {
            return Err(AuthError::MissingRefreshCredentials {
                field: "client secret",
            }
            .into());
        }
        if refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshCredentials {
                field: "refresh token",
            }
            .into());
        }

        let url = self.token_url();
        debug!(url = %url, "refreshing access token");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e, &url))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e, &url))?;

        if let Ok(token) = serde_json::from_str::<TokenResponse>(&text) {
            if let Some(error) = token.error {
                return Err(AuthError::ProviderRejected {
                    error,
                    description: token.error_description.unwrap_or_default(),
                }
                .into());
            }
            if status.is_success() {
                if token.access_token.is_empty() {
                    return Err(AuthError::TokenInvalid.into());
                }
                return Ok(token);
            }
        }

        Err(status_error(status.as_u16(), &text).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NetworkError, WireError};
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registration(id: &str, secret: &str) -> ClientRegistration {
        ClientRegistration {
            client_id: id.into(),
            client_secret: secret.into(),
            registration_endpoint: String::new(),
        }
    }

    fn jwt_with_exp(exp: i64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        format!("eyJhbGciOiJub25lIn0.{}.sig", payload)
    }

    #[test]
    fn test_authorize_url() {
        let client = TokenClient::new(reqwest::Client::new(), "https://iam.example.org/", &registration("abc", "s"));
        let url = client.authorize_url("http://localhost:3128/oauth2/callback", "st8");
        assert!(url.starts_with("https://iam.example.org/authorize?response_type=code&client_id=abc"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3128%2Foauth2%2Fcallback"));
        assert!(url.contains("scope=address%20phone%20openid%20email%20profile%20offline_access"));
        assert!(url.ends_with("state=st8"));
    }

    #[test]
    fn test_freshness() {
        let now = chrono::Utc::now().timestamp();
        let fresh = TokenResponse {
            access_token: jwt_with_exp(now + 600),
            ..Default::default()
        };
        assert!(fresh.is_fresh());

        let expired = TokenResponse {
            access_token: jwt_with_exp(now - 10),
            ..Default::default()
        };
        assert!(!expired.is_fresh());

        let opaque = TokenResponse {
            access_token: "opaque".into(),
            expires_in: Some(3600),
            ..Default::default()
        };
        assert!(opaque.is_fresh());
        assert!(!TokenResponse::default().is_fresh());
    }

    #[tokio::test]
    async fn test_exchange_code_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "refresh_token": "rt",
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TokenClient::new(reqwest::Client::new(), &server.uri(), &registration("id", "secret"));
        let token = client
            .exchange_code("the-code", "http://localhost:1/oauth2/callback")
            .await
            .unwrap();
        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn test_exchange_code_rejects_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "expires_in": 0,
            })))
            .mount(&server)
            .await;

        let client = TokenClient::new(reqwest::Client::new(), &server.uri(), &registration("id", "secret"));
        let err = client.exchange_code("c", "http://x").await.unwrap_err();
        assert!(matches!(err, WireError::Auth(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_refresh_grant_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_id=id"))
            .and(body_string_contains("client_secret=secret"))
            .and(body_string_contains("refresh_token=rt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-at",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TokenClient::new(reqwest::Client::new(), &server.uri(), &registration("id", "secret"));
        let token = client.refresh("rt").await.unwrap();
        assert_eq!(token.access_token, "new-at");
        assert!(token.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_provider_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid refresh token",
            })))
            .mount(&server)
            .await;

        let client = TokenClient::new(reqwest::Client::new(), &server.uri(), &registration("id", "secret"));
        let err = client.refresh("rt").await.unwrap_err();
        match err {
            WireError::Auth(AuthError::ProviderRejected { error, description }) => {
                assert_eq!(error, "invalid_grant");
                assert_eq!(description, "Invalid refresh token");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = TokenClient::new(reqwest::Client::new(), &server.uri(), &registration("id", "secret"));
        let err = client.refresh("rt").await.unwrap_err();
        assert!(matches!(err, WireError::Network(NetworkError::HttpStatus { status: 503, .. })));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_refresh_refuses_empty_credentials() {
        let http = reqwest::Client::new();
        let cases = [
            (registration("", "s"), "rt", "client id"),
            (registration("id", ""), "rt", "client secret"),
            (registration("id", "s"), "", "refresh token"),
        ];
        for (reg, refresh, expected) in cases {
            let client = TokenClient::new(http.clone(), "http://127.0.0.1:9", &reg);
            match client.refresh(refresh).await {
                Err(WireError::Auth(AuthError::MissingRefreshCredentials { field })) => {
                    assert_eq!(field, expected)
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
