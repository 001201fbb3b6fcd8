//! OIDC discovery.

use serde::Deserialize;
use tracing::debug;

use crate::error::{classify_reqwest_error, snippet, AuthError, WireResult};

#[derive(Debug, Deserialize)]
struct WellKnown {
    #[serde(default)]
    registration_endpoint: Option<String>,
}

/// Fetch `<issuer>/.well-known/openid-configuration` and return its
/// `registration_endpoint`.
pub async fn discover_registration_endpoint(
    http: &reqwest::Client,
    issuer: &str,
) -> WireResult<String> {
    let url = format!("{}/.well-known/openid-configuration", issuer.trim_end_matches('/'));
    debug!(url = %url, "fetching discovery document");

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| classify_reqwest_error(&e, &url))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        return Err(AuthError::DiscoveryFailed {
            issuer: issuer.to_string(),
            message: format!("HTTP {}", status),
        }
        .into());
    }

    let text = response
        .text()
        .await
        .map_err(|e| classify_reqwest_error(&e, &url))?;
    let document: WellKnown = serde_json::from_str(&text).map_err(|e| AuthError::DiscoveryFailed {
        issuer: issuer.to_string(),
        message: format!("{}. Response: {}", e, snippet(&text)),
    })?;

    match document.registration_endpoint {
        Some(endpoint) if !endpoint.is_empty() => Ok(endpoint),
        _ => Err(AuthError::NoRegistrationEndpoint {
            issuer: issuer.to_string(),
        }
        .into()),
    }
}
