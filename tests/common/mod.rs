//! Common test utilities for integration tests.
//!
//! Provides a mock identity provider plus STS endpoint and the session
//! fixtures built on top of it.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use sts_wire::identity::ClientRegistration;
use sts_wire::startup::{EnvOverrides, InstancePaths, SessionConfig};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STS_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <Credentials>
      <AccessKeyId>AKIAEXAMPLE</AccessKeyId>
      <SecretAccessKey>secret-key</SecretAccessKey>
      <Expiration>2030-01-01T00:00:00Z</Expiration>
      <SessionToken>session-token</SessionToken>
    </Credentials>
  </AssumeRoleWithWebIdentityResult>
</AssumeRoleWithWebIdentityResponse>"#;

/// Token endpoint answering every refresh with `access` / `refresh`.
pub async fn mock_token_refresh(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": 3600,
            "token_type": "Bearer",
        })))
        .mount(server)
        .await;
}

/// STS endpoint at `/sts` returning [`STS_OK`].
pub async fn mock_sts(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/sts"))
        .and(query_param("Action", "AssumeRoleWithWebIdentity"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STS_OK))
        .mount(server)
        .await;
}

pub fn registration() -> ClientRegistration {
    ClientRegistration {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        registration_endpoint: String::new(),
    }
}

/// Session config for `instance` against `server`, rooted in `base`.
pub fn session_config(server: &MockServer, base: &Path, instance: &str) -> SessionConfig {
    SessionConfig::new(
        instance,
        format!("{}/sts", server.uri()),
        "/bucket",
        base.join("mnt"),
    )
    .with_base_dir(base)
    .with_cache_dir(base.join("cache"))
    .with_refresh_retries(1)
    .with_login_timeout(Duration::from_secs(5))
}

pub fn instance_paths(config: &SessionConfig) -> InstancePaths {
    let paths = InstancePaths::new(&config.base_dir, &config.instance);
    paths.ensure().unwrap();
    paths
}

pub fn env_tokens(access: Option<&str>, refresh: &str) -> EnvOverrides {
    EnvOverrides {
        access_token: access.map(str::to_string),
        refresh_token: Some(refresh.to_string()),
        client_id: None,
        client_secret: None,
    }
}
