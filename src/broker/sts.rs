//! AssumeRoleWithWebIdentity against the S3-compatible STS endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{classify_reqwest_error, snippet, AuthError, WireError, WireResult};

const STS_VERSION: &str = "2011-06-15";

/// Temporary storage credentials. Held in memory only.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct StorageCredentials {
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleWithWebIdentityResponse {
    assume_role_with_web_identity_result: WebIdentityResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WebIdentityResult {
    credentials: XmlCredentials,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: String,
    #[serde(default)]
    expiration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    error: XmlError,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Parse the XML envelope returned by the STS endpoint.
pub fn parse_sts_response(body: &str) -> Result<StorageCredentials, AuthError> {
    match quick_xml::de::from_str::<AssumeRoleWithWebIdentityResponse>(body) {
        Ok(envelope) => {
            let creds = envelope.assume_role_with_web_identity_result.credentials;
            if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
                return Err(AuthError::StsMalformedResponse {
                    message: "credentials without access key".to_string(),
                });
            }
            let expiry = creds
                .expiration
                .as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
                .map(|t| t.with_timezone(&Utc));
            Ok(StorageCredentials {
                access_key_id: creds.access_key_id,
                secret_access_key: creds.secret_access_key,
                session_token: creds.session_token,
                expiry,
            })
        }
        Err(parse_err) => match quick_xml::de::from_str::<ErrorResponse>(body) {
            Ok(rejected) => Err(AuthError::StsRejected {
                code: rejected.error.code,
                message: rejected.error.message,
            }),
            Err(_) => Err(AuthError::StsMalformedResponse {
                message: format!("{}. Response: {}", parse_err, snippet(body)),
            }),
        },
    }
}

#[derive(Debug, Clone)]
pub struct StsClient {
    http: reqwest::Client,
    endpoint: String,
}

impl StsClient {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange an access token for storage credentials valid
    /// `duration_secs` seconds.
    ///
    /// A refused connection is `StsUnreachable`; anything that answers
    /// with an unreadable envelope is `StsMalformedResponse`.
    pub async fn assume_role_with_web_identity(
        &self,
        web_identity_token: &str,
        duration_secs: u64,
    ) -> WireResult<StorageCredentials> {
        let duration = duration_secs.to_string();
        debug!(endpoint = %self.endpoint, duration_secs, "requesting storage credentials");

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[
                ("Action", "AssumeRoleWithWebIdentity"),
                ("Version", STS_VERSION),
                ("WebIdentityToken", web_identity_token),
                ("DurationSeconds", duration.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    WireError::from(AuthError::StsUnreachable {
                        endpoint: self.endpoint.clone(),
                        message: e.to_string(),
                    })
                } else {
                    WireError::from(classify_reqwest_error(&e, &self.endpoint))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e, &self.endpoint))?;
        debug!(status = status.as_u16(), "STS answered");

        Ok(parse_sts_response(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MINIO_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<AssumeRoleWithWebIdentityResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <AssumeRoleWithWebIdentityResult>
    <AssumedRoleUser><Arn></Arn><AssumeRoleId></AssumeRoleId></AssumedRoleUser>
    <Credentials>
      <AccessKeyId>Y4RJU1RNFGK48LGO9I2S</AccessKeyId>
      <SecretAccessKey>sYLRKS1Z7hSjluf6gEbb9066hnx315wHTiACPAjg</SecretAccessKey>
      <Expiration>2030-08-08T20:26:12Z</Expiration>
      <SessionToken>eyJhbGciOiJIUzUxMiIsInR5cCI6IkpXVCJ9</SessionToken>
    </Credentials>
    <SubjectFromWebIdentityToken>03bdc5c1-f7c1</SubjectFromWebIdentityToken>
  </AssumeRoleWithWebIdentityResult>
  <ResponseMetadata><RequestId>1</RequestId></ResponseMetadata>
</AssumeRoleWithWebIdentityResponse>"#;

    #[test]
    fn test_parse_minio_envelope() {
        let creds = parse_sts_response(MINIO_OK).unwrap();
        assert_eq!(creds.access_key_id, "Y4RJU1RNFGK48LGO9I2S");
        assert_eq!(creds.secret_access_key, "sYLRKS1Z7hSjluf6gEbb9066hnx315wHTiACPAjg");
        assert_eq!(creds.session_token, "eyJhbGciOiJIUzUxMiIsInR5cCI6IkpXVCJ9");
        assert_eq!(creds.expiry.unwrap().to_rfc3339(), "2030-08-08T20:26:12+00:00");
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"<ErrorResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <Error><Type></Type><Code>InvalidParameterValue</Code><Message>Token expired</Message></Error>
  <RequestId>1</RequestId>
</ErrorResponse>"#;
        match parse_sts_response(body) {
            Err(AuthError::StsRejected { code, message }) => {
                assert_eq!(code, "InvalidParameterValue");
                assert_eq!(message, "Token expired");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_sts_response("<html>bad gateway</html>"),
            Err(AuthError::StsMalformedResponse { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = parse_sts_response(MINIO_OK).unwrap();
        let debug = format!("{:?}", creds);
        assert!(debug.contains("Y4RJU1RNFGK48LGO9I2S"));
        assert!(!debug.contains("sYLRKS1Z7h"));
    }

    #[tokio::test]
    async fn test_assume_role_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("Action", "AssumeRoleWithWebIdentity"))
            .and(query_param("Version", "2011-06-15"))
            .and(query_param("WebIdentityToken", "access-token"))
            .and(query_param("DurationSeconds", "900"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MINIO_OK))
            .expect(1)
            .mount(&server)
            .await;

        let sts = StsClient::new(reqwest::Client::new(), server.uri());
        let creds = sts.assume_role_with_web_identity("access-token", 900).await.unwrap();
        assert_eq!(creds.access_key_id, "Y4RJU1RNFGK48LGO9I2S");
    }

    #[tokio::test]
    async fn test_unreachable_is_distinct_from_malformed() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sts = StsClient::new(reqwest::Client::new(), format!("http://{}", addr));
        let err = sts.assume_role_with_web_identity("t", 60).await.unwrap_err();
        assert!(matches!(err, WireError::Auth(AuthError::StsUnreachable { .. })));
        assert_eq!(err.category(), ErrorCategory::Network);
    }
}
