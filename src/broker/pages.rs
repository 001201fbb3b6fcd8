//! Canned pages served to the browser at the end of the login.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Why the callback could not complete the login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFailure {
    InvalidToken,
    SaveFailed,
    StsFailed,
    MarshalFailed,
    /// The provider sent the browser back without a code.
    Denied,
    /// The callback belongs to another login attempt.
    StateMismatch,
}

impl LoginFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginFailure::InvalidToken => "invalid or expired token",
            LoginFailure::SaveFailed => "could not save the token",
            LoginFailure::StsFailed => "could not obtain storage credentials",
            LoginFailure::MarshalFailed => "could not encode storage credentials",
            LoginFailure::Denied => "login not authorized by the identity provider",
            LoginFailure::StateMismatch => "callback state does not match",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            LoginFailure::InvalidToken | LoginFailure::Denied | LoginFailure::StateMismatch => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for LoginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const STYLE: &str = "body{font-family:sans-serif;max-width:40em;margin:4em auto;color:#222}\
h1{font-size:1.4em}.ok{color:#2a7d2a}.err{color:#b02a2a}";

fn page(class: &str, title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>sts-wire</title>\
         <style>{STYLE}</style></head><body><h1 class=\"{class}\">{title}</h1><p>{body}</p>\
         </body></html>"
    )
}

pub fn mounting_page() -> Response {
    Html(page(
        "ok",
        "Login completed",
        "Your volume is being mounted. You can close this window and go back to the terminal.",
    ))
    .into_response()
}

pub fn failure_page(failure: LoginFailure) -> Response {
    let body = match failure {
        LoginFailure::InvalidToken => {
            "The identity provider returned an invalid or expired token. Start sts-wire again."
        }
        LoginFailure::SaveFailed => "The access token could not be written to disk.",
        LoginFailure::StsFailed => {
            "The storage endpoint did not grant credentials for this token. See the instance log."
        }
        LoginFailure::MarshalFailed => "The storage credentials could not be encoded.",
        LoginFailure::Denied => {
            "The identity provider did not authorize the login. Start sts-wire again to retry."
        }
        LoginFailure::StateMismatch => {
            "This link does not belong to the running login. Use the page sts-wire opened."
        }
    };
    (failure.status(), Html(page("err", "Login failed", body))).into_response()
}
