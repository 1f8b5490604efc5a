//! Typed errors surfaced by the session coordinator.
//!
//! Operations return `anyhow::Result`; callers that need to branch on the
//! failure kind recover these with `downcast_ref`.

use reqwest::StatusCode;
use serde_json::Value;

/// A non-2xx answer from an identity endpoint (login, signup, logout, ...).
///
/// `message` is the server-provided `message` field when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub status: StatusCode,
    pub message: String,
}

impl AuthError {
    pub(crate) fn from_body(status: StatusCode, body: &str, fallback: &str) -> Self {
        let message =
            server_message(body).unwrap_or_else(|| format!("{fallback} (HTTP {status})"));
        Self { status, message }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AuthError {}

/// The caller's cancellation token fired before the request finished.
#[derive(Debug)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Request cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Extracts the `message` field from a JSON error body.
pub(crate) fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_uses_server_message() {
        let err = AuthError::from_body(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid email or password"}"#,
            "Login failed",
        );
        assert_eq!(err.message, "Invalid email or password");
        assert_eq!(err.to_string(), "Invalid email or password");
    }

    #[test]
    fn test_auth_error_falls_back_without_message() {
        let err = AuthError::from_body(StatusCode::BAD_GATEWAY, "<html>", "Login failed");
        assert_eq!(err.message, "Login failed (HTTP 502 Bad Gateway)");

        let err = AuthError::from_body(StatusCode::BAD_REQUEST, r#"{"message":"  "}"#, "Signup failed");
        assert_eq!(err.message, "Signup failed (HTTP 400 Bad Request)");
    }
}
