//! Shared helpers for coordinator integration tests.

#![allow(dead_code)]

use std::time::Duration;

use lotopital_core::config::RetryAuth;
use lotopital_core::session::{Session, SessionCoordinator, SessionOptions};
use serde_json::{Value, json};
use wiremock::{MockServer, ResponseTemplate};

pub fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

/// API base URL on the mock server.
pub fn api_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

pub fn coordinator(server: &MockServer) -> SessionCoordinator {
    coordinator_with(server, RetryAuth::Cookie, None)
}

pub fn coordinator_with(
    server: &MockServer,
    retry_auth: RetryAuth,
    timeout: Option<Duration>,
) -> SessionCoordinator {
    let mut options = SessionOptions::new(api_url(server));
    options.retry_auth = retry_auth;
    options.timeout = timeout;
    SessionCoordinator::new(options).expect("build coordinator")
}

pub fn admin() -> Session {
    serde_json::from_value(admin_json()).expect("admin session")
}

pub fn admin_json() -> Value {
    json!({"_id": "u1", "name": "Ada", "email": "admin@lotopital.com", "role": "admin"})
}

pub fn json_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

pub fn unauthorized() -> ResponseTemplate {
    json_response(401, json!({"message": "Not authorized, token expired"}))
}

pub fn token_response(token: &str) -> ResponseTemplate {
    json_response(200, json!({"accessToken": token}))
        .insert_header("set-cookie", format!("accessToken={token}; Path=/; HttpOnly"))
}
