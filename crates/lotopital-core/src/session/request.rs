//! Outbound request descriptions.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;

/// Whether the session cookie jar rides along with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsMode {
    /// Send stored cookies and keep any `Set-Cookie` the server answers with.
    Include,
    /// No cookie jar at all.
    Omit,
}

/// A reusable description of one API call.
///
/// The coordinator may send the same request twice (once more after a token
/// refresh), so the body is kept as a JSON value rather than a stream.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    target: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Option<Value>,
    timeout: Option<Duration>,
}

impl ApiRequest {
    /// `target` is either a path relative to the API base URL or an absolute URL.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Per-request timeout, overriding the client-wide default.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Resolves the target against the API base URL.
    pub fn url(&self, base_url: &str) -> String {
        if self.target.starts_with("http://") || self.target.starts_with("https://") {
            return self.target.clone();
        }
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.target.trim_start_matches('/')
        )
    }

    /// Builds the reqwest request on `client`.
    ///
    /// A `bearer` token replaces any caller-supplied `Authorization` header.
    pub(crate) fn build(
        &self,
        client: &reqwest::Client,
        base_url: &str,
        bearer: Option<&str>,
    ) -> Result<RequestBuilder> {
        let mut headers = self.headers.clone();
        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Access token is not a valid header value")?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = client
            .request(self.method.clone(), self.url(base_url))
            .headers(headers);
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder)
    }
}
