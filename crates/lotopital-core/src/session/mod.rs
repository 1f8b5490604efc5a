//! Session coordinator: current admin identity plus authenticated requests.
//!
//! The API keeps the admin session in cookies. Access tokens are short lived;
//! when a request comes back 401 the coordinator exchanges the refresh cookie
//! for a new access token (one refresh at a time, shared by every caller that
//! is waiting on it) and retries the original request once.
//!
//! A `SessionCoordinator` is a cheap handle; construct it once at start-up and
//! clone it into whatever needs authenticated requests.

mod error;
mod refresh;
mod request;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cookie_store::CookieStore;
use futures_util::FutureExt;
use reqwest::{Response, StatusCode};
use reqwest_cookie_store::CookieStoreMutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::sync::{OnceCell, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

pub use error::{AuthError, Cancelled};
pub(crate) use error::server_message;
use refresh::RefreshGate;
pub use request::{ApiRequest, CredentialsMode};

use crate::config::{Config, RetryAuth};
use crate::cookies::{self, StoredCookie};

const LOGIN_PATH: &str = "/admin-login";
const LOGOUT_PATH: &str = "/admin-logout";
const REGISTER_PATH: &str = "/admin-register";
const REFRESH_PATH: &str = "/refresh-token";
const USER_DETAILS_PATH: &str = "/get-user-details";
const FORGOT_PASSWORD_PATH: &str = "/forgot-password";
const RESET_PASSWORD_PATH: &str = "/reset-password";
const VERIFY_EMAIL_PATH: &str = "/verify-email";
const RESEND_VERIFICATION_PATH: &str = "/resend-verification";
const ADMIN_EMAIL_PATH: &str = "/get-admin-email";

/// The authenticated admin, as returned by `/get-user-details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Every other profile field, kept verbatim.
    #[serde(flatten)]
    pub profile: Map<String, Value>,
}

impl Session {
    /// Human-readable label: name and email when both are known.
    pub fn display_name(&self) -> String {
        match (self.name.as_deref(), self.email.as_deref()) {
            (Some(name), Some(email)) => format!("{name} <{email}>"),
            (Some(name), None) => name.to_string(),
            (None, Some(email)) => email.to_string(),
            (None, None) => self.id.clone().unwrap_or_else(|| "unknown user".to_string()),
        }
    }
}

/// Result of `/resend-verification`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ResendVerification {
    #[serde(default)]
    pub message: Option<String>,
    /// Seconds before the server accepts another resend.
    #[serde(default)]
    pub cooldown: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Construction options for a coordinator.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub base_url: String,
    pub timeout: Option<Duration>,
    pub retry_auth: RetryAuth,
}

impl SessionOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            retry_auth: RetryAuth::default(),
        }
    }

    /// Options from the loaded config; `base_url` is the already-resolved API URL.
    pub fn from_config(config: &Config, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: config.request_timeout(),
            retry_auth: config.retry_auth,
        }
    }
}

struct Inner {
    base_url: String,
    retry_auth: RetryAuth,
    jar: Arc<CookieStoreMutex>,
    with_credentials: reqwest::Client,
    without_credentials: reqwest::Client,
    session: watch::Sender<Option<Session>>,
    initialized: OnceCell<()>,
    refresh: RefreshGate,
}

/// Owns the current identity and the authenticated-request primitive.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    /// Creates a coordinator with an empty cookie jar and no session.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(options: SessionOptions) -> Result<Self> {
        let base_url = options.base_url.trim().trim_end_matches('/').to_string();
        Url::parse(&base_url).with_context(|| format!("Invalid API base URL: {base_url}"))?;

        let jar = Arc::new(CookieStoreMutex::new(CookieStore::default()));
        let mut with_credentials = reqwest::Client::builder().cookie_provider(Arc::clone(&jar));
        let mut without_credentials = reqwest::Client::builder();
        if let Some(timeout) = options.timeout {
            with_credentials = with_credentials.timeout(timeout);
            without_credentials = without_credentials.timeout(timeout);
        }

        let (session, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(Inner {
                base_url,
                retry_auth: options.retry_auth,
                jar,
                with_credentials: with_credentials
                    .build()
                    .context("Failed to build HTTP client")?,
                without_credentials: without_credentials
                    .build()
                    .context("Failed to build HTTP client")?,
                session,
                initialized: OnceCell::new(),
                refresh: RefreshGate::default(),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The current identity, if any.
    pub fn session(&self) -> Option<Session> {
        self.inner.session.borrow().clone()
    }

    /// Watches identity changes (login, logout, refresh failure).
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.session.subscribe()
    }

    /// Overrides the current identity, for callers that manage it themselves.
    pub fn set_session(&self, session: Option<Session>) {
        self.inner.session.send_replace(session);
    }

    fn clear_session(&self) {
        if self.inner.session.send_replace(None).is_some() {
            debug!("session cleared");
        }
    }

    /// True once `initialize` has finished.
    pub fn is_ready(&self) -> bool {
        self.inner.initialized.initialized()
    }

    /// True while a token refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_in_flight()
    }

    /// Loads the current identity once per coordinator.
    ///
    /// Concurrent and repeated calls share the first call's fetch and return
    /// only after it has finished. A failed fetch leaves no session.
    pub async fn initialize(&self) {
        self.inner
            .initialized
            .get_or_init(|| async {
                self.load_identity().await;
            })
            .await;
    }

    /// Sends `request` with the session cookies and recovers from one 401.
    ///
    /// HTTP error statuses are returned as responses, never as errors; a 401
    /// that survives the refresh comes back unchanged after the session has
    /// been cleared.
    ///
    /// # Errors
    /// Returns an error only on transport failure.
    pub async fn authenticated_request(&self, request: &ApiRequest) -> Result<Response> {
        let response = self.send(request, CredentialsMode::Include, None).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(path = request.target(), "request unauthorized, refreshing access token");
        let Some(token) = self.refresh_access_token().await else {
            debug!(path = request.target(), "token refresh failed");
            self.clear_session();
            return Ok(response);
        };

        let bearer = match self.inner.retry_auth {
            RetryAuth::Bearer => Some(token.as_str()),
            RetryAuth::Cookie => None,
        };
        self.send(request, CredentialsMode::Include, bearer).await
    }

    /// `authenticated_request` that gives up when `cancel` fires.
    ///
    /// # Errors
    /// Returns [`Cancelled`] when cancelled, otherwise as `authenticated_request`.
    pub async fn authenticated_request_until(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        tokio::select! {
            () = cancel.cancelled() => Err(Cancelled.into()),
            result = self.authenticated_request(request) => result,
        }
    }

    /// Sends `request` once, without any 401 handling.
    ///
    /// # Errors
    /// Returns an error on transport failure.
    pub async fn send(
        &self,
        request: &ApiRequest,
        credentials: CredentialsMode,
        bearer: Option<&str>,
    ) -> Result<Response> {
        let client = match credentials {
            CredentialsMode::Include => &self.inner.with_credentials,
            CredentialsMode::Omit => &self.inner.without_credentials,
        };
        let url = request.url(&self.inner.base_url);
        debug!(method = %request.method(), %url, "sending request");

        request
            .build(client, &self.inner.base_url, bearer)?
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))
    }

    async fn refresh_access_token(&self) -> Option<String> {
        let client = self.inner.with_credentials.clone();
        let url = ApiRequest::post(REFRESH_PATH).url(&self.inner.base_url);
        self.inner
            .refresh
            .run(move || {
                async move {
                    match request_new_token(&client, &url).await {
                        Ok(token) => token,
                        Err(err) => {
                            warn!(error = %format!("{err:#}"), "token refresh failed");
                            None
                        }
                    }
                }
                .boxed()
            })
            .await
    }

    async fn load_identity(&self) {
        match self.fetch_identity().await {
            Ok(session) => {
                debug!(user = ?session.id, "session established");
                self.set_session(Some(session));
            }
            Err(err) => {
                debug!(error = %format!("{err:#}"), "no active session");
                self.clear_session();
            }
        }
    }

    async fn fetch_identity(&self) -> Result<Session> {
        let response = self
            .authenticated_request(&ApiRequest::get(USER_DETAILS_PATH))
            .await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("User details request failed (HTTP {status})");
        }
        response
            .json()
            .await
            .context("Failed to parse user details response")
    }

    /// Logs in and loads the identity of the new session.
    ///
    /// Returns the login response body.
    ///
    /// # Errors
    /// Returns [`AuthError`] with the server's message on a non-2xx answer,
    /// or a transport error.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value> {
        let request =
            ApiRequest::post(LOGIN_PATH).json(json!({ "email": email, "password": password }));
        let payload = self
            .identity_call(&request, CredentialsMode::Include, "Login failed")
            .await?;
        self.load_identity().await;
        Ok(payload)
    }

    /// Ends the server session and clears the local identity.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer, or a transport error.
    pub async fn logout(&self) -> Result<Value> {
        let payload = self
            .identity_call(
                &ApiRequest::post(LOGOUT_PATH),
                CredentialsMode::Include,
                "Logout failed",
            )
            .await?;
        self.clear_session();
        Ok(payload)
    }

    /// Registers a new admin account. Does not touch the session.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer, or a transport error.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Value> {
        let request = ApiRequest::post(REGISTER_PATH).json(json!({
            "name": name,
            "email": email,
            "password": password,
            "confirmPassword": confirm_password,
        }));
        self.identity_call(&request, CredentialsMode::Omit, "Signup failed")
            .await
    }

    /// Requests a password reset email.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer, or a transport error.
    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).json(json!({ "email": email }));
        self.identity_call(&request, CredentialsMode::Omit, "Password reset request failed")
            .await
    }

    /// Sets a new password using the token from the reset email.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer, or a transport error.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<Value> {
        let request = ApiRequest::post(format!("{RESET_PASSWORD_PATH}/{token}"))
            .json(json!({ "password": password }));
        self.identity_call(&request, CredentialsMode::Omit, "Password reset failed")
            .await
    }

    /// Consumes an email verification token.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer, or a transport error.
    pub async fn verify_email(&self, token: &str) -> Result<Value> {
        let request = ApiRequest::get(format!("{VERIFY_EMAIL_PATH}/{token}"));
        self.identity_call(&request, CredentialsMode::Omit, "Email verification failed")
            .await
    }

    /// Asks the server to send the verification email again.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer (including the server's
    /// cooldown refusal), or a transport error.
    pub async fn resend_verification(&self) -> Result<ResendVerification> {
        let payload = self
            .identity_call(
                &ApiRequest::post(RESEND_VERIFICATION_PATH),
                CredentialsMode::Include,
                "Failed to resend verification email",
            )
            .await?;
        serde_json::from_value(payload).context("Failed to parse resend verification response")
    }

    /// The address waiting for verification on the current account.
    ///
    /// # Errors
    /// Returns [`AuthError`] on a non-2xx answer, or a transport error.
    pub async fn admin_email(&self) -> Result<String> {
        let payload = self
            .identity_call(
                &ApiRequest::get(ADMIN_EMAIL_PATH),
                CredentialsMode::Include,
                "Unable to fetch email",
            )
            .await?;
        payload
            .get("email")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .context("Admin email response has no email field")
    }

    async fn identity_call(
        &self,
        request: &ApiRequest,
        credentials: CredentialsMode,
        failure: &str,
    ) -> Result<Value> {
        let response = self.send(request, credentials, None).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response from {}", request.target()))?;

        if !status.is_success() {
            return Err(AuthError::from_body(status, &body, failure).into());
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse response from {}", request.target()))
    }

    /// Cookies the server has set for this API, for persisting between runs.
    pub fn export_cookies(&self) -> Vec<StoredCookie> {
        cookies::snapshot(&self.inner.jar)
    }

    /// Replaces the cookie jar with previously exported cookies. Cookies that
    /// expired in the meantime are dropped.
    pub fn import_cookies(&self, stored: &[StoredCookie]) {
        cookies::restore(&self.inner.jar, stored);
    }
}

async fn request_new_token(client: &reqwest::Client, url: &str) -> Result<Option<String>> {
    let response = client
        .post(url)
        .send()
        .await
        .context("Failed to send token refresh request")?;

    let status = response.status();
    if !status.is_success() {
        debug!(%status, "token refresh rejected");
        return Ok(None);
    }

    let body: RefreshResponse = response
        .json()
        .await
        .context("Failed to parse token refresh response")?;
    Ok(body.access_token.filter(|token| !token.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_keeps_extra_profile_fields() {
        let session: Session = serde_json::from_str(
            r#"{"_id":"u1","name":"Ada","email":"admin@lotopital.com","role":"admin","isVerified":true}"#,
        )
        .unwrap();

        assert_eq!(session.id.as_deref(), Some("u1"));
        assert_eq!(session.display_name(), "Ada <admin@lotopital.com>");
        assert_eq!(session.profile.get("role"), Some(&json!("admin")));
        assert_eq!(session.profile.get("isVerified"), Some(&json!(true)));
    }

    #[test]
    fn test_session_accepts_plain_id() {
        let session: Session = serde_json::from_str(r#"{"id":"u2"}"#).unwrap();
        assert_eq!(session.id.as_deref(), Some("u2"));
        assert_eq!(session.display_name(), "u2");
        assert!(session.profile.is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_base_url() {
        assert!(SessionCoordinator::new(SessionOptions::new("not a url")).is_err());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let coordinator =
            SessionCoordinator::new(SessionOptions::new("https://api.lotopital.com/api/")).unwrap();
        assert_eq!(coordinator.base_url(), "https://api.lotopital.com/api");
        assert!(coordinator.session().is_none());
        assert!(!coordinator.is_ready());
        assert!(!coordinator.is_refreshing());
    }

    #[test]
    fn test_cookie_export_import_roundtrip() {
        let source =
            SessionCoordinator::new(SessionOptions::new("https://api.lotopital.com/api")).unwrap();
        let url = Url::parse("https://api.lotopital.com/api").unwrap();
        let cookie = StoredCookie::parse("accessToken=a1; Path=/".to_string(), &url).unwrap();
        source.import_cookies(&[cookie]);

        let exported = source.export_cookies();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].name(), "accessToken");
        assert_eq!(exported[0].value(), "a1");
    }
}
