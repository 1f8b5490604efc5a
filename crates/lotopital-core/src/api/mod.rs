//! Typed client for the site content endpoints.
//!
//! Public reads go out without cookies; every write goes through the
//! coordinator's authenticated request, so an expired access token is
//! refreshed transparently.

mod post_list;
mod types;

use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use post_list::PostList;
pub use types::{
    ApiMessage, Category, CategoryDraft, ContactForm, ContactMessage, Post, PostCategory,
    PostDraft, PostPage, PostQuery, split_tags,
};

use crate::session::{ApiRequest, CredentialsMode, SessionCoordinator, server_message};

/// A non-2xx answer from a content endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// True when the request was still unauthorized after a token refresh.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Reads a JSON body, turning a non-2xx status into [`ApiError`].
async fn read_json<T: DeserializeOwned>(response: Response, failure: &str) -> Result<T> {
    let status = response.status();
    let url = response.url().clone();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read response from {url}"))?;

    if !status.is_success() {
        let message =
            server_message(&body).unwrap_or_else(|| format!("{failure} (HTTP {status})"));
        return Err(ApiError { status, message }.into());
    }

    // Some delete endpoints answer 2xx with an empty body.
    let body = if body.trim().is_empty() { "null" } else { &body };
    serde_json::from_str(body).with_context(|| format!("Failed to parse response from {url}"))
}

/// Categories, posts, contact messages.
#[derive(Clone)]
pub struct ContentApi {
    session: SessionCoordinator,
}

impl ContentApi {
    pub fn new(session: SessionCoordinator) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionCoordinator {
        &self.session
    }

    async fn public<T: DeserializeOwned>(&self, request: &ApiRequest, failure: &str) -> Result<T> {
        let response = self.session.send(request, CredentialsMode::Omit, None).await?;
        read_json(response, failure).await
    }

    async fn authenticated<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        failure: &str,
    ) -> Result<T> {
        let response = self.session.authenticated_request(request).await?;
        read_json(response, failure).await
    }

    /// Authenticated write whose answer is an optional `{ message }` body.
    async fn acknowledged(&self, request: &ApiRequest, failure: &str) -> Result<ApiMessage> {
        let ack: Option<ApiMessage> = self.authenticated(request, failure).await?;
        Ok(ack.unwrap_or_default())
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.public(&ApiRequest::get("/category"), "Failed to fetch categories")
            .await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<ApiMessage> {
        let request = ApiRequest::post("/category").json(to_body(draft)?);
        self.acknowledged(&request, "Failed to save category").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn update_category(&self, id: &str, draft: &CategoryDraft) -> Result<ApiMessage> {
        let request = ApiRequest::put(format!("/category/{id}")).json(to_body(draft)?);
        self.acknowledged(&request, "Failed to save category").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn delete_category(&self, id: &str) -> Result<ApiMessage> {
        let request = ApiRequest::delete(format!("/category/{id}"));
        self.acknowledged(&request, "Failed to delete category").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn search_posts(&self, query: &PostQuery) -> Result<PostPage> {
        let request = ApiRequest::get("/posts/search-filter")
            .query("q", &query.q)
            .query("category", &query.category)
            .query("page", query.page.to_string());
        self.public(&request, "Failed to fetch posts").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn get_post(&self, id: &str) -> Result<Post> {
        self.public(&ApiRequest::get(format!("/post/{id}")), "Failed to fetch post")
            .await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn create_post(&self, draft: &PostDraft) -> Result<ApiMessage> {
        let request = ApiRequest::post("/post").json(to_body(draft)?);
        self.acknowledged(&request, "Failed to create post").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn update_post(&self, id: &str, draft: &PostDraft) -> Result<ApiMessage> {
        let request = ApiRequest::put(format!("/post/{id}")).json(to_body(draft)?);
        self.acknowledged(&request, "Failed to update post").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn delete_post(&self, id: &str) -> Result<ApiMessage> {
        let request = ApiRequest::delete(format!("/post/{id}"));
        self.acknowledged(&request, "Failed to delete post").await
    }

    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn list_messages(&self) -> Result<Vec<ContactMessage>> {
        self.authenticated(&ApiRequest::get("/messages"), "Failed to fetch messages")
            .await
    }

    /// Submits the public contact form.
    ///
    /// # Errors
    /// Returns [`ApiError`] on a non-2xx answer, or a transport/decode error.
    pub async fn send_contact(&self, form: &ContactForm) -> Result<ApiMessage> {
        let request = ApiRequest::post("/send-email").json(to_body(form)?);
        let ack: Option<ApiMessage> = self.public(&request, "Failed to send message").await?;
        Ok(ack.unwrap_or_default())
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to encode request body")
}
