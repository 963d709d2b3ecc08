use crate::client::session::AuthBackend;
use crate::db::{PostingFilter, ReadingSession, User};
use crate::error::{AppError, Result};
use crate::library::{
    Comment, LikeState, NewPosting, NewShelfEntry, Posting, PostingDraft, ShelfEntry, ShelfStats,
    ShelfUpdate,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

pub use crate::auth::AuthResponse;

/// Backend REST client.
///
/// Requests carry `Authorization: Bearer <token>` when a token is set.
/// Error responses surface the server's `message` (or `error`) field.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url` (e.g. `http://localhost:3000/api`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Use `token` for the resource calls.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Replace the token used for the resource calls.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// API root.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Browser URL that starts sign-in with `provider` ("google" or "naver").
    pub fn oauth_start_url(&self, provider: &str) -> String {
        format!("{}/auth/{}", self.base_url, provider)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                tracing::error!(url = %url, error = %e, "Backend unreachable");
                AppError::Network(format!(
                    "Cannot reach the server at {}. Check that the backend is running.",
                    self.base_url
                ))
            } else {
                AppError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = error_message(status, &text);
        tracing::debug!(method = %method, url = %url, status = status.as_u16(), "API error response");
        Err(status_error(status, message))
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T> {
        let response = self.send(method, path, token, body).await?;
        Ok(response.json().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, self.token.as_deref(), None)
            .await
    }

    async fn send_json<T: DeserializeOwned>(&self, method: Method, path: &str, body: Value) -> Result<T> {
        self.request(method, path, self.token.as_deref(), Some(body))
            .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, self.token.as_deref(), None)
            .await?;
        Ok(())
    }

    // ========== AUTH ==========

    /// Update the signed-in user's display name.
    pub async fn update_profile(&self, name: &str) -> Result<User> {
        self.send_json(Method::PUT, "/auth/profile", json!({ "name": name }))
            .await
    }

    /// Finish an OAuth sign-in with the code and state the provider returned.
    pub async fn oauth_callback(&self, provider: &str, code: &str, state: &str) -> Result<AuthResponse> {
        self.request(
            Method::POST,
            &format!("/auth/{}/callback", provider),
            None,
            Some(json!({ "code": code, "state": state })),
        )
        .await
    }

    // ========== BOOKS ==========

    /// The signed-in user's shelf.
    pub async fn books(&self) -> Result<Vec<ShelfEntry>> {
        self.get("/books").await
    }

    /// One shelf entry.
    pub async fn book(&self, id: &str) -> Result<ShelfEntry> {
        self.get(&format!("/books/{}", id)).await
    }

    /// Add a book.
    pub async fn add_book(&self, book: &NewShelfEntry) -> Result<ShelfEntry> {
        self.send_json(Method::POST, "/books", serde_json::to_value(book)?)
            .await
    }

    /// Replace a book's editable fields.
    pub async fn update_book(&self, id: &str, update: &ShelfUpdate) -> Result<ShelfEntry> {
        self.send_json(
            Method::PUT,
            &format!("/books/{}", id),
            serde_json::to_value(update)?,
        )
        .await
    }

    /// Mark a book completed.
    pub async fn complete_book(&self, id: &str) -> Result<ShelfEntry> {
        self.send_json(Method::POST, &format!("/books/{}/complete", id), json!({}))
            .await
    }

    /// Remove a book.
    pub async fn delete_book(&self, id: &str) -> Result<()> {
        self.delete(&format!("/books/{}", id)).await
    }

    /// Shelf counters.
    pub async fn book_stats(&self) -> Result<ShelfStats> {
        self.get("/books/stats").await
    }

    // ========== READING SESSIONS ==========

    /// Start timing a reading session.
    pub async fn start_session(&self, book_id: &str) -> Result<ReadingSession> {
        self.send_json(
            Method::POST,
            "/reading-sessions",
            json!({ "bookId": book_id }),
        )
        .await
    }

    /// End a session, recording the pages read.
    pub async fn end_session(&self, session_id: &str, pages_read: u32) -> Result<ReadingSession> {
        self.send_json(
            Method::PUT,
            &format!("/reading-sessions/{}", session_id),
            json!({ "pagesRead": pages_read }),
        )
        .await
    }

    /// The running session, if any.
    pub async fn active_session(&self) -> Result<Option<ReadingSession>> {
        self.get("/reading-sessions/active").await
    }

    // ========== POSTINGS ==========

    /// List postings, newest first.
    pub async fn postings(&self, filter: &PostingFilter) -> Result<Vec<Posting>> {
        let mut params = Vec::new();
        if let Some(book_id) = &filter.book_id {
            params.push(format!("bookId={}", urlencoding::encode(book_id)));
        }
        if let Some(author_id) = &filter.author_id {
            params.push(format!("authorId={}", urlencoding::encode(author_id)));
        }

        let path = if params.is_empty() {
            "/postings".to_string()
        } else {
            format!("/postings?{}", params.join("&"))
        };
        self.get(&path).await
    }

    /// One posting.
    pub async fn posting(&self, id: &str) -> Result<Posting> {
        self.get(&format!("/postings/{}", id)).await
    }

    /// Write a posting about a shelf book.
    pub async fn create_posting(&self, posting: &NewPosting) -> Result<Posting> {
        self.send_json(Method::POST, "/postings", serde_json::to_value(posting)?)
            .await
    }

    /// Replace a posting's title, content, rating and tags.
    pub async fn update_posting(&self, id: &str, draft: &PostingDraft) -> Result<Posting> {
        self.send_json(
            Method::PUT,
            &format!("/postings/{}", id),
            serde_json::to_value(draft)?,
        )
        .await
    }

    /// Delete a posting.
    pub async fn delete_posting(&self, id: &str) -> Result<()> {
        self.delete(&format!("/postings/{}", id)).await
    }

    /// Like or unlike a posting.
    pub async fn toggle_like(&self, posting_id: &str) -> Result<LikeState> {
        self.send_json(
            Method::POST,
            &format!("/postings/{}/like", posting_id),
            json!({}),
        )
        .await
    }

    /// Comments on a posting.
    pub async fn comments(&self, posting_id: &str) -> Result<Vec<Comment>> {
        self.get(&format!("/postings/{}/comments", posting_id))
            .await
    }

    /// Comment on a posting.
    pub async fn create_comment(&self, posting_id: &str, content: &str) -> Result<Comment> {
        self.send_json(
            Method::POST,
            &format!("/postings/{}/comments", posting_id),
            json!({ "content": content }),
        )
        .await
    }

    /// Delete one of the user's comments.
    pub async fn delete_comment(&self, id: &str) -> Result<()> {
        self.delete(&format!("/comments/{}", id)).await
    }
}

impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        self.request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn signup(&self, email: &str, password: &str, name: &str) -> Result<AuthResponse> {
        self.request(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": email, "password": password, "name": name })),
        )
        .await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.send(Method::POST, "/auth/logout", Some(token), None)
            .await?;
        Ok(())
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        self.request(Method::GET, "/auth/me", Some(token), None)
            .await
    }
}

/// Message of an error response: `message`, then `error`, then the status.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let field = |key: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    field("message")
        .or_else(|| field("error"))
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()))
}

fn status_error(status: StatusCode, message: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::InvalidInput(message)
        }
        _ => AppError::Upstream(message),
    }
}
