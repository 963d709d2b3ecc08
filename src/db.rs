mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Login email, stored lowercased.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2 password hash. Empty for accounts created through OAuth.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Sign-in provider: "local", "google" or "naver".
    pub provider: String,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
    /// Last login time.
    pub last_login: Option<DateTime<Utc>>,
}

/// Authentication session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Pending OAuth authorization, consumed by the callback.
#[derive(Debug, Clone)]
pub struct OAuthState {
    /// CSRF state sent to the provider.
    pub state: String,
    /// Provider name.
    pub provider: String,
    /// PKCE verifier, when the provider supports it.
    pub pkce_verifier: Option<String>,
    /// Creation timestamp.
    pub created_at: i64,
}

/// A timed reading session on a shelf book.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    /// Session ID.
    pub id: String,
    /// Reader.
    pub user_id: String,
    /// Shelf entry being read.
    pub book_id: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time, `None` while active.
    pub ended_at: Option<DateTime<Utc>>,
    /// Pages read when the session ended.
    pub pages_read: Option<u32>,
}

impl ReadingSession {
    /// Whether the session is still running.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Length of the session, or of the time so far while active.
    pub fn duration_seconds(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0)
    }
}

/// Filter for posting listings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingFilter {
    /// Only postings about this book.
    pub book_id: Option<String>,
    /// Only postings by this author.
    pub author_id: Option<String>,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
