//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::catalog::{Data4Library, GoogleBooks};
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::map::KakaoGeocoder;
use crate::oauth::OAuthService;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for calls to third-party APIs.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Google and Naver sign-in.
    pub oauth: OAuthService,
    /// Google Books client.
    pub books: GoogleBooks,
    /// data4library client.
    pub holdings: Data4Library,
    /// Address geocoder.
    pub geocoder: KakaoGeocoder,
}

impl AppState {
    /// Create application state with database.
    pub fn new_with_db(config: Config, db: Database, auth: AuthService) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .user_agent(concat!("booklens/", env!("CARGO_PKG_VERSION")))
            // OAuth token endpoints must not be followed through redirects
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let books = GoogleBooks::new(
            http.clone(),
            config.catalog.google_books_url.clone(),
            config.catalog.google_books_api_key.clone(),
        );
        let holdings = Data4Library::new(
            http.clone(),
            config.catalog.data4library_url.clone(),
            config.catalog.data4library_api_key.clone(),
        );
        let geocoder = KakaoGeocoder::new(http.clone(), config.map.kakao_rest_key.clone());
        let oauth = OAuthService::new(http, db.clone(), &config);

        if !books.has_api_key() {
            tracing::warn!("Google Books API key not set; catalog listings will be empty");
        }

        Ok(Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
            oauth,
            books,
            holdings,
            geocoder,
        })
    }

    /// Drop expired sessions. Run at startup.
    pub fn cleanup(&self) -> Result<()> {
        let removed = self.db.cleanup_expired_sessions()?;
        if removed > 0 {
            tracing::info!(removed, "Removed expired sessions");
        }
        Ok(())
    }
}
