use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Personal reading tracker: backend server and command-line client.
#[derive(Parser, Debug, Clone)]
#[command(name = "booklens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKLENS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the backend server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Account management on the local database.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Log in against the backend and keep the session.
    Login {
        /// Account email.
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account on the backend and keep the session.
    Signup {
        /// Account email.
        email: String,
        /// Display name.
        #[arg(short, long)]
        name: Option<String>,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Drop the stored session.
    Logout,

    /// Show the logged in user.
    Whoami,

    /// Search the book catalog.
    Search {
        /// Free text query (title, author, ...).
        query: String,
    },

    /// Look a book up by ISBN.
    Isbn {
        /// ISBN-10 or ISBN-13, hyphens allowed.
        isbn: String,
    },

    /// List libraries holding a book.
    Holdings {
        /// ISBN-13 of the book.
        isbn: String,
    },

    /// List demo libraries and bookstores shown on the map.
    Locations {
        /// Only show this kind: library or bookstore.
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Local shelf (reading progress) commands.
    Shelf {
        /// Shelf subcommand action.
        #[command(subcommand)]
        action: ShelfCommand,
    },

    /// Local reading postings (reviews).
    Post {
        /// Posting subcommand action.
        #[command(subcommand)]
        action: PostCommand,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Email address used to log in.
        email: String,
        /// Display name (defaults to the email local part).
        #[arg(short, long)]
        name: Option<String>,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Delete a user.
    Del {
        /// Email of the user to delete.
        email: String,
    },

    /// List all users.
    List,

    /// Change user password.
    Passwd {
        /// Email of the user.
        email: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Shelf subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ShelfCommand {
    /// Add a book to the shelf.
    Add {
        /// Book title.
        title: String,
        /// Author.
        author: String,
        /// Genre.
        #[arg(short, long)]
        genre: Option<String>,
        /// Total number of pages.
        #[arg(long)]
        pages: Option<u32>,
        /// Borrowed book due back on this date (YYYY-MM-DD).
        #[arg(long)]
        return_date: Option<chrono::NaiveDate>,
    },

    /// List shelf entries.
    List,

    /// Set reading progress (percent).
    Progress {
        /// Shelf entry ID.
        id: String,
        /// Progress in percent, clamped to 0-100.
        percent: i64,
    },

    /// Replace the memo of an entry.
    Memo {
        /// Shelf entry ID.
        id: String,
        /// Memo text.
        text: String,
    },

    /// Mark a book as completed.
    Complete {
        /// Shelf entry ID.
        id: String,
    },

    /// Remove a book from the shelf.
    Remove {
        /// Shelf entry ID.
        id: String,
    },

    /// Show reading statistics.
    Stats,
}

/// Posting subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum PostCommand {
    /// Write a posting about a shelf book.
    Write {
        /// Shelf entry ID of the book.
        book_id: String,
        /// Posting body.
        content: String,
        /// Title (defaults to "<book title> 독후감").
        #[arg(short, long)]
        title: Option<String>,
        /// Rating from 1 to 5.
        #[arg(short, long, default_value_t = 5)]
        rating: u8,
        /// Comma separated tags.
        #[arg(long, default_value = "")]
        tags: String,
    },

    /// Edit an existing posting; omitted fields keep their value.
    Edit {
        /// Posting ID.
        id: String,
        /// New body.
        #[arg(short, long)]
        content: Option<String>,
        /// New title.
        #[arg(short, long)]
        title: Option<String>,
        /// New rating.
        #[arg(short, long)]
        rating: Option<u8>,
        /// New comma separated tags.
        #[arg(long)]
        tags: Option<String>,
    },

    /// List postings.
    List {
        /// Only postings about this shelf entry.
        #[arg(short, long)]
        book_id: Option<String>,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// OAuth providers.
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Book catalog APIs.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Map SDK and geocoding.
    #[serde(default)]
    pub map: MapConfig,

    /// Command-line client.
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Site title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Public base URL of the front-end, used for OAuth redirect URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
            public_url: default_public_url(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        3000,
    )
}

fn default_title() -> String {
    "BookLens".to_string()
}

fn default_public_url() -> String {
    "http://localhost:5173".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/booklens.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,

    /// Minimum password length for signup.
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
            min_password_len: default_min_password_len(),
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    7
}

fn default_min_password_len() -> usize {
    6
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }
}

/// OAuth providers. A provider without credentials is disabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Google sign-in.
    #[serde(default)]
    pub google: Option<OAuthClientConfig>,

    /// Naver sign-in.
    #[serde(default)]
    pub naver: Option<OAuthClientConfig>,
}

/// Credentials of one OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    /// Client ID issued by the provider.
    pub client_id: String,
    /// Client secret issued by the provider.
    pub client_secret: String,
}

/// Book catalog API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Google Books API key.
    #[serde(default)]
    pub google_books_api_key: Option<String>,

    /// Google Books volumes endpoint.
    #[serde(default = "default_google_books_url")]
    pub google_books_url: String,

    /// data4library API key.
    #[serde(default)]
    pub data4library_api_key: Option<String>,

    /// data4library `libSrchByBook` endpoint.
    #[serde(default = "default_data4library_url")]
    pub data4library_url: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            google_books_api_key: None,
            google_books_url: default_google_books_url(),
            data4library_api_key: None,
            data4library_url: default_data4library_url(),
        }
    }
}

fn default_google_books_url() -> String {
    "https://www.googleapis.com/books/v1/volumes".to_string()
}

fn default_data4library_url() -> String {
    "http://data4library.kr/api/libSrchByBook".to_string()
}

/// Map configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    /// JavaScript key for the Kakao Maps SDK.
    #[serde(default)]
    pub kakao_app_key: Option<String>,

    /// REST key for the Kakao Local (geocoding) API.
    #[serde(default)]
    pub kakao_rest_key: Option<String>,
}

/// Command-line client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Session storage file (`user`, `token`).
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,

    /// Local storage file (`myLibraryBooks`, `bookPostings`).
    #[serde(default = "default_local_file")]
    pub local_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            session_file: default_session_file(),
            local_file: default_local_file(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_session_file() -> PathBuf {
    dirs::cache_dir()
        .map(|p| p.join("booklens").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("data/session.json"))
}

fn default_local_file() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("booklens").join("local.json"))
        .unwrap_or_else(|| PathBuf::from("data/local.json"))
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("booklens.toml"),
            dirs::config_dir()
                .map(|p| p.join("booklens").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/booklens/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Let API keys and the backend URL come from the environment.
    pub fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(key) = var("GOOGLE_BOOKS_API_KEY") {
            self.catalog.google_books_api_key = Some(key);
        }
        if let Some(key) = var("DATA4LIBRARY_API_KEY") {
            self.catalog.data4library_api_key = Some(key);
        }
        if let Some(key) = var("KAKAO_APP_KEY") {
            self.map.kakao_app_key = Some(key);
        }
        if let Some(key) = var("KAKAO_REST_API_KEY") {
            self.map.kakao_rest_key = Some(key);
        }
        if let Some(url) = var("BOOKLENS_API_BASE_URL") {
            self.client.api_base_url = url;
        }
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# booklens configuration

[server]
bind = "0.0.0.0:3000"
title = "BookLens"
# Front-end origin; OAuth redirects go to <public_url>/auth/<provider>/callback
public_url = "http://localhost:5173"

[database]
# path = "/var/lib/booklens/booklens.db"

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session duration in days
session_days = 7
min_password_len = 6

# [oauth.google]
# client_id = "..."
# client_secret = "..."

# [oauth.naver]
# client_id = "..."
# client_secret = "..."

[catalog]
# Also read from GOOGLE_BOOKS_API_KEY / DATA4LIBRARY_API_KEY
# google_books_api_key = "..."
# data4library_api_key = "..."

[map]
# Also read from KAKAO_APP_KEY / KAKAO_REST_API_KEY
# kakao_app_key = "..."
# kakao_rest_key = "..."

[client]
api_base_url = "http://localhost:3000/api"
# session_file = "/tmp/booklens-session.json"
# local_file = "~/.local/share/booklens/local.json"
"#
        .to_string()
    }
}
