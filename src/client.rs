//! Client side of the backend API.
//!
//! The browser keeps the signed-in user and token in session storage and
//! draft shelf/posting data in local storage. Here both stores are JSON
//! files handled by [`Storage`].

/// HTTP client for the backend REST API.
pub mod api;
/// Locally stored shelf and postings.
pub mod local;
/// Signed-in user and bearer token.
pub mod session;
/// JSON file key/value store.
pub mod storage;

pub use api::{ApiClient, AuthResponse};
pub use local::LocalLibrary;
pub use session::{AuthBackend, AuthSession};
pub use storage::Storage;
