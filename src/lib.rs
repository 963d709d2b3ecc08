//! booklens: a personal reading tracker.
//!
//! This crate provides a REST backend and a typed client for keeping a
//! reading shelf, writing reviews ("postings") about shelf books, and
//! finding books in public catalogs and nearby libraries.
//!
//! # Features
//!
//! - Email/password accounts with bearer-token sessions
//! - Google and Naver sign-in (OAuth 2.0 authorization code flow)
//! - Reading shelf with progress, memos, rentals and reading sessions
//! - Postings with ratings, tags, likes and comments
//! - Google Books search, bestsellers, new releases and publisher shelves
//! - Library holdings lookup by ISBN (data4library)
//! - Map markers and address geocoding (Kakao)
//! - Client-side session and local-only library storage

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Book catalog APIs.
pub mod catalog;
/// Backend client, session and local storage.
pub mod client;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Shelf and posting models.
pub mod library;
/// Map markers and geocoding.
pub mod map;
/// Third-party sign-in.
pub mod oauth;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
