use crate::db::*;
use crate::error::{AppError, Result};
use crate::library::{Comment, LikeState, Posting, ReadingStatus, ShelfEntry};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, email, name, password_hash, provider, created_at, last_login";

const SHELF_COLUMNS: &str = "id, title, author, genre, thumbnail, status, progress, total_pages,
     is_rental, return_date, memo, created_at, updated_at, completed_at";

const POSTING_COLUMNS: &str = "p.id, p.author_id, p.author_name, p.book_id, p.book_title,
     p.book_author, p.book_thumbnail, p.title, p.content, p.rating, p.tags_json,
     (SELECT COUNT(*) FROM posting_likes l WHERE l.posting_id = p.id),
     (SELECT COUNT(*) FROM comments c WHERE c.posting_id = p.id),
     p.created_at, p.updated_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL DEFAULT '',
                provider TEXT NOT NULL DEFAULT 'local',
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Pending OAuth authorizations
            CREATE TABLE IF NOT EXISTS oauth_states (
                state TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                pkce_verifier TEXT,
                created_at INTEGER NOT NULL
            );

            -- Shelf entries
            CREATE TABLE IF NOT EXISTS shelf_entries (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                genre TEXT NOT NULL DEFAULT '',
                thumbnail TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'reading',
                progress INTEGER NOT NULL DEFAULT 0,
                total_pages INTEGER,
                is_rental INTEGER NOT NULL DEFAULT 0,
                return_date TEXT,
                memo TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                completed_at INTEGER,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Reading sessions
            CREATE TABLE IF NOT EXISTS reading_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                pages_read INTEGER,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (book_id) REFERENCES shelf_entries(id) ON DELETE CASCADE
            );

            -- Postings table
            CREATE TABLE IF NOT EXISTS postings (
                id TEXT PRIMARY KEY,
                author_id TEXT,
                author_name TEXT NOT NULL,
                book_id TEXT NOT NULL,
                book_title TEXT NOT NULL,
                book_author TEXT NOT NULL DEFAULT '',
                book_thumbnail TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                rating INTEGER NOT NULL,
                tags_json TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Likes table
            CREATE TABLE IF NOT EXISTS posting_likes (
                posting_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (posting_id, user_id),
                FOREIGN KEY (posting_id) REFERENCES postings(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Comments table
            CREATE TABLE IF NOT EXISTS comments (
                id TEXT PRIMARY KEY,
                posting_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                author_name TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (posting_id) REFERENCES postings(id) ON DELETE CASCADE,
                FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            CREATE INDEX IF NOT EXISTS idx_shelf_user ON shelf_entries(user_id);
            CREATE INDEX IF NOT EXISTS idx_reading_sessions_user ON reading_sessions(user_id, ended_at);
            CREATE INDEX IF NOT EXISTS idx_postings_book ON postings(book_id);
            CREATE INDEX IF NOT EXISTS idx_postings_author ON postings(author_id);
            CREATE INDEX IF NOT EXISTS idx_comments_posting ON comments(posting_id);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, name, password_hash, provider, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id,
                user.email,
                user.name,
                user.password_hash,
                user.provider,
                user.created_at.timestamp(),
                user.last_login.map(|t| t.timestamp()),
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Conflict(format!("Email '{}' is already registered", user.email))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            password_hash: row.get(3)?,
            provider: row.get(4)?,
            created_at: timestamp_to_datetime(row.get(5)?),
            last_login: row.get::<_, Option<i64>>(6)?.map(timestamp_to_datetime),
        })
    }

    /// Get user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
            params![email],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| AppError::Internal(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Update user password.
    pub fn update_user_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE email = ?2",
                params![password_hash, email],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update password: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user display name.
    pub fn update_user_name(&self, user_id: &str, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET name = ?1 WHERE id = ?2",
                params![name, user_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update name: {}", e)))?;
        Ok(rows > 0)
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete user.
    pub fn delete_user(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE email = ?1", params![email])
            .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== OAUTH STATE OPERATIONS ==========

    /// Remember a pending OAuth authorization.
    pub fn save_oauth_state(&self, state: &OAuthState) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO oauth_states (state, provider, pkce_verifier, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                state.state,
                state.provider,
                state.pkce_verifier,
                state.created_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save OAuth state: {}", e)))?;
        Ok(())
    }

    /// Fetch and delete a pending OAuth authorization. Each state is usable once.
    pub fn take_oauth_state(&self, state: &str) -> Result<Option<OAuthState>> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT state, provider, pkce_verifier, created_at FROM oauth_states WHERE state = ?1",
                params![state],
                |row| {
                    Ok(OAuthState {
                        state: row.get(0)?,
                        provider: row.get(1)?,
                        pkce_verifier: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get OAuth state: {}", e)))?;

        if found.is_some() {
            conn.execute("DELETE FROM oauth_states WHERE state = ?1", params![state])
                .map_err(|e| AppError::Internal(format!("Failed to delete OAuth state: {}", e)))?;
        }
        Ok(found)
    }

    /// Drop OAuth states created before `cutoff`.
    pub fn cleanup_oauth_states(&self, cutoff: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM oauth_states WHERE created_at < ?1",
                params![cutoff],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup OAuth states: {}", e)))?;
        Ok(rows)
    }

    // ========== SHELF OPERATIONS ==========

    /// Add a book to a user's shelf.
    pub fn insert_shelf_entry(&self, user_id: &str, entry: &ShelfEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO shelf_entries
             (id, user_id, title, author, genre, thumbnail, status, progress, total_pages,
              is_rental, return_date, memo, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.id,
                user_id,
                entry.title,
                entry.author,
                entry.genre,
                entry.thumbnail,
                entry.status.as_str(),
                entry.progress,
                entry.total_pages,
                entry.is_rental,
                entry.return_date.map(|d| d.to_string()),
                entry.memo,
                entry.created_at.timestamp(),
                entry.updated_at.timestamp(),
                entry.completed_at.map(|t| t.timestamp()),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to add book: {}", e)))?;
        Ok(())
    }

    fn row_to_shelf_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShelfEntry> {
        let status: String = row.get(5)?;
        let return_date: Option<String> = row.get(9)?;

        Ok(ShelfEntry {
            id: row.get(0)?,
            title: row.get(1)?,
            author: row.get(2)?,
            genre: row.get(3)?,
            thumbnail: row.get(4)?,
            status: ReadingStatus::parse(&status),
            progress: row.get(6)?,
            total_pages: row.get(7)?,
            is_rental: row.get(8)?,
            return_date: return_date.and_then(|d| d.parse::<NaiveDate>().ok()),
            memo: row.get(10)?,
            created_at: timestamp_to_datetime(row.get(11)?),
            updated_at: timestamp_to_datetime(row.get(12)?),
            completed_at: row.get::<_, Option<i64>>(13)?.map(timestamp_to_datetime),
        })
    }

    /// Get one shelf entry owned by `user_id`.
    pub fn get_shelf_entry(&self, user_id: &str, id: &str) -> Result<Option<ShelfEntry>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM shelf_entries WHERE id = ?1 AND user_id = ?2",
                SHELF_COLUMNS
            ),
            params![id, user_id],
            Self::row_to_shelf_entry,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// List a user's shelf, most recently added first.
    pub fn list_shelf_entries(&self, user_id: &str) -> Result<Vec<ShelfEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM shelf_entries WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
                SHELF_COLUMNS
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let entries = stmt
            .query_map(params![user_id], Self::row_to_shelf_entry)
            .map_err(|e| AppError::Internal(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(entries)
    }

    /// Overwrite a shelf entry. Returns false if the user has no such entry.
    pub fn update_shelf_entry(&self, user_id: &str, entry: &ShelfEntry) -> Result<bool> {
        let conn = self.conn.lock();
        Self::write_shelf_entry(&conn, user_id, entry)
    }

    fn write_shelf_entry(conn: &Connection, user_id: &str, entry: &ShelfEntry) -> Result<bool> {
        let rows = conn
            .execute(
                "UPDATE shelf_entries SET
                    title = ?1, author = ?2, genre = ?3, thumbnail = ?4, status = ?5,
                    progress = ?6, total_pages = ?7, is_rental = ?8, return_date = ?9,
                    memo = ?10, updated_at = ?11, completed_at = ?12
                 WHERE id = ?13 AND user_id = ?14",
                params![
                    entry.title,
                    entry.author,
                    entry.genre,
                    entry.thumbnail,
                    entry.status.as_str(),
                    entry.progress,
                    entry.total_pages,
                    entry.is_rental,
                    entry.return_date.map(|d| d.to_string()),
                    entry.memo,
                    entry.updated_at.timestamp(),
                    entry.completed_at.map(|t| t.timestamp()),
                    entry.id,
                    user_id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Remove a book from a user's shelf.
    pub fn delete_shelf_entry(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM shelf_entries WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== READING SESSION OPERATIONS ==========

    /// Record a new reading session. Fails with `Conflict` while the user
    /// already has one running.
    pub fn create_reading_session(&self, session: &ReadingSession) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let active: Option<String> = tx
            .query_row(
                "SELECT id FROM reading_sessions WHERE user_id = ?1 AND ended_at IS NULL LIMIT 1",
                params![session.user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::Internal(format!("Failed to get active session: {}", e)))?;
        if let Some(active) = active {
            return Err(AppError::Conflict(format!(
                "A reading session is already active ({})",
                active
            )));
        }

        tx.execute(
            "INSERT INTO reading_sessions (id, user_id, book_id, started_at, ended_at, pages_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.user_id,
                session.book_id,
                session.started_at.timestamp(),
                session.ended_at.map(|t| t.timestamp()),
                session.pages_read,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to start reading session: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit reading session: {}", e)))
    }

    fn row_to_reading_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingSession> {
        Ok(ReadingSession {
            id: row.get(0)?,
            user_id: row.get(1)?,
            book_id: row.get(2)?,
            started_at: timestamp_to_datetime(row.get(3)?),
            ended_at: row.get::<_, Option<i64>>(4)?.map(timestamp_to_datetime),
            pages_read: row.get(5)?,
        })
    }

    /// Get a reading session owned by `user_id`.
    pub fn get_reading_session(&self, user_id: &str, id: &str) -> Result<Option<ReadingSession>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, book_id, started_at, ended_at, pages_read
             FROM reading_sessions WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
            Self::row_to_reading_session,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get reading session: {}", e)))
    }

    /// The user's running session, if any.
    pub fn get_active_reading_session(&self, user_id: &str) -> Result<Option<ReadingSession>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, user_id, book_id, started_at, ended_at, pages_read
             FROM reading_sessions WHERE user_id = ?1 AND ended_at IS NULL
             ORDER BY started_at DESC LIMIT 1",
            params![user_id],
            Self::row_to_reading_session,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get active session: {}", e)))
    }

    /// List a user's sessions, newest first, optionally for one book.
    pub fn list_reading_sessions(
        &self,
        user_id: &str,
        book_id: Option<&str>,
    ) -> Result<Vec<ReadingSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, book_id, started_at, ended_at, pages_read
                 FROM reading_sessions
                 WHERE user_id = ?1 AND (?2 IS NULL OR book_id = ?2)
                 ORDER BY started_at DESC, rowid DESC",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let sessions = stmt
            .query_map(params![user_id, book_id], Self::row_to_reading_session)
            .map_err(|e| AppError::Internal(format!("Failed to list reading sessions: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                AppError::Internal(format!("Failed to collect reading sessions: {}", e))
            })?;

        Ok(sessions)
    }

    /// Close a running session and store the book's new progress together.
    /// Returns false, writing nothing, if the session was not running.
    pub fn end_reading_session(&self, session: &ReadingSession, book: &ShelfEntry) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

        let rows = tx
            .execute(
                "UPDATE reading_sessions SET ended_at = ?1, pages_read = ?2
                 WHERE id = ?3 AND user_id = ?4 AND ended_at IS NULL",
                params![
                    session.ended_at.map(|t| t.timestamp()),
                    session.pages_read,
                    session.id,
                    session.user_id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to end reading session: {}", e)))?;
        if rows == 0 {
            return Ok(false);
        }

        if !Self::write_shelf_entry(&tx, &session.user_id, book)? {
            return Err(AppError::NotFound(format!("Book not found: {}", book.id)));
        }

        tx.commit()
            .map_err(|e| AppError::Internal(format!("Failed to commit reading session: {}", e)))?;
        Ok(true)
    }

    // ========== POSTING OPERATIONS ==========

    /// Store a new posting.
    pub fn insert_posting(&self, posting: &Posting) -> Result<()> {
        let tags_json = serde_json::to_string(&posting.tags)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO postings
             (id, author_id, author_name, book_id, book_title, book_author, book_thumbnail,
              title, content, rating, tags_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                posting.id,
                posting.author_id,
                posting.author_name,
                posting.book_id,
                posting.book_title,
                posting.book_author,
                posting.book_thumbnail,
                posting.title,
                posting.content,
                posting.rating,
                tags_json,
                posting.created_at.timestamp(),
                posting.updated_at.timestamp(),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create posting: {}", e)))?;
        Ok(())
    }

    fn row_to_posting(row: &rusqlite::Row<'_>) -> rusqlite::Result<Posting> {
        let tags_json: String = row.get(10)?;

        Ok(Posting {
            id: row.get(0)?,
            author_id: row.get(1)?,
            author_name: row.get(2)?,
            book_id: row.get(3)?,
            book_title: row.get(4)?,
            book_author: row.get(5)?,
            book_thumbnail: row.get(6)?,
            title: row.get(7)?,
            content: row.get(8)?,
            rating: row.get(9)?,
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            like_count: row.get(11)?,
            comment_count: row.get(12)?,
            created_at: timestamp_to_datetime(row.get(13)?),
            updated_at: timestamp_to_datetime(row.get(14)?),
        })
    }

    /// Get a posting by ID.
    pub fn get_posting(&self, id: &str) -> Result<Option<Posting>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM postings p WHERE p.id = ?1", POSTING_COLUMNS),
            params![id],
            Self::row_to_posting,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get posting: {}", e)))
    }

    /// List postings, newest first.
    pub fn list_postings(&self, filter: &PostingFilter) -> Result<Vec<Posting>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM postings p
                 WHERE (?1 IS NULL OR p.book_id = ?1) AND (?2 IS NULL OR p.author_id = ?2)
                 ORDER BY p.created_at DESC, p.rowid DESC",
                POSTING_COLUMNS
            ))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let postings = stmt
            .query_map(
                params![filter.book_id, filter.author_id],
                Self::row_to_posting,
            )
            .map_err(|e| AppError::Internal(format!("Failed to list postings: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect postings: {}", e)))?;

        Ok(postings)
    }

    /// Overwrite the editable fields of a posting.
    pub fn update_posting(&self, posting: &Posting) -> Result<bool> {
        let tags_json = serde_json::to_string(&posting.tags)?;
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE postings SET title = ?1, content = ?2, rating = ?3, tags_json = ?4,
                    updated_at = ?5
                 WHERE id = ?6",
                params![
                    posting.title,
                    posting.content,
                    posting.rating,
                    tags_json,
                    posting.updated_at.timestamp(),
                    posting.id,
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to update posting: {}", e)))?;
        Ok(rows > 0)
    }

    /// Delete a posting with its likes and comments.
    pub fn delete_posting(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM postings WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete posting: {}", e)))?;
        Ok(rows > 0)
    }

    // ========== LIKE OPERATIONS ==========

    /// Like or unlike a posting on behalf of `user_id`.
    pub fn toggle_like(&self, posting_id: &str, user_id: &str) -> Result<LikeState> {
        let conn = self.conn.lock();
        let removed = conn
            .execute(
                "DELETE FROM posting_likes WHERE posting_id = ?1 AND user_id = ?2",
                params![posting_id, user_id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to toggle like: {}", e)))?;

        if removed == 0 {
            conn.execute(
                "INSERT INTO posting_likes (posting_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![posting_id, user_id, now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to toggle like: {}", e)))?;
        }

        let like_count: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM posting_likes WHERE posting_id = ?1",
                params![posting_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to count likes: {}", e)))?;

        Ok(LikeState {
            liked: removed == 0,
            like_count,
        })
    }

    /// Whether `user_id` likes the posting.
    pub fn has_liked(&self, posting_id: &str, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM posting_likes WHERE posting_id = ?1 AND user_id = ?2",
                params![posting_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| AppError::Internal(format!("Failed to get like: {}", e)))?;
        Ok(count > 0)
    }

    // ========== COMMENT OPERATIONS ==========

    /// Store a comment.
    pub fn insert_comment(&self, comment: &Comment) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO comments (id, posting_id, author_id, author_name, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                comment.id,
                comment.posting_id,
                comment.author_id,
                comment.author_name,
                comment.content,
                comment.created_at.timestamp(),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to add comment: {}", e)))?;
        Ok(())
    }

    fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get(0)?,
            posting_id: row.get(1)?,
            author_id: row.get(2)?,
            author_name: row.get(3)?,
            content: row.get(4)?,
            created_at: timestamp_to_datetime(row.get(5)?),
        })
    }

    /// Get a comment by ID.
    pub fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, posting_id, author_id, author_name, content, created_at
             FROM comments WHERE id = ?1",
            params![id],
            Self::row_to_comment,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get comment: {}", e)))
    }

    /// Comments on a posting, oldest first.
    pub fn list_comments(&self, posting_id: &str) -> Result<Vec<Comment>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, posting_id, author_id, author_name, content, created_at
                 FROM comments WHERE posting_id = ?1
                 ORDER BY created_at, rowid",
            )
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let comments = stmt
            .query_map(params![posting_id], Self::row_to_comment)
            .map_err(|e| AppError::Internal(format!("Failed to list comments: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect comments: {}", e)))?;

        Ok(comments)
    }

    /// Delete a comment.
    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM comments WHERE id = ?1", params![id])
            .map_err(|e| AppError::Internal(format!("Failed to delete comment: {}", e)))?;
        Ok(rows > 0)
    }
}
