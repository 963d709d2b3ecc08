use crate::auth::AuthService;
use crate::client::{ApiClient, AuthBackend};
use crate::config::Config;
use crate::db::{
    Database, OAuthState, PostingFilter, ReadingSession, Session, User, now_timestamp,
};
use crate::error::AppError;
use crate::library::{
    Comment, NewPosting, NewShelfEntry, PostingDraft, ReadingStatus, ShelfEntry,
};
use crate::server::{AppState, create_router};
use chrono::{Duration, Utc};

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn create_user(db: &Database, id: &str, email: &str) {
    let user = User {
        id: id.to_string(),
        email: email.to_string(),
        name: "Reader".to_string(),
        password_hash: "hash".to_string(),
        provider: "local".to_string(),
        created_at: Utc::now(),
        last_login: None,
    };
    db.create_user(&user).unwrap();
}

fn create_book(db: &Database, user_id: &str, title: &str) -> ShelfEntry {
    let entry = NewShelfEntry {
        title: title.to_string(),
        author: "한강".to_string(),
        total_pages: Some(200),
        ..Default::default()
    }
    .into_entry()
    .unwrap();
    db.insert_shelf_entry(user_id, &entry).unwrap();
    entry
}

fn auth_service(db: Database) -> AuthService {
    AuthService::new(db, 30, true, 6)
}

// ========== USERS & SESSIONS ==========

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let found = db.get_user_by_email("alice@example.com").unwrap().unwrap();
    assert_eq!(found.id, "user-1");
    assert_eq!(found.provider, "local");

    let by_id = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(by_id.email, "alice@example.com");
}

#[test]
fn db_duplicate_email_conflicts() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let dup = User {
        id: "user-2".to_string(),
        email: "alice@example.com".to_string(),
        name: "Other".to_string(),
        password_hash: String::new(),
        provider: "local".to_string(),
        created_at: Utc::now(),
        last_login: None,
    };
    assert!(matches!(db.create_user(&dup), Err(AppError::Conflict(_))));
}

#[test]
fn db_delete_user_cascades() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let book = create_book(&db, "user-1", "소년이 온다");

    assert!(db.delete_user("alice@example.com").unwrap());
    assert!(db.get_user_by_id("user-1").unwrap().is_none());
    assert!(db.get_shelf_entry("user-1", &book.id).unwrap().is_none());
    assert!(!db.delete_user("alice@example.com").unwrap());
}

#[test]
fn db_expired_sessions_cleanup() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let expired = Session {
        token: "expired".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 3600,
    };
    let valid = Session {
        token: "valid".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    };

    db.create_session(&expired).unwrap();
    db.create_session(&valid).unwrap();

    assert_eq!(db.cleanup_expired_sessions().unwrap(), 1);

    assert!(db.get_session("expired").unwrap().is_none());
    assert!(db.get_session("valid").unwrap().is_some());
}

#[test]
fn db_oauth_state_is_single_use() {
    let db = test_db();
    db.save_oauth_state(&OAuthState {
        state: "csrf".to_string(),
        provider: "google".to_string(),
        pkce_verifier: Some("verifier".to_string()),
        created_at: now_timestamp(),
    })
    .unwrap();

    let taken = db.take_oauth_state("csrf").unwrap().unwrap();
    assert_eq!(taken.provider, "google");
    assert_eq!(taken.pkce_verifier.as_deref(), Some("verifier"));
    assert!(db.take_oauth_state("csrf").unwrap().is_none());
}

#[test]
fn db_oauth_state_cleanup() {
    let db = test_db();
    db.save_oauth_state(&OAuthState {
        state: "old".to_string(),
        provider: "naver".to_string(),
        pkce_verifier: None,
        created_at: now_timestamp() - 3600,
    })
    .unwrap();

    assert_eq!(db.cleanup_oauth_states(now_timestamp() - 600).unwrap(), 1);
    assert!(db.take_oauth_state("old").unwrap().is_none());
}

// ========== AUTH ==========

#[test]
fn auth_signup_and_login() {
    let auth = auth_service(test_db());

    let (user, token) = auth
        .signup("Alice@Example.com", "password", "Alice")
        .unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert!(!token.is_empty());

    let (again, token2) = auth.login("alice@example.com", "password").unwrap();
    assert_eq!(again.id, user.id);
    assert_ne!(token, token2);
}

#[test]
fn auth_signup_defaults_name_to_email_local_part() {
    let auth = auth_service(test_db());
    let (user, _) = auth.signup("reader@example.com", "password", "  ").unwrap();
    assert_eq!(user.name, "reader");
}

#[test]
fn auth_login_failure_is_unauthorized() {
    let auth = auth_service(test_db());
    auth.create_user("alice@example.com", "password", "Alice")
        .unwrap();

    let wrong = auth.login("alice@example.com", "nope-nope").unwrap_err();
    let missing = auth.login("bob@example.com", "password").unwrap_err();
    assert!(wrong.is_unauthorized());
    assert_eq!(wrong.to_string(), missing.to_string());
}

#[test]
fn auth_duplicate_signup_conflicts() {
    let auth = auth_service(test_db());
    auth.signup("alice@example.com", "password", "Alice").unwrap();

    let err = auth
        .signup("alice@example.com", "password", "Alice")
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn auth_validate_token_and_logout() {
    let auth = auth_service(test_db());
    let (user, token) = auth.signup("alice@example.com", "password", "Alice").unwrap();

    let validated = auth.validate_token(&token).unwrap().unwrap();
    assert_eq!(validated.id, user.id);
    assert!(validated.last_login.is_some());

    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());
    assert!(auth.validate_token("garbage").unwrap().is_none());
}

#[test]
fn auth_expired_token_rejected() {
    let db = test_db();
    let auth = auth_service(db.clone());
    let user = auth
        .create_user("alice@example.com", "password", "Alice")
        .unwrap();

    db.create_session(&Session {
        token: "stale".to_string(),
        user_id: user.id,
        expires_at: now_timestamp() - 1,
    })
    .unwrap();

    assert!(auth.validate_token("stale").unwrap().is_none());
    assert!(db.get_session("stale").unwrap().is_none());
}

#[test]
fn auth_registration_disabled() {
    let auth = AuthService::new(test_db(), 30, false, 6);
    let err = auth
        .signup("alice@example.com", "password", "Alice")
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // The admin CLI can still create accounts
    assert!(auth.create_user("alice@example.com", "password", "Alice").is_ok());
}

#[test]
fn auth_input_validation() {
    let auth = auth_service(test_db());
    assert!(matches!(
        auth.create_user("not-an-email", "password", "A"),
        Err(AppError::InvalidInput(_))
    ));
    assert!(matches!(
        auth.create_user("alice@example.com", "short", "A"),
        Err(AppError::InvalidInput(_))
    ));
}

#[test]
fn auth_change_password() {
    let auth = auth_service(test_db());
    auth.create_user("alice@example.com", "password", "Alice")
        .unwrap();

    assert!(auth.change_password("alice@example.com", "newpassword").unwrap());
    assert!(auth.login("alice@example.com", "password").is_err());
    assert!(auth.login("alice@example.com", "newpassword").is_ok());
    assert!(!auth.change_password("bob@example.com", "newpassword").unwrap());
}

#[test]
fn auth_update_profile() {
    let auth = auth_service(test_db());
    let user = auth
        .create_user("alice@example.com", "password", "Alice")
        .unwrap();

    let updated = auth.update_profile(&user.id, "앨리스").unwrap();
    assert_eq!(updated.name, "앨리스");
    assert!(auth.update_profile(&user.id, "").is_err());
}

#[test]
fn auth_oauth_user_is_reused() {
    let auth = auth_service(test_db());

    let (first, _) = auth
        .upsert_oauth_user("naver", "reader@naver.com", "독자")
        .unwrap();
    assert_eq!(first.provider, "naver");
    assert!(first.password_hash.is_empty());

    let (second, _) = auth
        .upsert_oauth_user("naver", "Reader@naver.com", "")
        .unwrap();
    assert_eq!(first.id, second.id);

    // OAuth accounts have no password to log in with
    assert!(auth.login("reader@naver.com", "").is_err());
}

// ========== SHELF ==========

#[test]
fn db_shelf_is_per_user() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");

    let book = create_book(&db, "user-1", "채식주의자");
    create_book(&db, "user-2", "작별하지 않는다");

    assert_eq!(db.list_shelf_entries("user-1").unwrap().len(), 1);
    assert!(db.get_shelf_entry("user-2", &book.id).unwrap().is_none());
    assert!(!db.delete_shelf_entry("user-2", &book.id).unwrap());
}

#[test]
fn db_shelf_update_roundtrips_fields() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let mut book = create_book(&db, "user-1", "채식주의자");

    book.set_progress(42);
    book.set_memo("2부까지");
    book.is_rental = true;
    book.return_date = chrono::NaiveDate::from_ymd_opt(2026, 11, 1);
    assert!(db.update_shelf_entry("user-1", &book).unwrap());

    let stored = db.get_shelf_entry("user-1", &book.id).unwrap().unwrap();
    assert_eq!(stored.progress, 42);
    assert_eq!(stored.memo, "2부까지");
    assert_eq!(stored.return_date, book.return_date);
    assert_eq!(stored.total_pages, Some(200));

    book.mark_completed();
    db.update_shelf_entry("user-1", &book).unwrap();
    let stored = db.get_shelf_entry("user-1", &book.id).unwrap().unwrap();
    assert_eq!(stored.status, ReadingStatus::Completed);
    assert!(stored.completed_at.is_some());
}

// ========== READING SESSIONS ==========

#[test]
fn db_reading_session_lifecycle() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let mut book = create_book(&db, "user-1", "소년이 온다");

    let mut session = ReadingSession {
        id: "rs-1".to_string(),
        user_id: "user-1".to_string(),
        book_id: book.id.clone(),
        started_at: Utc::now() - Duration::minutes(30),
        ended_at: None,
        pages_read: None,
    };
    db.create_reading_session(&session).unwrap();

    let active = db.get_active_reading_session("user-1").unwrap().unwrap();
    assert_eq!(active.id, "rs-1");
    assert!(active.is_active());

    session.ended_at = Some(Utc::now());
    session.pages_read = Some(25);
    book.record_pages_read(25).unwrap();
    assert!(db.end_reading_session(&session, &book).unwrap());
    assert!(!db.end_reading_session(&session, &book).unwrap());

    assert!(db.get_active_reading_session("user-1").unwrap().is_none());
    let ended = db.get_reading_session("user-1", "rs-1").unwrap().unwrap();
    assert_eq!(ended.pages_read, Some(25));
    assert!(ended.duration_seconds() >= 30 * 60);

    assert_eq!(
        db.list_reading_sessions("user-1", Some(book.id.as_str()))
            .unwrap()
            .len(),
        1
    );
    assert!(
        db.list_reading_sessions("user-1", Some("other"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn db_second_active_reading_session_conflicts() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");
    let book = create_book(&db, "user-1", "소년이 온다");
    let other = create_book(&db, "user-2", "채식주의자");

    let session = |id: &str, user_id: &str, book_id: &str| ReadingSession {
        id: id.to_string(),
        user_id: user_id.to_string(),
        book_id: book_id.to_string(),
        started_at: Utc::now(),
        ended_at: None,
        pages_read: None,
    };

    db.create_reading_session(&session("rs-1", "user-1", &book.id))
        .unwrap();
    let err = db
        .create_reading_session(&session("rs-2", "user-1", &book.id))
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(db.get_reading_session("user-1", "rs-2").unwrap().is_none());

    // Other users are unaffected
    db.create_reading_session(&session("rs-3", "user-2", &other.id))
        .unwrap();
}

#[test]
fn db_end_reading_session_is_atomic() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let book = create_book(&db, "user-1", "소년이 온다");

    let mut session = ReadingSession {
        id: "rs-1".to_string(),
        user_id: "user-1".to_string(),
        book_id: book.id.clone(),
        started_at: Utc::now(),
        ended_at: None,
        pages_read: None,
    };
    db.create_reading_session(&session).unwrap();

    // A book row that no longer exists makes the progress write fail
    let mut gone = book.clone();
    gone.id = "missing".to_string();
    gone.record_pages_read(100).unwrap();

    session.ended_at = Some(Utc::now());
    session.pages_read = Some(100);
    let err = db.end_reading_session(&session, &gone).unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Nothing was written: the session is still running
    let still = db.get_active_reading_session("user-1").unwrap().unwrap();
    assert_eq!(still.id, "rs-1");
    assert!(still.pages_read.is_none());
}

#[test]
fn reading_session_pages_advance_progress() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let mut book = create_book(&db, "user-1", "소년이 온다");

    book.record_pages_read(50).unwrap();
    db.update_shelf_entry("user-1", &book).unwrap();

    let stored = db.get_shelf_entry("user-1", &book.id).unwrap().unwrap();
    assert_eq!(stored.progress, 25);
}

// ========== POSTINGS ==========

fn write_posting(db: &Database, book: &ShelfEntry, author: &str) -> crate::library::Posting {
    let posting = PostingDraft {
        content: "오래 남는 책".to_string(),
        tags: "소설, 한강".to_string(),
        ..Default::default()
    }
    .into_posting(book, Some(author.to_string()), "Reader")
    .unwrap();
    db.insert_posting(&posting).unwrap();
    posting
}

#[test]
fn db_posting_crud() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let book = create_book(&db, "user-1", "채식주의자");

    let mut posting = write_posting(&db, &book, "user-1");
    let stored = db.get_posting(&posting.id).unwrap().unwrap();
    assert_eq!(stored.title, "채식주의자 독후감");
    assert_eq!(stored.tags, vec!["소설", "한강"]);
    assert_eq!(stored.rating, 5);

    PostingDraft {
        title: "다시 읽기".to_string(),
        content: "두 번째".to_string(),
        rating: 4,
        tags: String::new(),
    }
    .apply_to(&mut posting)
    .unwrap();
    assert!(db.update_posting(&posting).unwrap());

    let stored = db.get_posting(&posting.id).unwrap().unwrap();
    assert_eq!(stored.title, "다시 읽기");
    assert_eq!(stored.rating, 4);
    assert!(stored.tags.is_empty());

    assert!(db.delete_posting(&posting.id).unwrap());
    assert!(db.get_posting(&posting.id).unwrap().is_none());
}

#[test]
fn db_list_postings_filters() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");
    let a = create_book(&db, "user-1", "채식주의자");
    let b = create_book(&db, "user-2", "소년이 온다");

    write_posting(&db, &a, "user-1");
    write_posting(&db, &b, "user-2");
    write_posting(&db, &b, "user-2");

    assert_eq!(db.list_postings(&PostingFilter::default()).unwrap().len(), 3);

    let about_b = PostingFilter {
        book_id: Some(b.id.clone()),
        author_id: None,
    };
    assert_eq!(db.list_postings(&about_b).unwrap().len(), 2);

    let by_alice = PostingFilter {
        book_id: None,
        author_id: Some("user-1".to_string()),
    };
    let mine = db.list_postings(&by_alice).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].book_id, a.id);
}

#[test]
fn db_toggle_like_counts() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");
    let book = create_book(&db, "user-1", "채식주의자");
    let posting = write_posting(&db, &book, "user-1");

    let first = db.toggle_like(&posting.id, "user-2").unwrap();
    assert!(first.liked);
    assert_eq!(first.like_count, 1);
    assert!(db.has_liked(&posting.id, "user-2").unwrap());

    db.toggle_like(&posting.id, "user-1").unwrap();
    assert_eq!(db.get_posting(&posting.id).unwrap().unwrap().like_count, 2);

    let undo = db.toggle_like(&posting.id, "user-2").unwrap();
    assert!(!undo.liked);
    assert_eq!(undo.like_count, 1);
    assert!(!db.has_liked(&posting.id, "user-2").unwrap());
}

#[test]
fn db_comments_and_counts() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");
    let book = create_book(&db, "user-1", "채식주의자");
    let posting = write_posting(&db, &book, "user-1");

    let first = Comment::new(&posting.id, "user-2", "Bob", "공감해요").unwrap();
    let second = Comment::new(&posting.id, "user-1", "Alice", "고마워요").unwrap();
    db.insert_comment(&first).unwrap();
    db.insert_comment(&second).unwrap();

    let comments = db.list_comments(&posting.id).unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].content, "공감해요");
    assert_eq!(db.get_posting(&posting.id).unwrap().unwrap().comment_count, 2);

    assert!(db.delete_comment(&first.id).unwrap());
    assert!(db.get_comment(&first.id).unwrap().is_none());
    assert_eq!(db.get_posting(&posting.id).unwrap().unwrap().comment_count, 1);

    // Deleting the posting drops its comments
    db.delete_posting(&posting.id).unwrap();
    assert!(db.get_comment(&second.id).unwrap().is_none());
}

// ========== CONFIG ==========

#[test]
fn config_parse_toml() {
    let toml = r#"
[server]
bind = "127.0.0.1:9090"
title = "Test Shelf"

[database]
path = "/tmp/test.db"

[auth]
registration = "disabled"
session_days = 14

[oauth.google]
client_id = "id"
client_secret = "secret"

[catalog]
google_books_api_key = "key"
"#;
    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.server.bind.port(), 9090);
    assert_eq!(config.server.title, "Test Shelf");
    assert!(!config.auth.registration_enabled());
    assert_eq!(config.auth.session_days, 14);
    assert_eq!(config.auth.min_password_len, 6);
    assert_eq!(config.oauth.google.unwrap().client_id, "id");
    assert!(config.oauth.naver.is_none());
    assert_eq!(config.catalog.google_books_api_key.as_deref(), Some("key"));
    assert!(config.catalog.google_books_url.starts_with("https://"));
}

#[test]
fn config_default_values() {
    let config = Config::default();
    assert_eq!(config.server.bind.port(), 3000);
    assert!(config.auth.registration_enabled());
    assert_eq!(config.client.api_base_url, "http://localhost:3000/api");
    assert!(config.map.kakao_app_key.is_none());
}

#[test]
fn config_generated_default_parses() {
    let config: Config = toml::from_str(&Config::generate_default()).unwrap();
    assert_eq!(config.server.bind.port(), 3000);
    assert_eq!(config.auth.session_days, 7);
    assert!(config.oauth.google.is_none());
}

// ========== HTTP API ==========

/// Serve the router on an ephemeral port and return the API root.
async fn spawn_server() -> String {
    let db = test_db();
    let auth = auth_service(db.clone());
    let state = AppState::new_with_db(Config::default(), db, auth).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, create_router(state)).await });

    format!("http://{}/api", addr)
}

#[tokio::test]
async fn api_shelf_and_posting_round_trip() {
    let base = spawn_server().await;

    // Anonymous and unknown tokens are rejected
    let anonymous = ApiClient::new(base.clone());
    assert!(anonymous.books().await.unwrap_err().is_unauthorized());
    let forged = ApiClient::new(base.clone()).with_token(Some("forged".to_string()));
    assert!(forged.book_stats().await.unwrap_err().is_unauthorized());

    let mut alice = ApiClient::new(base.clone());
    let signed_up = alice
        .signup("alice@example.com", "password", "Alice")
        .await
        .unwrap();
    assert_eq!(signed_up.user.name, "Alice");
    alice.set_token(Some(signed_up.token.clone()));

    let dup = alice
        .signup("alice@example.com", "password", "Alice")
        .await
        .unwrap_err();
    assert!(matches!(dup, AppError::Conflict(_)));

    let book = alice
        .add_book(&NewShelfEntry {
            title: "소년이 온다".to_string(),
            author: "한강".to_string(),
            total_pages: Some(100),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(book.status, ReadingStatus::Reading);

    // One running session per user
    let session = alice.start_session(&book.id).await.unwrap();
    let second = alice.start_session(&book.id).await.unwrap_err();
    assert!(matches!(second, AppError::Conflict(_)));
    assert_eq!(
        alice.active_session().await.unwrap().map(|s| s.id),
        Some(session.id.clone())
    );

    let ended = alice.end_session(&session.id, 100).await.unwrap();
    assert_eq!(ended.pages_read, Some(100));
    let again = alice.end_session(&session.id, 100).await.unwrap_err();
    assert!(matches!(again, AppError::Conflict(_)));
    assert!(alice.active_session().await.unwrap().is_none());

    let finished = alice.book(&book.id).await.unwrap();
    assert_eq!(finished.status, ReadingStatus::Completed);
    assert_eq!(finished.progress, 100);
    let stats = alice.book_stats().await.unwrap();
    assert_eq!((stats.total_books, stats.completed), (1, 1));

    let posting = alice
        .create_posting(&NewPosting {
            book_id: book.id.clone(),
            draft: PostingDraft {
                content: "오래 남는 책".to_string(),
                rating: 4,
                tags: "a, b ,c".to_string(),
                ..Default::default()
            },
        })
        .await
        .unwrap();
    assert_eq!(posting.title, "소년이 온다 독후감");
    assert_eq!(posting.tags, vec!["a", "b", "c"]);
    assert_eq!(posting.author_name, "Alice");

    let like = alice.toggle_like(&posting.id).await.unwrap();
    assert!(like.liked);
    assert_eq!(like.like_count, 1);
    let comment = alice
        .create_comment(&posting.id, "다시 읽고 싶다")
        .await
        .unwrap();

    // Listings are public
    let listed = anonymous.postings(&PostingFilter::default()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!((listed[0].like_count, listed[0].comment_count), (1, 1));
    assert_eq!(anonymous.comments(&posting.id).await.unwrap().len(), 1);

    // Another reader may like but not edit or delete
    let bob_auth = anonymous
        .signup("bob@example.com", "password", "Bob")
        .await
        .unwrap();
    let bob = ApiClient::new(base.clone()).with_token(Some(bob_auth.token));
    assert_eq!(bob.toggle_like(&posting.id).await.unwrap().like_count, 2);

    let edit = bob
        .update_posting(&posting.id, &PostingDraft::from_posting(&posting))
        .await
        .unwrap_err();
    assert!(matches!(edit, AppError::Forbidden(_)));
    let delete = bob.delete_posting(&posting.id).await.unwrap_err();
    assert!(matches!(delete, AppError::Forbidden(_)));
    let uncomment = bob.delete_comment(&comment.id).await.unwrap_err();
    assert!(matches!(uncomment, AppError::Forbidden(_)));
    assert!(matches!(
        bob.book(&book.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    // The author can
    alice.delete_comment(&comment.id).await.unwrap();
    alice.delete_posting(&posting.id).await.unwrap();
    assert!(matches!(
        anonymous.posting(&posting.id).await.unwrap_err(),
        AppError::NotFound(_)
    ));

    // Logging out revokes the token
    let token = signed_up.token;
    assert_eq!(alice.current_user(&token).await.unwrap().email, "alice@example.com");
    alice.logout(&token).await.unwrap();
    assert!(alice.current_user(&token).await.unwrap_err().is_unauthorized());
    assert!(alice.books().await.unwrap_err().is_unauthorized());
}
