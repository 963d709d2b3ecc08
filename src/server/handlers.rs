//! HTTP request handlers.

use crate::auth::AuthResponse;
use crate::catalog::{HoldingLibrary, Volume};
use crate::db::{self, PostingFilter, ReadingSession};
use crate::error::{AppError, Result};
use crate::library::{
    Comment, LikeState, NewPosting, NewShelfEntry, Posting, PostingDraft, ShelfEntry, ShelfStats,
    ShelfUpdate,
};
use crate::map::{self, Coordinates, Location, LocationKind};
use crate::oauth::OAuthProvider;
use crate::server::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, Redirect},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Upper bound for catalog `count` parameters.
const MAX_CATALOG_COUNT: usize = 100;

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        a {{ color: #0066cc; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>REST API for the reading tracker is served under <code>/api</code>.</p>
    <h2>Links</h2>
    <ul>
        <li><a href="/api/locations">Map locations (JSON)</a></li>
        <li><a href="/api/catalog/bestsellers">Bestsellers (JSON)</a></li>
        <li><a href="/api/postings">Postings (JSON)</a></li>
    </ul>
</body>
</html>"#,
        title = state.config.server.title,
    );

    Html(html)
}

// ============================================================================
// AUTH API
// ============================================================================

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Signup request.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    email: String,
    password: String,
    #[serde(default)]
    name: String,
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, token) = state.auth.login(&req.email, &req.password)?;
    Ok(Json(AuthResponse { user, token }))
}

/// Auth signup.
pub async fn auth_signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let (user, token) = state.auth.signup(&req.email, &req.password, &req.name)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(user))
}

/// Profile update request.
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    name: String,
}

/// Update the display name.
pub async fn auth_update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<db::User>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(state.auth.update_profile(&user.id, &req.name)?))
}

fn parse_provider(provider: &str) -> Result<OAuthProvider> {
    OAuthProvider::parse(provider)
        .ok_or_else(|| AppError::NotFound(format!("Unknown sign-in provider: {}", provider)))
}

/// Redirect the browser to the provider's consent page.
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect> {
    let provider = parse_provider(&provider)?;
    let url = state.oauth.authorize_url(provider)?;
    Ok(Redirect::to(&url))
}

/// OAuth callback request.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    code: String,
    state: String,
}

/// Exchange the provider's code for a session.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<OAuthCallbackRequest>,
) -> Result<Json<AuthResponse>> {
    let provider = parse_provider(&provider)?;
    let profile = state.oauth.complete(provider, &req.code, &req.state).await?;
    let (user, token) =
        state
            .auth
            .upsert_oauth_user(provider.as_str(), &profile.email, &profile.name)?;
    Ok(Json(AuthResponse { user, token }))
}

// ============================================================================
// BOOKS API
// ============================================================================

fn find_book(state: &AppState, user_id: &str, id: &str) -> Result<ShelfEntry> {
    state
        .db
        .get_shelf_entry(user_id, id)?
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", id)))
}

/// List the user's shelf.
pub async fn books_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ShelfEntry>>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(state.db.list_shelf_entries(&user.id)?))
}

/// Add a book to the shelf.
pub async fn books_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<NewShelfEntry>,
) -> Result<(StatusCode, Json<ShelfEntry>)> {
    let user = get_authenticated_user(&state, &headers).await?;
    let entry = form.into_entry()?;
    state.db.insert_shelf_entry(&user.id, &entry)?;

    tracing::debug!(user_id = %user.id, book_id = %entry.id, "Book added");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Get one shelf entry.
pub async fn books_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ShelfEntry>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(find_book(&state, &user.id, &id)?))
}

/// Replace a shelf entry.
pub async fn books_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<ShelfUpdate>,
) -> Result<Json<ShelfEntry>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let mut entry = find_book(&state, &user.id, &id)?;
    entry.apply(update)?;
    state.db.update_shelf_entry(&user.id, &entry)?;
    Ok(Json(entry))
}

/// Mark a book completed.
pub async fn books_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ShelfEntry>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let mut entry = find_book(&state, &user.id, &id)?;
    entry.mark_completed();
    state.db.update_shelf_entry(&user.id, &entry)?;
    Ok(Json(entry))
}

/// Remove a book from the shelf.
pub async fn books_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers).await?;
    if state.db.delete_shelf_entry(&user.id, &id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Book not found: {}", id)))
    }
}

/// Shelf counters.
pub async fn books_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ShelfStats>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let entries = state.db.list_shelf_entries(&user.id)?;
    Ok(Json(ShelfStats::from_entries(&entries)))
}

// ============================================================================
// READING SESSIONS API
// ============================================================================

/// Session start request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    book_id: String,
}

/// Session end request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pages_read: u32,
}

/// Session list filter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionListParams {
    book_id: Option<String>,
}

/// Start a reading session. Only one may run at a time.
pub async fn sessions_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<ReadingSession>)> {
    let user = get_authenticated_user(&state, &headers).await?;
    let book = find_book(&state, &user.id, &req.book_id)?;

    let session = ReadingSession {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        book_id: book.id,
        started_at: Utc::now(),
        ended_at: None,
        pages_read: None,
    };
    state.db.create_reading_session(&session)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// End a reading session and fold the pages read into the book's progress.
pub async fn sessions_end(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<EndSessionRequest>,
) -> Result<Json<ReadingSession>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let mut session = state
        .db
        .get_reading_session(&user.id, &id)?
        .ok_or_else(|| AppError::NotFound(format!("Reading session not found: {}", id)))?;

    if !session.is_active() {
        return Err(AppError::Conflict(
            "Reading session has already ended".to_string(),
        ));
    }

    let mut book = find_book(&state, &user.id, &session.book_id)?;
    book.record_pages_read(req.pages_read)?;

    session.ended_at = Some(Utc::now());
    session.pages_read = Some(req.pages_read);
    if !state.db.end_reading_session(&session, &book)? {
        return Err(AppError::Conflict(
            "Reading session has already ended".to_string(),
        ));
    }

    tracing::debug!(
        session_id = %session.id,
        seconds = session.duration_seconds(),
        pages = req.pages_read,
        "Reading session ended"
    );
    Ok(Json(session))
}

/// The running session, or `null`.
pub async fn sessions_active(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<ReadingSession>>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(state.db.get_active_reading_session(&user.id)?))
}

/// One session.
pub async fn sessions_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ReadingSession>> {
    let user = get_authenticated_user(&state, &headers).await?;
    state
        .db
        .get_reading_session(&user.id, &id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Reading session not found: {}", id)))
}

/// The user's sessions, newest first.
pub async fn sessions_list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SessionListParams>,
) -> Result<Json<Vec<ReadingSession>>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(
        state
            .db
            .list_reading_sessions(&user.id, params.book_id.as_deref())?,
    ))
}

// ============================================================================
// POSTINGS API
// ============================================================================

fn find_posting(state: &AppState, id: &str) -> Result<Posting> {
    state
        .db
        .get_posting(id)?
        .ok_or_else(|| AppError::NotFound(format!("Posting not found: {}", id)))
}

fn ensure_author(posting: &Posting, user: &db::User) -> Result<()> {
    if posting.author_id.as_deref() != Some(user.id.as_str()) {
        return Err(AppError::Forbidden(
            "Only the author can change this posting".to_string(),
        ));
    }
    Ok(())
}

/// List postings, newest first. Public.
pub async fn postings_list(
    State(state): State<AppState>,
    Query(filter): Query<PostingFilter>,
) -> Result<Json<Vec<Posting>>> {
    Ok(Json(state.db.list_postings(&filter)?))
}

/// One posting. Public.
pub async fn postings_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Posting>> {
    Ok(Json(find_posting(&state, &id)?))
}

/// Write a posting about a book on the user's shelf.
pub async fn postings_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewPosting>,
) -> Result<(StatusCode, Json<Posting>)> {
    let user = get_authenticated_user(&state, &headers).await?;
    let book = find_book(&state, &user.id, &req.book_id)?;

    let posting = req
        .draft
        .into_posting(&book, Some(user.id.clone()), &user.name)?;
    state.db.insert_posting(&posting)?;

    tracing::debug!(user_id = %user.id, posting_id = %posting.id, "Posting created");
    Ok((StatusCode::CREATED, Json(posting)))
}

/// Replace a posting's form fields. Author only.
pub async fn postings_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<PostingDraft>,
) -> Result<Json<Posting>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let mut posting = find_posting(&state, &id)?;
    ensure_author(&posting, &user)?;

    draft.apply_to(&mut posting)?;
    state.db.update_posting(&posting)?;
    Ok(Json(posting))
}

/// Delete a posting. Author only.
pub async fn postings_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers).await?;
    let posting = find_posting(&state, &id)?;
    ensure_author(&posting, &user)?;

    state.db.delete_posting(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Like or unlike a posting.
pub async fn postings_toggle_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LikeState>> {
    let user = get_authenticated_user(&state, &headers).await?;
    find_posting(&state, &id)?;
    Ok(Json(state.db.toggle_like(&id, &user.id)?))
}

/// Comment request.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    content: String,
}

/// Comments on a posting, oldest first. Public.
pub async fn comments_list(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>> {
    find_posting(&state, &id)?;
    Ok(Json(state.db.list_comments(&id)?))
}

/// Comment on a posting.
pub async fn comments_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>)> {
    let user = get_authenticated_user(&state, &headers).await?;
    find_posting(&state, &id)?;

    let comment = Comment::new(&id, &user.id, &user.name, &req.content)?;
    state.db.insert_comment(&comment)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Delete a comment. Author only.
pub async fn comments_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers).await?;
    let comment = state
        .db
        .get_comment(&id)?
        .ok_or_else(|| AppError::NotFound(format!("Comment not found: {}", id)))?;

    if comment.author_id != user.id {
        return Err(AppError::Forbidden(
            "Only the author can delete this comment".to_string(),
        ));
    }

    state.db.delete_comment(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// CATALOG API
// ============================================================================

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
}

/// Count query parameter.
#[derive(Debug, Deserialize)]
pub struct CountParams {
    count: Option<usize>,
}

impl CountParams {
    fn or(&self, default: usize) -> usize {
        self.count.unwrap_or(default).clamp(1, MAX_CATALOG_COUNT)
    }
}

/// Publisher query parameters.
#[derive(Debug, Deserialize)]
pub struct PublisherParams {
    /// Comma separated publisher names.
    names: String,
    count: Option<usize>,
}

/// Free text search.
pub async fn catalog_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Volume>> {
    Json(state.books.search(&params.q).await)
}

/// Bestseller sample.
pub async fn catalog_bestsellers(
    State(state): State<AppState>,
    Query(params): Query<CountParams>,
) -> Json<Vec<Volume>> {
    Json(state.books.bestsellers(params.or(6)).await)
}

/// Recent publications.
pub async fn catalog_new_releases(
    State(state): State<AppState>,
    Query(params): Query<CountParams>,
) -> Json<Vec<Volume>> {
    Json(state.books.new_releases(params.or(4)).await)
}

/// Random gallery.
pub async fn catalog_random(
    State(state): State<AppState>,
    Query(params): Query<CountParams>,
) -> Json<Vec<Volume>> {
    Json(state.books.random_books(params.or(40)).await)
}

/// Books by publisher.
pub async fn catalog_publishers(
    State(state): State<AppState>,
    Query(params): Query<PublisherParams>,
) -> Json<Vec<Volume>> {
    let publishers: Vec<String> = params
        .names
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    let count = params.count.unwrap_or(40).clamp(1, MAX_CATALOG_COUNT);
    Json(state.books.books_by_publishers(&publishers, count).await)
}

/// Lookup by ISBN.
pub async fn catalog_isbn(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> Result<Json<Volume>> {
    Ok(Json(state.books.search_by_isbn(&isbn).await?))
}

/// One volume.
pub async fn catalog_volume(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Volume>> {
    Ok(Json(state.books.volume(&id).await?))
}

/// Libraries holding a book.
pub async fn catalog_holdings(
    State(state): State<AppState>,
    Path(isbn): Path<String>,
) -> Result<Json<Vec<HoldingLibrary>>> {
    Ok(Json(state.holdings.libraries_by_isbn(&isbn).await?))
}

// ============================================================================
// MAP API
// ============================================================================

/// Location filter.
#[derive(Debug, Deserialize)]
pub struct LocationParams {
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Demo libraries and bookstores.
pub async fn map_locations(Query(params): Query<LocationParams>) -> Json<Vec<Location>> {
    let kind = params.kind.as_deref().and_then(LocationKind::parse_filter);
    Json(map::filter_locations(kind))
}

/// Map SDK settings for the front-end.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfigResponse {
    sdk_url: Option<String>,
    geocoding: bool,
}

/// Map SDK URL, `null` when no app key is configured.
pub async fn map_config(State(state): State<AppState>) -> Json<MapConfigResponse> {
    Json(MapConfigResponse {
        sdk_url: map::sdk_script_url(state.config.map.kakao_app_key.as_deref()),
        geocoding: state
            .config
            .map
            .kakao_rest_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty()),
    })
}

/// Geocode request.
#[derive(Debug, Deserialize)]
pub struct GeocodeParams {
    address: String,
}

/// Address to coordinates.
pub async fn map_geocode(
    State(state): State<AppState>,
    Query(params): Query<GeocodeParams>,
) -> Result<Json<Coordinates>> {
    Ok(Json(state.geocoder.geocode(&params.address).await?))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract auth token from headers.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Get authenticated user from token.
async fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<db::User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}
