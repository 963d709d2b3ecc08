//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router. The REST API lives under `/api`.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(handlers::auth_login))
        .route("/signup", post(handlers::auth_signup))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me))
        .route("/profile", put(handlers::auth_update_profile))
        // OAuth: redirect to the provider, then exchange the returned code
        .route("/{provider}", get(handlers::oauth_start))
        .route("/{provider}/callback", post(handlers::oauth_callback));

    let book_routes = Router::new()
        .route("/", get(handlers::books_list).post(handlers::books_add))
        .route("/stats", get(handlers::books_stats))
        .route(
            "/{id}",
            get(handlers::books_get)
                .put(handlers::books_update)
                .delete(handlers::books_delete),
        )
        .route("/{id}/complete", post(handlers::books_complete));

    let session_routes = Router::new()
        .route(
            "/",
            get(handlers::sessions_list).post(handlers::sessions_start),
        )
        .route("/active", get(handlers::sessions_active))
        .route(
            "/{id}",
            get(handlers::sessions_get).put(handlers::sessions_end),
        );

    let posting_routes = Router::new()
        .route(
            "/",
            get(handlers::postings_list).post(handlers::postings_create),
        )
        .route(
            "/{id}",
            get(handlers::postings_get)
                .put(handlers::postings_update)
                .delete(handlers::postings_delete),
        )
        .route("/{id}/like", post(handlers::postings_toggle_like))
        .route(
            "/{id}/comments",
            get(handlers::comments_list).post(handlers::comments_create),
        );

    let catalog_routes = Router::new()
        .route("/search", get(handlers::catalog_search))
        .route("/bestsellers", get(handlers::catalog_bestsellers))
        .route("/new-releases", get(handlers::catalog_new_releases))
        .route("/random", get(handlers::catalog_random))
        .route("/publishers", get(handlers::catalog_publishers))
        .route("/isbn/{isbn}", get(handlers::catalog_isbn))
        .route("/volumes/{id}", get(handlers::catalog_volume))
        .route("/holdings/{isbn}", get(handlers::catalog_holdings));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/books", book_routes)
        .nest("/reading-sessions", session_routes)
        .nest("/postings", posting_routes)
        .route("/comments/{id}", delete(handlers::comments_delete))
        .nest("/catalog", catalog_routes)
        .route("/locations", get(handlers::map_locations))
        .route("/map/config", get(handlers::map_config))
        .route("/map/geocode", get(handlers::map_geocode));

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
