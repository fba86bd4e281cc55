use axum::{
    Router, middleware,
    routing::{any, delete, get, post, put},
};

use crate::error::ApiError;
use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;
use crate::{admin, audio, auth, book, feedback, listening, reading, settings, status};

/// Every JSON route plus the protected downloads. Static files and the SPA
/// fallback are mounted by the server binary.
pub fn api_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(status::health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/build-info", get(status::build_info))
        .route(
            "/api/me/reader-settings",
            get(settings::get_reader_settings).put(settings::put_reader_settings),
        )
        .route("/api/book/downloads", get(book::downloads))
        .route("/api/book/epub", get(book::epub))
        .route("/downloads/{filename}", get(book::download_file))
        .route("/api/audio/manifest", get(audio::manifest))
        .route("/api/audio/stream/{chapter_id}", get(audio::stream))
        .route("/api/audio/synced-text/{chapter_id}", get(audio::synced_text))
        .route("/api/progress", get(listening::get_progress).post(listening::save_progress))
        .route("/api/bookmarks", get(listening::list_bookmarks).post(listening::add_bookmark))
        .route("/api/bookmarks/{id}", delete(listening::delete_bookmark))
        .route("/api/notes", get(listening::list_notes).post(listening::add_note))
        .route("/api/notes/{id}", put(listening::edit_note).delete(listening::delete_note))
        .route("/api/epub/progress", get(reading::get_progress).post(reading::save_progress))
        .route("/api/epub/bookmarks", get(reading::list_bookmarks).post(reading::add_bookmark))
        .route("/api/epub/bookmarks/{id}", delete(reading::delete_bookmark))
        .route("/api/epub/notes", get(reading::list_notes).post(reading::add_note))
        .route("/api/epub/notes/{id}", put(reading::edit_note).delete(reading::delete_note))
        .route("/api/feedback", post(feedback::submit))
        .route("/api/feedback/mine", get(feedback::mine))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    // Layers run outside-in: auth first, then the admin check.
    let admin_routes = Router::new()
        .route("/api/admin/invites", get(admin::list_invites).post(admin::add_invite))
        .route("/api/admin/feedback", get(admin::list_feedback))
        .route("/api/admin/feedback/{id}", put(admin::update_feedback))
        .route("/api/admin/progress", get(admin::reader_progress))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .route("/api/{*rest}", any(unknown_api_route))
}

/// Keeps unknown API paths from falling through to the SPA.
async fn unknown_api_route() -> ApiError {
    ApiError::not_found()
}
