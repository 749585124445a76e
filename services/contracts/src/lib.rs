//! Multi-tenant contracts API: create contracts with file attachments and
//! list them with their client, location and rate-card names.

pub mod auth;
pub mod config;
pub mod error;
pub mod form;
pub mod handlers;
pub mod repository;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let media_root = state.config().media_root.clone();
    let media_prefix = state.config().media_url.trim_end_matches('/').to_string();
    let body_limit = state.config().max_upload_bytes;

    let router = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/contracts",
            get(handlers::list_contracts).post(handlers::create_contract),
        )
        // path the existing admin frontend posts to
        .route(
            "/add-contract/",
            get(handlers::list_contracts).post(handlers::create_contract),
        );

    let router = if media_prefix.is_empty() {
        router.fallback_service(ServeDir::new(media_root))
    } else {
        router.nest_service(&media_prefix, ServeDir::new(media_root))
    };

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
