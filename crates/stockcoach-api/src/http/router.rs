//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/` except `/health`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::handlers::transcribe::MAX_AUDIO_BYTES;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/chat", get(handlers::chat::get_chat))
        .route("/chat/messages", post(handlers::chat::send_message))
        .route("/chat/select-date", post(handlers::chat::select_date))
        .route("/chat/clear", post(handlers::chat::clear_chat))
        .route("/chat/history", get(handlers::chat::get_history))
        .route(
            "/transcribe",
            post(handlers::transcribe::transcribe).layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES)),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
