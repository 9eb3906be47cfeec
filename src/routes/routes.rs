//! Routes of the video metadata service.
//!
//! - `POST /api/videos`          create a record
//! - `GET  /api/videos/{id}`     record projection (`?token=` optional)
//! - `GET  /api/videos/{id}/url` playable URL (`?token=` optional)
//! - `GET  /api/health`          liveness
//! - `GET  /api/ready`           readiness

use crate::{
    handlers::{
        health_handlers::{health, ready},
        video_handlers::{create_video, get_video, get_video_url},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Routes without state, for nesting or custom layering.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/ready", get(ready))
        .route("/api/videos", post(create_video))
        .route("/api/videos/{id}", get(get_video))
        .route("/api/videos/{id}/url", get(get_video_url))
}

/// Full application router with state, CORS and request tracing.
pub fn build_router(state: AppState) -> Router {
    routes()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
