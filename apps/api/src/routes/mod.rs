pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sessions
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_end_session),
        )
        .route(
            "/api/v1/sessions/:id/start-over",
            post(handlers::handle_start_over),
        )
        // Generation stages
        .route(
            "/api/v1/sessions/:id/analyze",
            post(handlers::handle_analyze),
        )
        .route(
            "/api/v1/sessions/:id/projects",
            post(handlers::handle_generate_projects),
        )
        .route(
            "/api/v1/sessions/:id/projects/generate",
            post(handlers::handle_generate_from_analysis),
        )
        .route(
            "/api/v1/sessions/:id/projects/upload",
            post(handlers::handle_upload_projects),
        )
        .route(
            "/api/v1/sessions/:id/backstories",
            post(handlers::handle_generate_backstories),
        )
        .route(
            "/api/v1/sessions/:id/resources",
            post(handlers::handle_generate_resources),
        )
        // Usage and results
        .route("/api/v1/sessions/:id/usage", get(handlers::handle_get_usage))
        .route(
            "/api/v1/sessions/:id/usage/reset",
            post(handlers::handle_reset_usage),
        )
        .route(
            "/api/v1/sessions/:id/download",
            get(handlers::handle_download),
        )
        .with_state(state)
}
