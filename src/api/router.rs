//! Route table for the context engine API

use super::handlers::{self, ApiState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the full router with tracing and a request body limit
pub fn build_router(state: ApiState, max_body_bytes: usize) -> Router {
    let conversations = Router::new()
        .route("/:id", delete(handlers::clear))
        .route("/:id/initialize", post(handlers::initialize))
        .route("/:id/messages", post(handlers::add_message))
        .route("/:id/context", get(handlers::get_context))
        .route("/:id/stats", get(handlers::get_stats))
        .route("/:id/optimize", post(handlers::optimize))
        .route("/:id/export", get(handlers::export))
        .route(
            "/:id/branches",
            get(handlers::list_branches).post(handlers::create_branch),
        )
        .route("/:id/branches/:branch_id", delete(handlers::archive_branch))
        .route("/:id/branches/:branch_id/switch", post(handlers::switch_branch))
        .route("/:id/merge-candidates", get(handlers::merge_candidates))
        .route("/:id/merge", post(handlers::merge))
        .route("/:id/navigation", get(handlers::navigation));

    Router::new()
        .nest("/api/v1/conversations", conversations)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
