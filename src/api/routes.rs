use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Dataset
        .route("/dataset", get(handlers::dataset_stats))
        .route("/dataset/reload", post(handlers::reload_dataset))
        // User-based
        .route(
            "/users/:user_id/recommendations",
            get(handlers::user_recommendations),
        )
        .route("/users/:user_id/hybrid", get(handlers::hybrid_recommendations))
        // Item-based
        .route("/items/:item_id/similar", get(handlers::similar_items))
}
