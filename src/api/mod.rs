//! HTTP API server

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsSection;
use crate::storage::Stores;

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Build the API router using the provided application state
pub fn create_router(state: AppState, cors: &CorsSection) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .nest(
            "/api",
            Router::new()
                .route("/users", post(handlers::create_user))
                .route("/meals", post(handlers::create_meal))
                .route(
                    "/meals/:id",
                    get(handlers::list_meals).delete(handlers::delete_meal),
                )
                .route("/meals/:id/summary", get(handlers::daily_summary))
                .route("/meals/:id/summary/weekly", get(handlers::weekly_summary))
                .route("/workouts", post(handlers::create_workout))
                .route("/workouts/:id", get(handlers::list_workouts))
                .route("/analyze-meal", post(handlers::analyze_meal)),
        )
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Convenience helper for local development: allow-all CORS
pub fn create_default_router(stores: Stores) -> Router {
    create_router(AppState::from(stores), &CorsSection::default())
}

fn cors_layer(cors: &CorsSection) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if cors.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(%origin, error = %err, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
