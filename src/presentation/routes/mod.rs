use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    infrastructure::http::{health_check, readiness_check},
    presentation::handlers::{self, AppState},
};

/// Create all application routes with application state
pub fn create_routes(app_state: AppState) -> Router {
    Router::new().nest("/api/v1/platform", platform_routes()).with_state(app_state)
}

/// Platform service routes with state
fn platform_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/games/search", get(handlers::platform::search_games))
        .route("/polls", post(handlers::platform::create_poll))
        .route("/polls/{id}", get(handlers::platform::get_poll))
}
