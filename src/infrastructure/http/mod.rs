use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::Json,
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::infrastructure::auth::AuthClient;
use crate::infrastructure::backend::{BackendClient, RateLimitGuard};
use crate::infrastructure::config::AppConfig;
use crate::presentation::handlers::AppState;
use crate::presentation::middleware::session::pipeline_middleware;
use crate::presentation::routes;

/// Create the main application router
pub fn create_app(config: &AppConfig, app_state: AppState) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_seconds),
        ))
        .layer(create_cors_layer());

    Router::new()
        .merge(routes::create_routes(app_state.clone()))
        .layer(axum::middleware::from_fn_with_state(app_state, pipeline_middleware))
        .layer(middleware_stack)
        .fallback(not_found_handler)
}

/// Build application state from configuration, degrading gracefully when a
/// boundary is not configured.
pub fn build_app_state(config: &AppConfig) -> AppState {
    let auth = if config.auth.is_configured() {
        match AuthClient::new(config.auth.clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Failed to create auth client, sessions disabled: {}", e);
                None
            }
        }
    } else {
        warn!("Auth provider not configured; session refresh disabled");
        None
    };

    let backend = if config.backend.is_configured() {
        match BackendClient::new(config.backend.clone()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("Failed to create backend client, data routes disabled: {}", e);
                None
            }
        }
    } else {
        warn!("Backend database not configured; data routes disabled");
        None
    };

    let guard =
        RateLimitGuard::with_cooldown(Duration::from_secs(config.rate_limit.cooldown_seconds));

    AppState::new(auth, backend, guard)
}

/// Health check endpoint for liveness probes
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "tabletop-platform-service"
    }))
}

/// Readiness check reporting the state of each boundary
pub async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ready",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "checks": {
            "auth_provider": if state.auth.is_some() { "ok" } else { "not_configured" },
            "backend": if state.backend.is_some() { "ok" } else { "not_configured" },
            "rate_limit": if state.guard.check_limited() { "cooling_down" } else { "open" }
        }
    }))
}

/// Handler for 404 not found
async fn not_found_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": "The requested resource was not found"
        })),
    )
}

/// Create CORS layer with appropriate settings
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any) // TODO: Configure specific origins in production
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Start the HTTP server
///
/// # Errors
/// Returns an error if the server fails to start
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = build_app_state(&config);
    let app = create_app(&config, app_state);
    let addr = config.server.socket_addr();

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
