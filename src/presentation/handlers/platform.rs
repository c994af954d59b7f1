use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::infrastructure::auth::AuthClient;
use crate::infrastructure::backend::{BackendClient, Filter, RateLimitGuard};
use crate::presentation::middleware::error::AppError;

/// Shared application state for handlers and the pipeline middleware.
///
/// Both external clients are optional: missing configuration degrades the
/// corresponding feature instead of failing startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: Option<Arc<AuthClient>>,
    pub backend: Option<Arc<BackendClient>>,
    pub guard: RateLimitGuard,
}

impl AppState {
    pub fn new(
        auth: Option<AuthClient>,
        backend: Option<BackendClient>,
        guard: RateLimitGuard,
    ) -> Self {
        Self { auth: auth.map(Arc::new), backend: backend.map(Arc::new), guard }
    }

    fn backend(&self) -> Result<Arc<BackendClient>, AppError> {
        self.backend.clone().ok_or_else(|| AppError::Configuration {
            message: "Backend database is not configured".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

/// Search the game catalog by name.
///
/// Guarded with an empty fallback: while the backend is cooling down the
/// endpoint degrades to an empty result set instead of failing.
pub async fn search_games(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    if params.query.is_empty() {
        return Err(AppError::BadRequest { message: "query parameter is required".to_string() });
    }

    let backend = state.backend()?;
    let query = params.query.clone();
    let rows = state
        .guard
        .run_guarded(
            move || async move {
                backend.select("games", &[Filter::eq("name", &query)]).await.map_err(AppError::from)
            },
            Some(Vec::new()),
        )
        .await?;

    Ok(Json(json!({ "query": params.query, "results": rows })))
}

/// Fetch a single poll. No fallback: while the backend is cooling down this
/// surfaces the rate-limit error.
pub async fn get_poll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let backend = state.backend()?;
    let poll_id = id.clone();
    let rows = state
        .guard
        .run_guarded(
            move || async move {
                backend.select("polls", &[Filter::eq("id", &poll_id)]).await.map_err(AppError::from)
            },
            None,
        )
        .await?;

    rows.into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::NotFound { resource: format!("poll {id}") })
}

/// Create a poll. No fallback: writes are never silently dropped.
pub async fn create_poll(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    if body.get("question").and_then(Value::as_str).is_none_or(str::is_empty) {
        return Err(AppError::BadRequest { message: "question is required".to_string() });
    }

    let backend = state.backend()?;
    let row = body.clone();
    let inserted = state
        .guard
        .run_guarded(
            move || async move { backend.insert("polls", &row).await.map_err(AppError::from) },
            None,
        )
        .await?;

    inserted
        .into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| AppError::Internal { message: "insert returned no row".to_string() })
}
