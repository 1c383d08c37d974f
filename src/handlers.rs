use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::Config;
use crate::errors::AppError;
use crate::job::WeeklySummaryJob;

/// Header the scheduler uses to present the cron secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// The weekly summary job, wired to its data source and notifier.
    pub job: WeeklySummaryJob,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "survey-weekly-digest",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/cron/weekly-summary
///
/// Triggered by an external scheduler. Authenticates the `x-api-key` header
/// against `CRON_SECRET` before touching the database, then runs the weekly
/// summary job and reports what was sent.
pub async fn weekly_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    validate_cron_secret(&state.config, &headers)?;

    let report = state.job.run(Utc::now()).await?;

    Ok(Json(json!({
        "message": "Weekly summary notifications sent",
        "report": report,
    })))
}

fn validate_cron_secret(config: &Config, headers: &HeaderMap) -> Result<(), AppError> {
    let token = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing x-api-key header".to_string()))?;

    if !constant_time_compare(token, &config.cron_secret) {
        return Err(AppError::Unauthorized("Invalid cron secret".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Routes that run work on behalf of the scheduler. Callers may layer rate
/// limiting on top before passing them to [`build_router`].
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/cron/weekly-summary",
            get(weekly_summary).post(weekly_summary),
        )
        // The trigger carries no body; keep anything sent small.
        .layer(RequestBodyLimitLayer::new(64 * 1024))
}

/// Assembles the full application: health check plus the given API routes.
pub fn build_router(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
