pub mod aggregate;
pub mod config;
pub mod contributors;
pub mod github;
pub mod metrics;
pub mod querier;
pub mod types;

use aggregate::AggregateResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use config::AppConfig;
use querier::ReportQuerier;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service for querying organization reports.
    pub querier: ReportQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state, including the report querier.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let querier = ReportQuerier::new(&config)?;
        Ok(Self { querier, config })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/orgs/tracked", get(get_tracked_orgs))
        .route("/api/orgs/{org}/report", get(get_org_report))
        .route("/api/report", get(get_default_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "org-pulse",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_tracked_orgs(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.config.tracked_orgs.clone())
}

pub async fn get_org_report(
    Path(org): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<AggregateResult>, (StatusCode, String)> {
    report_for(&state, &org).await
}

pub async fn get_default_report(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AggregateResult>, (StatusCode, String)> {
    match state.config.github_org_name.clone() {
        Some(org) => report_for(&state, &org).await,
        None => Err((
            StatusCode::NOT_FOUND,
            "No default organization configured".to_string(),
        )),
    }
}

async fn report_for(
    state: &AppState,
    org: &str,
) -> Result<Json<AggregateResult>, (StatusCode, String)> {
    match state.querier.get(org).await {
        Ok(report) => {
            tracing::debug!(org = %org, "Returning report");
            Ok(Json(report))
        }
        Err(e) => {
            tracing::error!("Failed to build report for {}: {:#}", org, e);
            Err(error_response(&e))
        }
    }
}

fn error_response(e: &anyhow::Error) -> (StatusCode, String) {
    let message = match e.downcast_ref::<octocrab::Error>() {
        Some(octocrab::Error::GitHub { source, .. }) => source.message.to_lowercase(),
        _ => format!("{:#}", e).to_lowercase(),
    };

    if message.contains("rate limit") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "GitHub Rate Limit Exceeded".to_string(),
        );
    }
    if message.contains("not found") || message.contains("could not resolve") {
        return (
            StatusCode::NOT_FOUND,
            "Organization Not Found".to_string(),
        );
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal Server Error".to_string(),
    )
}
