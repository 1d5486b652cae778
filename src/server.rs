//! HTTP lookup proxy
//!
//! Thin axum layer over [`SearchOrchestrator`]. Upstream trouble never
//! surfaces as a 5xx here; only malformed parameters are rejected.

use crate::company::CompanyRecord;
use crate::error::{validate_limit, AppError};
use crate::orchestrator::SearchOrchestrator;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Result cap for the interactive search endpoint
pub const MAX_SEARCH_RESULTS: usize = 10;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SearchOrchestrator>,
}

#[derive(Debug, Deserialize)]
struct CompaniesQuery {
    q: Option<String>,
    // Parsed by hand so a malformed limit gets the JSON error body
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    companies: usize,
    valid: bool,
    last_updated: i64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.error_code(),
            message: self.message(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/companies", get(companies_handler))
        .route("/companies/search", get(search_handler))
        // Paths used by the browser form
        .route("/api/insurance-companies", get(companies_handler))
        .route("/api/insurance-companies/search", get(search_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.orchestrator.cache();
    Json(HealthResponse {
        status: "ok",
        companies: cache.len(),
        valid: cache.is_valid(),
        last_updated: cache.last_updated(),
    })
}

async fn companies_handler(
    State(state): State<AppState>,
    Query(params): Query<CompaniesQuery>,
) -> Result<Json<Vec<CompanyRecord>>, AppError> {
    let limit = match params.limit.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => {
            let limit = raw
                .parse::<usize>()
                .map_err(|_| AppError::InvalidInput(format!("Limit must be a number, got '{}'", raw)))?;
            validate_limit(limit)?
        }
        _ => usize::MAX,
    };
    let query = params.q.unwrap_or_default();
    Ok(Json(state.orchestrator.lookup(&query, limit).await))
}

async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Json<Vec<CompanyRecord>> {
    let query = params.q.unwrap_or_default();
    Json(state.orchestrator.search_records(&query, MAX_SEARCH_RESULTS).await)
}

/// Bind `addr` and serve until Ctrl+C or SIGTERM
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("company-lookup v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
