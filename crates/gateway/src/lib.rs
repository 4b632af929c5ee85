//! HTTP API gateway for Lectern.
//!
//! Exposes the health check and the v1 API: the streaming chat endpoint plus
//! read-only views of sessions, artifacts, courses and tools.
//!
//! Built on Axum.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use lectern_agent::Orchestrator;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            started_at: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 1024 * 1024;

/// Build the full router.
///
/// Layers applied:
/// - CORS for the configured frontend origin
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState, cors_origin: &str) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT));

    let router = match HeaderValue::from_str(cors_origin) {
        Ok(origin) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
                .max_age(std::time::Duration::from_secs(3600)),
        ),
        Err(_) => {
            warn!(origin = %cors_origin, "Invalid CORS origin, cross-origin requests disabled");
            router
        }
    };

    router.layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: lectern_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let state = Arc::new(GatewayState::new(orchestrator));
    let app = build_router(state, &config.gateway.cors_origin);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
