//! HTTP surface: `/metrics` for Prometheus and `/health` for humans.

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::collector::{BroadbandCollector, ScrapeState, into_families};

#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<BroadbandCollector>,
    /// Process-level metrics gathered next to the line metrics.
    pub registry: Registry,
}

impl AppState {
    pub fn new(collector: Arc<BroadbandCollector>) -> Self {
        Self {
            collector,
            registry: default_registry(),
        }
    }
}

/// Registry with the process collector where the platform supports it.
pub fn default_registry() -> Registry {
    let registry = Registry::new();
    #[cfg(target_os = "linux")]
    {
        let process = prometheus::process_collector::ProcessCollector::for_self();
        if let Err(e) = registry.register(Box::new(process)) {
            tracing::warn!("Failed to register process collector: {}", e);
        }
    }
    registry
}

#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed(prometheus::Error),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        let MetricsError::EncodingFailed(e) = self;
        tracing::error!("Failed to encode metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Result<Response, MetricsError> {
    let samples = state.collector.collect().await;

    let mut families = state.registry.gather();
    families.extend(into_families(&samples));

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(MetricsError::EncodingFailed)?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let last_scrape = match state.collector.status().get() {
        ScrapeState::Up => "up",
        ScrapeState::Down => "down",
        ScrapeState::Unknown => "unknown",
    };
    (StatusCode::OK, format!("OK\nlast scrape: {}\n", last_scrape))
}

/// Access log line for every request.
async fn log_request(request: Request, next: Next) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    tracing::info!(
        proto = ?request.version(),
        method = %request.method(),
        path = request.uri().path(),
        remote_addr = %remote_addr,
        user_agent = user_agent,
        "request"
    );

    next.run(request).await
}
