use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{debug, error, info};
use prometheus::{Encoder, Registry, TextEncoder, TEXT_FORMAT};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::collector::UsageCollector;
use crate::metrics::usage_families;

/// Everything the scrape handler needs: the collector and the registry holding
/// the tracker counters.
#[derive(Clone)]
pub struct MetricsState {
    collector: Arc<UsageCollector>,
    registry: Registry,
}

impl MetricsState {
    pub fn new(collector: Arc<UsageCollector>, registry: Registry) -> Self {
        Self {
            collector,
            registry,
        }
    }
}

pub fn router(state: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn handle_metrics(State(state): State<MetricsState>) -> Response {
    debug!("Scrape requested");
    let snapshot = match state.collector.collect().await {
        Ok(snapshot) => snapshot,
        Err(e) => return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    };
    match encode_snapshot(&snapshot, &state.registry) {
        Ok(body) => ([(CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Text exposition of one usage snapshot plus the registry's own series.
pub fn encode_snapshot(
    snapshot: &[(String, i64)],
    registry: &Registry,
) -> prometheus::Result<String> {
    let mut families = usage_families(snapshot)?;
    families.extend(registry.gather());
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Serves the scrape endpoint until the listener fails.
pub async fn serve(listener: TcpListener, state: MetricsState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Metrics listening on: {}", addr);
    }
    axum::serve(listener, router(state)).await
}
