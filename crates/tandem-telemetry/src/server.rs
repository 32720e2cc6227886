//! HTTP endpoint exposing prometheus metrics.

use crate::error::TelemetryResult;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the axum router.
pub fn create_router() -> Router {
    Router::new()
        .route("/metrics", get(serve_prometheus))
        .route("/health", get(serve_health))
        .layer(TraceLayer::new_for_http())
}

/// Serve `/metrics` and `/health` on `addr` until the process exits.
///
/// Intended to be spawned; it never returns on the happy path.
pub async fn serve_metrics(addr: SocketAddr) -> TelemetryResult<()> {
    let app = create_router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Metrics server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_prometheus() -> (StatusCode, String) {
    let metric_families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buf) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encode error: {e}"),
        );
    }
    match String::from_utf8(buf) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("utf8 error: {e}"),
        ),
    }
}

async fn serve_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metrics;

    #[tokio::test]
    async fn test_prometheus_text_renders() {
        Metrics::cycle_completed();
        let (status, body) = serve_prometheus().await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("tandem_cycles_total"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(serve_health().await, "ok");
    }
}
