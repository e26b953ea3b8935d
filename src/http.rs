//! Metrics and health HTTP endpoint (ambient stack addition), grounded on
//! the teacher's `http_server.rs` — trimmed to the two routes this process
//! actually needs, since there is no cluster registry or cache to report.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::metrics::FrontendMetrics;

#[derive(Clone)]
struct AppState {
    metrics: Arc<FrontendMetrics>,
}

pub async fn serve(bind_addr: SocketAddr, metrics: Arc<FrontendMetrics>) -> Result<()> {
    let state = AppState { metrics };
    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(%bind_addr, "metrics endpoint listening");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}
