//! `GET /metrics` in the Prometheus text exposition format
//!
//! Served without authentication, next to `/health`, and behind the same
//! trace, CORS and compression layers as the `/api` routes.

use axum::{Router, http::header, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::error::AppError;
use crate::metrics::REGISTRY;

async fn render_metrics() -> Result<impl IntoResponse, AppError> {
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode metrics: {e}")))?;

    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        body,
    ))
}

pub fn metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(render_metrics))
}
