// SPDX-License-Identifier: MIT
// Copyright (c) 2026 lmetrics contributors

//! HTTP surface (spec §6), grounded in the teacher's
//! `crates/mux/src/transport/mod.rs` `build_router`/`build_router_inner`
//! shape (a free function returning `axum::Router` over a shared, cloneable
//! state handle) and in the Python reference's `lmetrics/web.py`
//! (`HOMEPAGE`, the `/` and `/metrics` routes, `generate_latest`).
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use tower_http::trace::TraceLayer;

const HOMEPAGE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <title>lmetrics - Prometheus log metrics exporter</title>
  </head>
  <body>
    <h1>lmetrics - Prometheus log metrics exporter</h1>
    <p>Metrics are exported at the <a href="/metrics">/metrics</a> endpoint.</p>
  </body>
</html>
"#;

/// Shared state behind every route: just the registry metrics are gathered
/// from at scrape time.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Html<&'static str> {
    Html(HOMEPAGE)
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metric_families = state.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %err, "failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics".to_string()).into_response();
    }
    (StatusCode::OK, [(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response()
}

#[cfg(test)]
#[path = "web_tests.rs"]
mod tests;
