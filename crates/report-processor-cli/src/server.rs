use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use report_processor_core::{Reply, ReportProcessor};
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

/// Request headers browsers may send to the webhook.
const ALLOWED_HEADERS: &str = "authorization, x-client-info, apikey, content-type";

/// Build the webhook router. Every response carries the permissive CORS headers.
pub fn router(processor: Arc<ReportProcessor>) -> Router {
    Router::new()
        .route("/", post(process_report).options(preflight))
        .route("/process-report", post(process_report).options(preflight))
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(processor)
}

pub async fn serve(bind: SocketAddr, processor: Arc<ReportProcessor>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, "report processor listening");
    axum::serve(listener, router(processor))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server terminated unexpectedly")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

async fn preflight() -> &'static str {
    "ok"
}

async fn health() -> &'static str {
    "ok"
}

async fn process_report(
    State(processor): State<Arc<ReportProcessor>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let result = processor.handle_body(&body, authorization).await;
    if let Err(err) = &result {
        error!(error = %err, "Error processing application");
    }

    let reply = Reply::from_result(&result);
    let status =
        StatusCode::from_u16(reply.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.to_json())).into_response()
}
