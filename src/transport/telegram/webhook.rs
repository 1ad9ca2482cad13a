//! Webhook receiver: Telegram POSTs updates to the configured URL path.

use super::WebhookSettings;
use super::api::Update;
use crate::transport::traits::InboundEvent;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";
pub const DEFAULT_PATH: &str = "/bot";
pub const MAX_BODY_SIZE: usize = 65_536;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
struct WebhookState {
    tx: Sender<InboundEvent>,
    secret: Option<Arc<str>>,
}

/// Path component of the public webhook URL, `/bot` when it has none.
pub fn route_path(webhook_url: &str) -> String {
    url::Url::parse(webhook_url)
        .ok()
        .map(|u| u.path().trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PATH.to_string())
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

async fn handle_update(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Result<Json<Update>, axum::extract::rejection::JsonRejection>,
) -> StatusCode {
    if let Some(secret) = &state.secret {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if !presented.is_some_and(|value| constant_time_eq(value, secret)) {
            tracing::warn!("webhook request with missing or invalid secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let Json(update) = match body {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "webhook body rejected");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Some(event) = update.into_event()
        && state.tx.send(event).await.is_err()
    {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

pub(crate) fn build_router(path: &str, tx: Sender<InboundEvent>, secret: Option<&str>) -> Router {
    let state = WebhookState {
        tx,
        secret: secret.map(Arc::from),
    };
    Router::new()
        .route(path, post(handle_update))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

pub async fn serve(settings: &WebhookSettings, tx: Sender<InboundEvent>) -> anyhow::Result<()> {
    let path = route_path(&settings.url);
    let addr: SocketAddr = format!("{}:{}", settings.listen, settings.port)
        .parse()
        .context("parse webhook bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind webhook socket {addr}"))?;

    tracing::info!(%addr, path = %path, "telegram listening via webhook");
    let app = build_router(&path, tx, settings.secret.as_deref());
    axum::serve(listener, app)
        .await
        .context("serve telegram webhook")
}
