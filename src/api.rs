use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::ServiceConfig;
use crate::content::registry::build_clients;
use crate::emitter::json_array_body;
use crate::engine::BatchEngine;
use crate::window::RequestWindow;

const ANONYMOUS: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub engine: BatchEngine,
}

impl AppState {
    pub fn new(engine: BatchEngine) -> Self {
        Self { engine }
    }

    /// Wire clients for every configured provider and build the engine.
    pub fn from_config(cfg: &ServiceConfig) -> anyhow::Result<Self> {
        let clients = build_clients(cfg);
        let engine = BatchEngine::new(cfg.slots.clone(), clients, cfg.engine)?;
        Ok(Self::new(engine))
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(feed))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// `GET /?offset=<int>&count=<int>`: always 200, body is a JSON array that is
/// written while the engine is still fetching.
async fn feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let window = RequestWindow::from_query(&q);
    let requester = requester_identity(&headers);
    let articles = state.engine.stream(window, requester);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json_array_body(articles),
    )
        .into_response()
}

/// Best-effort client address: first `X-Forwarded-For` hop, then `X-Real-IP`.
fn requester_identity(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(ANONYMOUS)
        .to_string()
}
