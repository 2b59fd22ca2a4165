// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod content;
pub mod emitter;
pub mod engine;
pub mod metrics;
pub mod mix;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::content::{Article, ContentClient, ProviderId};
pub use crate::engine::{ArticleStream, BatchEngine, EngineSettings};
pub use crate::mix::{ContentMix, MixSlot};
pub use crate::window::RequestWindow;

use axum::Router;
use tracing::{info, warn};

/// Build the full in-process app: config from disk/env, provider clients,
/// engine, feed routes and (when the recorder could be installed) `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = config::load_config_default()?;

    let metrics = match metrics::Metrics::global() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = ?e, "metrics recorder unavailable, /metrics disabled");
            None
        }
    };

    let state = AppState::from_config(&cfg)?;
    let mut router = create_router(state);
    if let Some(m) = metrics {
        router = router.merge(m.router());
    }

    info!(
        slots = cfg.slots.period(),
        providers = cfg.slots.provider_ids().len(),
        fetch_timeout_ms = ?cfg.engine.fetch_timeout_ms,
        "feed service ready"
    );
    Ok(router)
}
