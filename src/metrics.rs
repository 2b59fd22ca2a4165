use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

static GLOBAL: OnceCell<Metrics> = OnceCell::new();

impl Metrics {
    /// Install the Prometheus recorder for this process (first call only) and
    /// return the shared handle. Fails if some other recorder got there first.
    pub fn global() -> anyhow::Result<&'static Metrics> {
        GLOBAL.get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
            // describe again: the engine may have described against the no-op recorder
            describe_all();
            Ok(Self { handle })
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(describe_all);
}

fn describe_all() {
    describe_counter!(
        "feed_requests_total",
        "Feed requests received, empty windows included."
    );
    describe_counter!(
        "feed_articles_emitted_total",
        "Articles handed to the response emitter."
    );
    describe_counter!(
        "feed_provider_errors_total",
        "Failed provider fetches (primary or fallback), by provider."
    );
    describe_counter!(
        "feed_fallback_used_total",
        "Slots that needed their fallback provider."
    );
    describe_counter!(
        "feed_truncated_total",
        "Feed windows cut short by an unrecoverable slot failure."
    );
    describe_counter!(
        "feed_request_clamped_total",
        "Negative or malformed offset/count values replaced with 0."
    );
    describe_histogram!("feed_fetch_ms", "Provider fetch time in milliseconds.");
}
