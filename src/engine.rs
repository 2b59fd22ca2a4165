//! # Batch Engine
//! Turns one `(offset, count)` window into an ordered stream of articles.
//!
//! Each batch walks the mix from its starting slot to the end of the slot
//! sequence (the first batch starts at `offset % P`, later ones at 0). All
//! primary fetches of a batch are spawned together; their handles are then
//! awaited strictly in slot order, so the emitted sequence always follows the
//! mix, never completion order.
//!
//! Policy per slot: primary first; on failure one synchronous fallback fetch if
//! the slot has one. A slot that cannot be filled ends the whole request: what
//! was already emitted is the response.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use metrics::{counter, histogram};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::content::registry::ContentClients;
use crate::content::{Article, ContentClient, ProviderId};
use crate::mix::ContentMix;
use crate::window::RequestWindow;

/// Upper bound for the engine → emitter buffer.
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

fn default_channel_capacity() -> usize {
    16
}

/// Engine knobs. Loaded from the `[engine]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EngineSettings {
    /// Deadline per provider call. `None` or 0 = wait as long as the provider takes.
    #[serde(default)]
    pub fetch_timeout_ms: Option<u64>,
    /// Articles buffered between engine and emitter before the engine waits.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl EngineSettings {
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Buffer size actually used, kept within `1..=MAX_CHANNEL_CAPACITY`.
    pub fn effective_capacity(&self) -> usize {
        self.channel_capacity.clamp(1, MAX_CHANNEL_CAPACITY)
    }
}

/// Articles of one window, in feed order. Ends when the window is served,
/// truncated, or the engine gave up.
pub type ArticleStream = ReceiverStream<Article>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every requested article was emitted (or nothing was requested).
    Completed,
    /// Logical feed position whose slot could not be filled.
    Truncated { position: usize },
    /// The receiving side was dropped mid-request.
    ConsumerGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub emitted: usize,
    pub batches: usize,
    pub stop: StopReason,
}

/// Immutable feed context: mix, clients and settings. Cheap to clone.
#[derive(Clone)]
pub struct BatchEngine {
    inner: Arc<Inner>,
}

struct Inner {
    mix: ContentMix,
    clients: ContentClients,
    settings: EngineSettings,
}

impl BatchEngine {
    /// Every provider the mix names (primary or fallback) must have a client.
    pub fn new(mix: ContentMix, clients: ContentClients, settings: EngineSettings) -> Result<Self> {
        crate::metrics::ensure_metrics_described();

        for id in mix.provider_ids() {
            if !clients.contains_key(id) {
                bail!("mix references provider {id} but no client is registered for it");
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                mix,
                clients,
                settings,
            }),
        })
    }

    pub fn mix(&self) -> &ContentMix {
        &self.inner.mix
    }

    pub fn settings(&self) -> EngineSettings {
        self.inner.settings
    }

    /// Start serving `window` in the background and hand back the article stream.
    ///
    /// The engine runs at most `channel_capacity` articles ahead of the consumer.
    /// Dropping the stream stops the engine and aborts its in-flight fetches.
    pub fn stream(&self, window: RequestWindow, requester: impl Into<String>) -> ArticleStream {
        counter!("feed_requests_total").increment(1);

        let (tx, rx) = mpsc::channel(self.inner.settings.effective_capacity());
        if window.is_empty() || self.inner.mix.is_empty() {
            return ReceiverStream::new(rx);
        }

        let engine = self.clone();
        let requester = requester.into();
        tokio::spawn(async move {
            engine.run(window, &requester, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Serve `window` and gather the result in memory.
    pub async fn collect(&self, window: RequestWindow, requester: &str) -> Vec<Article> {
        self.stream(window, requester).collect().await
    }

    /// Serve `window` into `tx` on the current task. Returns when the window is
    /// complete, truncated, or `tx`'s receiver is gone.
    pub async fn run(
        &self,
        window: RequestWindow,
        requester: &str,
        tx: mpsc::Sender<Article>,
    ) -> RunSummary {
        let requester: Arc<str> = Arc::from(requester);
        let period = self.inner.mix.period();
        let mut summary = RunSummary {
            emitted: 0,
            batches: 0,
            stop: StopReason::Completed,
        };
        if period == 0 || window.count == 0 {
            return summary;
        }

        let mut start = window.offset % period;
        let mut position = window.offset;
        while summary.emitted < window.count {
            // Only launch the slots that can still contribute; the last batch is cut short.
            let remaining = window.count - summary.emitted;
            let end = period.min(start + remaining);
            summary.batches += 1;

            if let Some(stop) = self
                .run_batch(start..end, position, &requester, &tx, &mut summary.emitted)
                .await
            {
                summary.stop = stop;
                break;
            }

            position += end - start;
            start = 0;
        }

        log_summary(&summary, window, &requester);
        summary
    }

    /// One batch. Returns `Some` when the whole request must stop.
    async fn run_batch(
        &self,
        slots: Range<usize>,
        first_position: usize,
        requester: &Arc<str>,
        tx: &mpsc::Sender<Article>,
        emitted: &mut usize,
    ) -> Option<StopReason> {
        let mix = self.inner.mix.slots();

        let mut tasks = BatchTasks::with_capacity(slots.len());
        for idx in slots.clone() {
            tasks.spawn(self.fetch(&mix[idx].primary, requester));
        }

        for (n, idx) in slots.enumerate() {
            let slot = &mix[idx];
            let position = first_position + n;

            let primary = tokio::select! {
                res = tasks.join(n) => res,
                _ = tx.closed() => return Some(StopReason::ConsumerGone),
            };

            let article = match primary {
                Ok(a) => a,
                Err(e) => {
                    counter!("feed_provider_errors_total", "provider" => slot.primary.to_string())
                        .increment(1);

                    let Some(fallback) = &slot.fallback else {
                        warn!(
                            target: "feed",
                            slot = idx, position, provider = %slot.primary, error = %e,
                            "fetch failed and slot has no fallback, truncating feed"
                        );
                        return Some(StopReason::Truncated { position });
                    };

                    debug!(
                        target: "feed",
                        slot = idx, position, provider = %slot.primary, fallback = %fallback, error = %e,
                        "primary fetch failed, trying fallback"
                    );
                    counter!("feed_fallback_used_total").increment(1);

                    let res = tokio::select! {
                        res = self.fetch(fallback, requester) => res,
                        _ = tx.closed() => return Some(StopReason::ConsumerGone),
                    };
                    match res {
                        Ok(a) => a,
                        Err(fe) => {
                            counter!("feed_provider_errors_total", "provider" => fallback.to_string())
                                .increment(1);
                            warn!(
                                target: "feed",
                                slot = idx, position, provider = %slot.primary, fallback = %fallback,
                                error = %e, fallback_error = %fe,
                                "primary and fallback both failed, truncating feed"
                            );
                            return Some(StopReason::Truncated { position });
                        }
                    }
                }
            };

            if tx.send(article).await.is_err() {
                return Some(StopReason::ConsumerGone);
            }
            *emitted += 1;
            counter!("feed_articles_emitted_total").increment(1);
        }

        None
    }

    /// Owned future fetching one article from `provider`; safe to spawn.
    fn fetch(
        &self,
        provider: &ProviderId,
        requester: &Arc<str>,
    ) -> impl Future<Output = Result<Article>> + Send + 'static {
        let client = self
            .inner
            .clients
            .get(provider)
            .cloned()
            .ok_or_else(|| anyhow!("no client registered for provider {provider}"));
        let provider = provider.clone();
        let requester = Arc::clone(requester);
        let timeout = self.inner.settings.fetch_timeout();
        async move { fetch_one(client?, provider, requester, timeout).await }
    }
}

async fn fetch_one(
    client: Arc<dyn ContentClient>,
    provider: ProviderId,
    requester: Arc<str>,
    timeout: Option<Duration>,
) -> Result<Article> {
    let t0 = Instant::now();
    let call = client.get_content(&requester, 1);
    let res = match timeout {
        Some(d) => tokio::time::timeout(d, call)
            .await
            .map_err(|_| anyhow!("timed out after {} ms", d.as_millis()))
            .and_then(|r| r),
        None => call.await,
    };
    histogram!("feed_fetch_ms", "provider" => provider.to_string())
        .record(t0.elapsed().as_secs_f64() * 1_000.0);

    let mut items = res.with_context(|| format!("fetching from provider {provider}"))?;
    if items.is_empty() {
        bail!("provider {provider} returned no content");
    }
    Ok(items.swap_remove(0))
}

fn log_summary(summary: &RunSummary, window: RequestWindow, requester: &str) {
    match summary.stop {
        StopReason::Completed => info!(
            target: "feed",
            requester, offset = window.offset, count = window.count,
            emitted = summary.emitted, batches = summary.batches,
            "feed window served"
        ),
        StopReason::Truncated { position } => {
            counter!("feed_truncated_total").increment(1);
            warn!(
                target: "feed",
                requester, offset = window.offset, count = window.count,
                emitted = summary.emitted, batches = summary.batches, position,
                "feed window truncated"
            );
        }
        StopReason::ConsumerGone => debug!(
            target: "feed",
            requester, emitted = summary.emitted,
            "consumer went away, feed aborted"
        ),
    }
}

/// Slot-ordered handles of one batch's primary fetches.
/// Dropping the group aborts whatever is still running.
struct BatchTasks {
    handles: Vec<JoinHandle<Result<Article>>>,
}

impl BatchTasks {
    fn with_capacity(n: usize) -> Self {
        Self {
            handles: Vec::with_capacity(n),
        }
    }

    fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = Result<Article>> + Send + 'static,
    {
        self.handles.push(tokio::spawn(fut));
    }

    /// Wait for the `n`-th spawned fetch. Each handle is joined at most once.
    async fn join(&mut self, n: usize) -> Result<Article> {
        let Some(handle) = self.handles.get_mut(n) else {
            bail!("no fetch task for batch index {n}");
        };
        match handle.await {
            Ok(res) => res,
            Err(e) if e.is_panic() => Err(anyhow!("fetch task panicked")),
            Err(e) => Err(anyhow!("fetch task cancelled: {e}")),
        }
    }
}

impl Drop for BatchTasks {
    fn drop(&mut self) {
        for h in &self.handles {
            h.abort();
        }
    }
}
