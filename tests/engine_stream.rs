// tests/engine_stream.rs
//
// Engine ↔ consumer handoff: bounded buffering, disconnects, abort of in-flight fetches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_stream::StreamExt;

use article_mix_feed::content::providers::sample::SampleContentProvider;
use article_mix_feed::content::registry::ContentClients;
use article_mix_feed::{
    Article, BatchEngine, ContentClient, ContentMix, EngineSettings, MixSlot, RequestWindow,
};

/// Sample provider that counts calls.
struct Counting {
    inner: SampleContentProvider,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentClient for Counting {
    async fn get_content(&self, user_ip: &str, count: usize) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_content(user_ip, count).await
    }
}

struct DropFlag(Arc<AtomicUsize>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Never answers. Records when a call starts and when its future is dropped.
struct Hanging {
    started: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

#[async_trait]
impl ContentClient for Hanging {
    async fn get_content(&self, _user_ip: &str, _count: usize) -> Result<Vec<Article>> {
        let _flag = DropFlag(self.dropped.clone());
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<Result<Vec<Article>>>().await
    }
}

async fn wait_until(counter: &AtomicUsize, want: usize) -> bool {
    for _ in 0..200 {
        if counter.load(Ordering::SeqCst) >= want {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}

#[tokio::test]
async fn slow_consumer_holds_the_engine_back() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut clients: ContentClients = HashMap::new();
    clients.insert(
        "a".into(),
        Arc::new(Counting {
            inner: SampleContentProvider::new("a"),
            calls: calls.clone(),
        }),
    );
    let settings = EngineSettings {
        channel_capacity: 1,
        ..EngineSettings::default()
    };
    let mix = ContentMix::new(vec![MixSlot::new("a", None)]);
    let engine = BatchEngine::new(mix, clients, settings).unwrap();

    let mut stream = engine.stream(RequestWindow::new(0, 100), "10.0.0.1");
    let first = stream.next().await.expect("first article");
    assert_eq!(first.source.as_str(), "a");

    tokio::time::sleep(Duration::from_millis(50)).await;
    // received + buffered + one blocked on send
    assert!(calls.load(Ordering::SeqCst) <= 3, "engine ran ahead: {calls:?}");

    let rest: Vec<Article> = stream.collect().await;
    assert_eq!(rest.len(), 99);
    assert_eq!(calls.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn dropping_the_stream_aborts_in_flight_fetches() {
    let started = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));

    let mut clients: ContentClients = HashMap::new();
    clients.insert("fast".into(), Arc::new(SampleContentProvider::new("fast")));
    clients.insert(
        "hang".into(),
        Arc::new(Hanging {
            started: started.clone(),
            dropped: dropped.clone(),
        }),
    );
    let mix = ContentMix::new(vec![MixSlot::new("fast", None), MixSlot::new("hang", None)]);
    let engine = BatchEngine::new(mix, clients, EngineSettings::default()).unwrap();

    let mut stream = engine.stream(RequestWindow::new(0, 2), "10.0.0.2");
    let first = stream.next().await.expect("first article");
    assert_eq!(first.source.as_str(), "fast");
    assert!(wait_until(&started, 1).await, "hanging fetch never started");
    assert_eq!(dropped.load(Ordering::SeqCst), 0);

    drop(stream);
    assert!(
        wait_until(&dropped, 1).await,
        "in-flight fetch was not aborted after the consumer left"
    );
}

#[tokio::test]
async fn reaching_count_aborts_remaining_batch_fetches() {
    // Slot 1 hangs, but with count=1 it is never launched.
    let started = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    let mut clients: ContentClients = HashMap::new();
    clients.insert("fast".into(), Arc::new(SampleContentProvider::new("fast")));
    clients.insert(
        "hang".into(),
        Arc::new(Hanging {
            started: started.clone(),
            dropped,
        }),
    );
    let mix = ContentMix::new(vec![MixSlot::new("fast", None), MixSlot::new("hang", None)]);
    let engine = BatchEngine::new(mix, clients, EngineSettings::default()).unwrap();

    let items = tokio::time::timeout(
        Duration::from_secs(5),
        engine.collect(RequestWindow::new(0, 1), "t"),
    )
    .await
    .expect("window of one must not wait on the hanging slot");
    assert_eq!(items.len(), 1);
    assert_eq!(started.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn independent_engines_run_side_by_side() {
    let mk = |id: &'static str| {
        let mut clients: ContentClients = HashMap::new();
        clients.insert(id.into(), Arc::new(SampleContentProvider::new(id)));
        BatchEngine::new(
            ContentMix::new(vec![MixSlot::new(id, None)]),
            clients,
            EngineSettings::default(),
        )
        .unwrap()
    };
    let (left, right) = (mk("left"), mk("right"));

    let (a, b) = tokio::join!(
        left.collect(RequestWindow::new(0, 5), "t"),
        right.collect(RequestWindow::new(0, 7), "t"),
    );
    assert!(a.iter().all(|x| x.source.as_str() == "left") && a.len() == 5);
    assert!(b.iter().all(|x| x.source.as_str() == "right") && b.len() == 7);
}
