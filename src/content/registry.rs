// src/content/registry.rs
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ProviderKind, ServiceConfig};
use crate::content::providers::{http_json::HttpJsonProvider, sample::SampleContentProvider};
use crate::content::types::{ContentClient, ProviderId};

/// Provider identity → client. Read-only once the engine is built.
pub type ContentClients = HashMap<ProviderId, Arc<dyn ContentClient>>;

/// Wire a client for every provider the config declares, plus a sample client
/// for any identity the mix references without declaring it.
pub fn build_clients(cfg: &ServiceConfig) -> ContentClients {
    let http = reqwest::Client::new();
    let mut clients: ContentClients = HashMap::new();

    for p in &cfg.providers {
        let client: Arc<dyn ContentClient> = match (p.kind, p.url.as_deref()) {
            (ProviderKind::Http, Some(url)) => Arc::new(HttpJsonProvider::with_client(
                p.id.clone(),
                url,
                http.clone(),
            )),
            // config validation rejects http without url; treat as sample if it slips through
            _ => Arc::new(SampleContentProvider::new(p.id.clone())),
        };
        clients.insert(p.id.clone(), client);
    }

    for id in cfg.slots.provider_ids() {
        if !clients.contains_key(id) {
            tracing::debug!(provider = %id, "no provider declared, wiring sample client");
            clients.insert(id.clone(), Arc::new(SampleContentProvider::new(id.clone())));
        }
    }

    clients
}
