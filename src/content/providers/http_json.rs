// src/content/providers/http_json.rs
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::content::types::{Article, ContentClient, ProviderId};

/// Upstream that speaks plain JSON over HTTP:
/// `GET <url>?count=N&user_ip=<ip>` → `[Article, ...]`.
pub struct HttpJsonProvider {
    source: ProviderId,
    url: String,
    client: reqwest::Client,
}

impl HttpJsonProvider {
    pub fn new(source: impl Into<ProviderId>, url: impl Into<String>) -> Self {
        Self::with_client(source, url, reqwest::Client::new())
    }

    /// Share one connection pool across providers.
    pub fn with_client(
        source: impl Into<ProviderId>,
        url: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            source: source.into(),
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl ContentClient for HttpJsonProvider {
    async fn get_content(&self, user_ip: &str, count: usize) -> Result<Vec<Article>> {
        let count_s = count.to_string();
        let resp = match self
            .client
            .get(&self.url)
            .query(&[("count", count_s.as_str()), ("user_ip", user_ip)])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = ?e, provider = %self.source, "provider http error");
                return Err(e).with_context(|| format!("{} http get()", self.source));
            }
        };

        let resp = resp
            .error_for_status()
            .with_context(|| format!("{} upstream status", self.source))?;

        let mut items: Vec<Article> = resp
            .json()
            .await
            .with_context(|| format!("decoding {} articles", self.source))?;
        // articles are attributed to the provider that served them
        for item in &mut items {
            item.source = self.source.clone();
        }
        Ok(items)
    }
}
