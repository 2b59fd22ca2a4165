// src/content/types.rs
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identity of one upstream content source (e.g. "1", "newsdesk").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One piece of content fetched from a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub source: ProviderId, // provider the item actually came from
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub link: String,
    pub expiry: DateTime<Utc>,
}

/// A provider's client or SDK.
///
/// Implementations must tolerate concurrent calls: the feed engine fires one
/// request per mix slot at the same time, often several against one client.
#[async_trait::async_trait]
pub trait ContentClient: Send + Sync {
    /// Fetch `count` items on behalf of `user_ip`.
    async fn get_content(&self, user_ip: &str, count: usize) -> Result<Vec<Article>>;
}
