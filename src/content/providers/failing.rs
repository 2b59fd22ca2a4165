// src/content/providers/failing.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::content::types::{Article, ContentClient, ProviderId};

/// Provider that never delivers. Handy for exercising fallback and truncation.
#[derive(Debug, Clone)]
pub struct ErrProvider {
    pub source: ProviderId,
}

impl ErrProvider {
    pub fn new(source: impl Into<ProviderId>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl ContentClient for ErrProvider {
    async fn get_content(&self, _user_ip: &str, _count: usize) -> Result<Vec<Article>> {
        Err(anyhow!("provider {} unavailable", self.source))
    }
}
