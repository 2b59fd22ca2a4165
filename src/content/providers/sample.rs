// src/content/providers/sample.rs
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::content::types::{Article, ContentClient, ProviderId};

/// Stand-in for a real provider SDK: fabricates `count` articles tagged with
/// its own identity. Used by the default wiring and by tests.
#[derive(Debug, Clone)]
pub struct SampleContentProvider {
    pub source: ProviderId,
}

impl SampleContentProvider {
    pub fn new(source: impl Into<ProviderId>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

#[async_trait]
impl ContentClient for SampleContentProvider {
    async fn get_content(&self, _user_ip: &str, count: usize) -> Result<Vec<Article>> {
        let out = (0..count)
            .map(|_| Article {
                id: rand::random::<u64>().to_string(),
                title: "title".to_string(),
                source: self.source.clone(),
                summary: String::new(),
                link: String::new(),
                expiry: Utc::now(),
            })
            .collect();
        Ok(out)
    }
}
