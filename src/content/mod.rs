// src/content/mod.rs
pub mod providers;
pub mod registry;
pub mod types;

pub use types::{Article, ContentClient, ProviderId};
