// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::num::IntErrorKind;
use std::path::{Path, PathBuf};

use crate::content::ProviderId;
use crate::engine::EngineSettings;
use crate::mix::ContentMix;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_TOML: &str = "config/content_mix.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/content_mix.json";

pub const ENV_CONFIG_PATH: &str = "CONTENT_MIX_CONFIG_PATH";
pub const ENV_FETCH_TIMEOUT_MS: &str = "CONTENT_MIX_FETCH_TIMEOUT_MS";
pub const ENV_CHANNEL_CAPACITY: &str = "CONTENT_MIX_CHANNEL_CAPACITY";

/// How a provider identity is backed at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Sample,
    Http,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderCfg {
    pub id: ProviderId,
    #[serde(default)]
    pub kind: ProviderKind,
    /// Required for `kind = "http"`.
    #[serde(default)]
    pub url: Option<String>,
}

/// Everything the service needs at boot: the mix, provider wiring, engine knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "ContentMix::default_mix")]
    pub slots: ContentMix,
    #[serde(default)]
    pub providers: Vec<ProviderCfg>,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            slots: ContentMix::default_mix(),
            providers: Vec::new(),
            engine: EngineSettings::default(),
        }
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading content mix config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing {}", path.display()))?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $CONTENT_MIX_CONFIG_PATH
/// 2) config/content_mix.toml
/// 3) config/content_mix.json
/// 4) built-in default mix
///
/// Env overrides for engine knobs are applied on top in every case.
pub fn load_config_default() -> Result<ServiceConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from(DEFAULT_CONFIG_TOML);
        let json_p = PathBuf::from(DEFAULT_CONFIG_JSON);
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            tracing::info!("no content mix config found, using built-in default mix");
            ServiceConfig::default()
        }
    };

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn parse_config(s: &str, hint_ext: &str) -> Result<ServiceConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        // Unknown extension: JSON documents start with `{`, anything else is TOML.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}

fn validate(cfg: &ServiceConfig) -> Result<()> {
    for p in &cfg.providers {
        if p.kind == ProviderKind::Http && p.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            anyhow::bail!("provider {} is kind=http but has no url", p.id);
        }
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ServiceConfig) {
    if let Some(ms) = parse_u64_env(std::env::var(ENV_FETCH_TIMEOUT_MS).ok()) {
        cfg.engine.fetch_timeout_ms = Some(ms);
    }
    if let Some(cap) = parse_u64_env(std::env::var(ENV_CHANNEL_CAPACITY).ok()) {
        cfg.engine.channel_capacity = usize::try_from(cap).unwrap_or(usize::MAX).max(1);
    }
}

// parse optional unsigned env; too large saturates, garbage is ignored
fn parse_u64_env(raw: Option<String>) -> Option<u64> {
    let raw = raw?;
    let s = raw.trim();
    match s.parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => {
            tracing::warn!(value = s, "config knob too large, saturated");
            Some(u64::MAX)
        }
        Err(e) => {
            tracing::warn!(value = s, error = %e, "ignoring malformed config knob");
            None
        }
    }
}
