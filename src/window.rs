//! Request window normalization: raw `offset` / `count` query values in,
//! non-negative integers out. Clamping is silent to the caller and only shows
//! up in logs and the `feed_request_clamped_total` counter.

use metrics::counter;
use std::collections::HashMap;
use std::num::IntErrorKind;
use tracing::{debug, warn};

/// Normalized `(offset, count)` pair for one feed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestWindow {
    pub offset: usize,
    pub count: usize,
}

impl RequestWindow {
    pub fn new(offset: usize, count: usize) -> Self {
        Self { offset, count }
    }

    /// Normalize raw parameter values. Missing, malformed or negative → 0;
    /// numbers too large to represent saturate at `usize::MAX`.
    pub fn from_raw(offset: Option<&str>, count: Option<&str>) -> Self {
        Self {
            offset: normalize_param("offset", offset),
            count: normalize_param("count", count),
        }
    }

    pub fn from_query(q: &HashMap<String, String>) -> Self {
        Self::from_raw(
            q.get("offset").map(String::as_str),
            q.get("count").map(String::as_str),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

fn normalize_param(name: &'static str, raw: Option<&str>) -> usize {
    let s = match raw.map(str::trim) {
        None | Some("") => {
            debug!(target: "feed", param = name, "missing parameter, using 0");
            return 0;
        }
        Some(s) => s,
    };

    match s.parse::<i64>() {
        Ok(v) if v < 0 => {
            warn!(target: "feed", param = name, value = v, "negative parameter clamped to 0");
            counter!("feed_request_clamped_total", "param" => name).increment(1);
            0
        }
        Ok(v) => usize::try_from(v).unwrap_or_else(|_| saturate(name, s)),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => saturate(name, s),
        Err(e) if *e.kind() == IntErrorKind::NegOverflow => {
            warn!(target: "feed", param = name, raw = s, "negative parameter clamped to 0");
            counter!("feed_request_clamped_total", "param" => name).increment(1);
            0
        }
        Err(e) => {
            warn!(target: "feed", param = name, raw = s, error = %e, "malformed parameter, using 0");
            counter!("feed_request_clamped_total", "param" => name).increment(1);
            0
        }
    }
}

fn saturate(name: &'static str, raw: &str) -> usize {
    warn!(target: "feed", param = name, raw, "parameter too large, saturated");
    counter!("feed_request_clamped_total", "param" => name).increment(1);
    usize::MAX
}
