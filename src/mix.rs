//! # Content Mix
//! The ordered slot sequence that defines how providers are interleaved.
//!
//! Logical feed position `n` always maps to slot `n % P`, where `P` is the
//! number of slots (the round-robin period). Offsets move the starting
//! position inside that pattern; they never change the pattern itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::content::ProviderId;

/// One position in the mix: a primary provider and an optional stand-in used
/// when the primary fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixSlot {
    pub primary: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ProviderId>,
}

impl MixSlot {
    pub fn new(primary: impl Into<ProviderId>, fallback: Option<&str>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.map(ProviderId::from),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentMix {
    slots: Vec<MixSlot>,
}

impl ContentMix {
    pub fn new(slots: Vec<MixSlot>) -> Self {
        Self { slots }
    }

    /// Round-robin period `P`.
    pub fn period(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[MixSlot] {
        &self.slots
    }

    /// Slot serving logical feed position `position`.
    pub fn slot_for(&self, position: usize) -> Option<&MixSlot> {
        if self.slots.is_empty() {
            return None;
        }
        self.slots.get(position % self.slots.len())
    }

    /// Every provider the mix may call, primaries and fallbacks alike.
    pub fn provider_ids(&self) -> BTreeSet<&ProviderId> {
        let mut out = BTreeSet::new();
        for s in &self.slots {
            out.insert(&s.primary);
            if let Some(fb) = &s.fallback {
                out.insert(fb);
            }
        }
        out
    }

    /// Built-in mix over providers "1", "2" and "3".
    ///
    /// Pattern: `A A B C D A A B` where
    /// A = 1 (fallback 2), B = 2 (fallback 3), C = 3 (fallback 1), D = 1 (no fallback).
    pub fn default_mix() -> Self {
        let a = MixSlot::new("1", Some("2"));
        let b = MixSlot::new("2", Some("3"));
        let c = MixSlot::new("3", Some("1"));
        let d = MixSlot::new("1", None);
        Self::new(vec![
            a.clone(),
            a.clone(),
            b.clone(),
            c,
            d,
            a.clone(),
            a,
            b,
        ])
    }
}
