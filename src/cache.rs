//! Score cache.
//!
//! Keyed by entrant number, mode, and a fingerprint of the inputs the
//! pure scoring path consumes (feature vector, odds, class rise, pace
//! factor). A hit is only
//! returned when the fingerprint matches, so stale entries can never
//! leak across input changes. Cleared at the start of every run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::scoring::ScoreBreakdown;
use crate::types::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entrant: u32,
    pub mode: Mode,
    pub fingerprint: u64,
}

#[derive(Clone)]
pub struct ScoreCache {
    entries: Arc<Mutex<HashMap<CacheKey, ScoreBreakdown>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<ScoreBreakdown> {
        let hit = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .copied();
        match hit {
            Some(breakdown) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(breakdown)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, breakdown: ScoreBreakdown) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, breakdown);
    }

    /// Drop all entries. Called at the start of each evaluation run.
    pub fn clear(&self) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !entries.is_empty() {
            debug!(dropped = entries.len(), "Score cache cleared");
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
