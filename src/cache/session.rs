//! Session-local (first level) result cache.

use std::collections::HashMap;

use metrics::counter;
use tracing::trace;

use crate::mapping::Row;

use super::{METRIC_L1_HIT, keys::CacheKey};

/// Results cached for the lifetime of one session.
///
/// Owned by the session and never shared, so it needs no locking.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: HashMap<CacheKey, Vec<Row>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Row>> {
        let hit = self.entries.get(key).cloned();
        if hit.is_some() {
            counter!(METRIC_L1_HIT).increment(1);
            trace!(statement_id = key.statement_id(), "Session cache hit");
        }
        hit
    }

    pub fn put(&mut self, key: CacheKey, rows: Vec<Row>) {
        self.entries.insert(key, rows);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
