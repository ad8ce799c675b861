//! Namespace-scoped (second level) result cache shared across sessions.

use std::sync::Mutex;

use lru::LruCache;
use metrics::counter;
use tracing::{debug, trace};

use crate::mapping::Row;

use super::{
    METRIC_L2_EVICT, METRIC_L2_FLUSH, METRIC_L2_HIT, METRIC_L2_MISS,
    config::{CacheConfig, EvictionPolicy},
    keys::CacheKey,
    lock::lock_state,
};

/// Opaque flush counter observed before a miss is resolved.
///
/// A result may only be stored under the generation it was read in; a flush in
/// between bumps the generation and the late insert is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

struct State {
    entries: LruCache<CacheKey, Vec<Row>>,
    generation: u64,
}

pub struct NamespaceCache {
    namespace: String,
    policy: EvictionPolicy,
    state: Mutex<State>,
}

impl NamespaceCache {
    pub fn new(namespace: impl Into<String>, config: &CacheConfig) -> Self {
        Self {
            namespace: namespace.into(),
            policy: config.eviction_policy,
            state: Mutex::new(State {
                entries: LruCache::new(config.capacity_non_zero()),
                generation: 0,
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Row>> {
        let mut state = lock_state(&self.state, &self.namespace, "get");
        let hit = match self.policy {
            EvictionPolicy::Lru => state.entries.get(key).cloned(),
            EvictionPolicy::Fifo => state.entries.peek(key).cloned(),
        };
        drop(state);

        let namespace = self.namespace.clone();
        if hit.is_some() {
            counter!(METRIC_L2_HIT, "namespace" => namespace).increment(1);
            trace!(namespace = %self.namespace, statement_id = key.statement_id(), "Namespace cache hit");
        } else {
            counter!(METRIC_L2_MISS, "namespace" => namespace).increment(1);
        }
        hit
    }

    pub fn generation(&self) -> Generation {
        Generation(lock_state(&self.state, &self.namespace, "generation").generation)
    }

    /// Store `rows` if no flush happened since `observed` was read.
    ///
    /// Returns whether the entry was stored.
    pub fn put(&self, key: CacheKey, rows: Vec<Row>, observed: Generation) -> bool {
        let mut state = lock_state(&self.state, &self.namespace, "put");
        if state.generation != observed.0 {
            debug!(
                namespace = %self.namespace,
                statement_id = key.statement_id(),
                observed = observed.0,
                current = state.generation,
                "Discarded namespace cache insert computed before a flush"
            );
            return false;
        }

        let inserted = key.clone();
        let evicted = state
            .entries
            .push(key, rows)
            .filter(|(old_key, _)| *old_key != inserted);
        drop(state);

        if let Some((evicted_key, _)) = evicted {
            counter!(METRIC_L2_EVICT, "namespace" => self.namespace.clone()).increment(1);
            trace!(
                namespace = %self.namespace,
                evicted = evicted_key.statement_id(),
                "Namespace cache evicted entry at capacity"
            );
        }
        true
    }

    /// Drop every entry and invalidate in-flight inserts.
    pub fn flush(&self) {
        let mut state = lock_state(&self.state, &self.namespace, "flush");
        let dropped = state.entries.len();
        state.entries.clear();
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        counter!(METRIC_L2_FLUSH, "namespace" => self.namespace.clone()).increment(1);
        debug!(namespace = %self.namespace, dropped, generation, "Namespace cache flushed");
    }

    pub fn len(&self) -> usize {
        lock_state(&self.state, &self.namespace, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        lock_state(&self.state, &self.namespace, "capacity").entries.cap().get()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock_state(&self.state, &self.namespace, "contains")
            .entries
            .contains(key)
    }
}

impl std::fmt::Debug for NamespaceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceCache")
            .field("namespace", &self.namespace)
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::mapping::{MappedStatement, Params, RowBounds, SqlCommandType, SqlValue};

    fn key(id: i64) -> CacheKey {
        let statement = MappedStatement::new(
            "UserMapper",
            "findById",
            SqlCommandType::Select,
            "select * from t_user where id = #{id}",
        )
        .expect("valid");
        let bound = statement
            .bound_sql(&Params::new().with("id", id))
            .expect("bound");
        CacheKey::new(&statement, &bound, RowBounds::UNBOUNDED)
    }

    fn rows(id: i64) -> Vec<Row> {
        vec![Row::from([("id".to_string(), SqlValue::Int(id))])]
    }

    fn cache(capacity: usize, eviction_policy: EvictionPolicy) -> NamespaceCache {
        NamespaceCache::new(
            "UserMapper",
            &CacheConfig {
                enabled: true,
                capacity,
                eviction_policy,
            },
        )
    }

    #[test]
    fn overflow_evicts_least_recently_accessed() {
        let cache = cache(2, EvictionPolicy::Lru);
        let generation = cache.generation();
        assert!(cache.put(key(1), rows(1), generation));
        assert!(cache.put(key(2), rows(2), generation));

        // Touch 1 so that 2 becomes the eviction candidate.
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.put(key(3), rows(3), generation));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn fifo_ignores_reads() {
        let cache = cache(2, EvictionPolicy::Fifo);
        let generation = cache.generation();
        cache.put(key(1), rows(1), generation);
        cache.put(key(2), rows(2), generation);

        assert!(cache.get(&key(1)).is_some());
        cache.put(key(3), rows(3), generation);

        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn reinserting_a_key_does_not_count_as_eviction() {
        let cache = cache(1, EvictionPolicy::Lru);
        let generation = cache.generation();
        cache.put(key(1), rows(1), generation);
        cache.put(key(1), rows(10), generation);
        assert_eq!(cache.get(&key(1)), Some(rows(10)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_observed_before_flush_is_discarded() {
        let cache = cache(8, EvictionPolicy::Lru);
        let stale = cache.generation();
        cache.flush();

        assert!(!cache.put(key(1), rows(1), stale));
        assert!(cache.is_empty());

        assert!(cache.put(key(1), rows(1), cache.generation()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn never_exceeds_capacity_under_contention() {
        let cache = Arc::new(cache(16, EvictionPolicy::Lru));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let id = worker * 1000 + i;
                        let generation = cache.generation();
                        cache.put(key(id), rows(id), generation);
                        if i % 37 == 0 {
                            cache.flush();
                        }
                        assert!(cache.len() <= 16);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread");
        }
        assert!(cache.len() <= cache.capacity());
    }
}
