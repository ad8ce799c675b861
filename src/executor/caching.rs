use std::{collections::BTreeSet, sync::Arc};

use tracing::trace;

use crate::{
    cache::{CacheKey, CacheRegistry},
    mapping::{MappedStatement, Params, Row, RowBounds},
    plugin::{Node, NodeKind},
};

use super::{Executor, ExecutorError};

/// Decorator adding the namespace cache in front of another executor.
///
/// A write flushes its namespace before and after it runs, and again when the
/// session commits, rolls back or closes. Reads of cache-enabled statements are
/// answered from the namespace cache when possible, otherwise delegated and
/// stored, unless a flush raced the delegated read.
pub struct CachingExecutor<E> {
    delegate: E,
    caches: Arc<CacheRegistry>,
    /// Namespaces written since the last commit or rollback.
    pending: BTreeSet<String>,
}

impl<E: Executor> CachingExecutor<E> {
    pub fn new(delegate: E, caches: Arc<CacheRegistry>) -> Self {
        Self {
            delegate,
            caches,
            pending: BTreeSet::new(),
        }
    }

    /// Flush every namespace written since the last commit or rollback.
    fn flush_pending(&mut self) {
        for namespace in std::mem::take(&mut self.pending) {
            if let Some(cache) = self.caches.get(&namespace) {
                cache.flush();
            }
        }
    }
}

impl<E> Node for CachingExecutor<E> {
    fn kind(&self) -> NodeKind {
        NodeKind::CachingExecutor
    }
}

impl<E: Executor> Executor for CachingExecutor<E> {
    fn update(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
    ) -> Result<u64, ExecutorError> {
        let Some(cache) = self.caches.get(statement.namespace()) else {
            return self.delegate.update(statement, params);
        };

        cache.flush();
        let result = self.delegate.update(statement, params);
        cache.flush();
        if result.is_ok() {
            self.pending.insert(statement.namespace().to_string());
        }
        result
    }

    fn query(
        &mut self,
        statement: &Arc<MappedStatement>,
        params: &Params,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError> {
        let cache = match self.caches.get(statement.namespace()) {
            Some(cache) if statement.use_cache() => cache,
            _ => return self.delegate.query(statement, params, bounds),
        };

        let bound = statement.bound_sql(params)?;
        let key = CacheKey::new(statement, &bound, bounds);
        if let Some(rows) = cache.get(&key) {
            return Ok(rows);
        }

        let generation = cache.generation();
        let rows = self.delegate.query(statement, params, bounds)?;
        if !cache.put(key, rows.clone(), generation) {
            trace!(
                statement_id = statement.id(),
                "Result not cached; namespace flushed during read"
            );
        }
        Ok(rows)
    }

    fn commit(&mut self, required: bool) -> Result<(), ExecutorError> {
        let result = self.delegate.commit(required);
        self.flush_pending();
        result
    }

    fn rollback(&mut self, required: bool) -> Result<(), ExecutorError> {
        let result = self.delegate.rollback(required);
        self.flush_pending();
        result
    }

    fn close(&mut self, force_rollback: bool) -> Result<(), ExecutorError> {
        let result = self.delegate.close(force_rollback);
        self.flush_pending();
        result
    }

    fn is_closed(&self) -> bool {
        self.delegate.is_closed()
    }
}
