//! Sessions: the caller-facing unit of work.

mod factory;

use std::{cell::Cell, marker::PhantomData, sync::Arc};

use tracing::{debug, warn};
use uuid::Uuid;

pub use factory::{SessionFactory, SessionFactoryBuilder};

use crate::{
    cache::{CacheKey, SessionCache},
    executor::{Executor, ExecutorError},
    mapping::{CommandKind, MappedStatement, Params, Row, RowBounds, StatementRegistry},
};

/// One unit of work against the executor pipeline.
///
/// A session owns its result cache and is confined to the thread using it:
/// it can move between threads but not be shared.
pub struct Session {
    id: Uuid,
    executor: Box<dyn Executor>,
    statements: Arc<StatementRegistry>,
    local_cache: SessionCache,
    dirty: bool,
    closed: bool,
    _not_sync: PhantomData<Cell<()>>,
}

impl Session {
    pub(crate) fn new(executor: Box<dyn Executor>, statements: Arc<StatementRegistry>) -> Self {
        let id = Uuid::new_v4();
        debug!(session_id = %id, "Opened session");
        Self {
            id,
            executor,
            statements,
            local_cache: SessionCache::new(),
            dirty: false,
            closed: false,
            _not_sync: PhantomData,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of results held by this session's cache.
    pub fn cached_results(&self) -> usize {
        self.local_cache.len()
    }

    pub fn select_list(
        &mut self,
        statement_id: &str,
        params: &Params,
    ) -> Result<Vec<Row>, ExecutorError> {
        self.select_list_bounded(statement_id, params, RowBounds::UNBOUNDED)
    }

    pub fn select_list_bounded(
        &mut self,
        statement_id: &str,
        params: &Params,
        bounds: RowBounds,
    ) -> Result<Vec<Row>, ExecutorError> {
        self.ensure_open()?;
        let statement = self.statement(statement_id, CommandKind::Read)?;

        let bound = statement.bound_sql(params)?;
        let key = CacheKey::new(&statement, &bound, bounds);
        if let Some(rows) = self.local_cache.get(&key) {
            return Ok(rows);
        }

        let rows = self.executor.query(&statement, params, bounds)?;
        self.local_cache.put(key, rows.clone());
        Ok(rows)
    }

    /// Run a read expected to yield at most one row.
    pub fn select_one(
        &mut self,
        statement_id: &str,
        params: &Params,
    ) -> Result<Option<Row>, ExecutorError> {
        let mut rows = self.select_list(statement_id, params)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(ExecutorError::TooManyResults {
                statement_id: statement_id.to_string(),
                count,
            }),
        }
    }

    /// Run a write. The session cache is cleared before the write runs.
    pub fn update(&mut self, statement_id: &str, params: &Params) -> Result<u64, ExecutorError> {
        self.ensure_open()?;
        let statement = self.statement(statement_id, CommandKind::Write)?;

        self.dirty = true;
        self.local_cache.clear();
        self.executor.update(&statement, params)
    }

    pub fn commit(&mut self, force: bool) -> Result<(), ExecutorError> {
        self.ensure_open()?;
        self.local_cache.clear();
        self.executor.commit(self.dirty || force)?;
        self.dirty = false;
        Ok(())
    }

    pub fn rollback(&mut self, force: bool) -> Result<(), ExecutorError> {
        self.ensure_open()?;
        self.local_cache.clear();
        self.executor.rollback(self.dirty || force)?;
        self.dirty = false;
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.local_cache.clear();
    }

    /// Close the session, rolling back uncommitted writes.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), ExecutorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.local_cache.clear();
        let result = self.executor.close(self.dirty);
        self.dirty = false;
        debug!(session_id = %self.id, "Closed session");
        result
    }

    fn ensure_open(&self) -> Result<(), ExecutorError> {
        if self.closed {
            Err(ExecutorError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn statement(
        &self,
        statement_id: &str,
        expected: CommandKind,
    ) -> Result<Arc<MappedStatement>, ExecutorError> {
        let statement =
            self.statements
                .get(statement_id)
                .ok_or_else(|| ExecutorError::UnknownStatement {
                    id: statement_id.to_string(),
                })?;
        if statement.kind() != expected {
            return Err(ExecutorError::CommandMismatch {
                statement_id: statement_id.to_string(),
                expected: match expected {
                    CommandKind::Read => "read",
                    CommandKind::Write => "write",
                },
                actual: statement.command(),
            });
        }
        Ok(statement)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(session_id = %self.id, error = %err, "Failed to close session on drop");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("cached_results", &self.local_cache.len())
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}
