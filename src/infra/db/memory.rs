//! Seeded in-memory `t_user` table for local runs and tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use tracing::debug;

use crate::{
    application::users::statements,
    domain::user::UserRecord,
    executor::{Connection, DataAccessError, DataSource, PreparedStatement},
    mapping::Row,
};

const BACKEND: &str = "memory";
const RENAMED_TO: &str = "kubo";

/// Runs the `UserMapper` statements against an in-process table.
///
/// Statements are dispatched by id, not by parsing SQL. Every write is applied
/// immediately, so commit and rollback have nothing to do. Cloning shares the
/// table and the execution counters.
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Mutex<BTreeMap<i64, UserRecord>>,
    executions: Mutex<HashMap<String, usize>>,
    latency: Mutex<Option<Duration>>,
    unavailable: AtomicBool,
}

impl MemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table holding alice, bob and carol with ids 1 to 3.
    pub fn seeded() -> Self {
        let source = Self::new();
        for (id, username) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            source.insert(UserRecord {
                id,
                username: username.to_string(),
                email: Some(format!("{username}@example.com")),
            });
        }
        source
    }

    pub fn insert(&self, user: UserRecord) {
        lock(&self.inner.users).insert(user.id, user);
    }

    pub fn users(&self) -> Vec<UserRecord> {
        lock(&self.inner.users).values().cloned().collect()
    }

    /// Raw executions of `statement_id` seen so far.
    pub fn executions(&self, statement_id: &str) -> usize {
        lock(&self.inner.executions)
            .get(statement_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_executions(&self) -> usize {
        lock(&self.inner.executions).values().sum()
    }

    /// Sleep this long inside every statement.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.inner.latency) = latency;
    }

    /// Make `open` fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl DataSource for MemoryDataSource {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn open(&self) -> Result<Box<dyn Connection>, DataAccessError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(DataAccessError::unavailable(
                "in-memory table switched off",
            ));
        }
        Ok(Box::new(MemoryConnection {
            inner: Arc::clone(&self.inner),
        }))
    }
}

impl std::fmt::Debug for MemoryDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDataSource")
            .field("users", &lock(&self.inner.users).len())
            .field("executions", &self.total_executions())
            .finish()
    }
}

struct MemoryConnection {
    inner: Arc<Inner>,
}

impl MemoryConnection {
    fn record(&self, statement: &PreparedStatement) {
        *lock(&self.inner.executions)
            .entry(statement.statement_id().to_string())
            .or_default() += 1;
        debug!(
            target: "mapperlab::infra::db::memory",
            statement_id = statement.statement_id(),
            sql = statement.sql(),
            "Executing statement"
        );

        let latency = *lock(&self.inner.latency);
        if let Some(latency) = latency {
            thread::sleep(latency);
        }
    }
}

impl Connection for MemoryConnection {
    fn prepare(&mut self, statement: &PreparedStatement) -> Result<(), DataAccessError> {
        match statement.statement_id() {
            statements::FIND_BY_ID
            | statements::FIND_ALL
            | statements::UPDATE_ALL
            | statements::UPDATE_ONE
            | statements::DELETE_ALL => Ok(()),
            other => Err(DataAccessError::Unsupported {
                backend: BACKEND,
                statement_id: other.to_string(),
            }),
        }
    }

    fn query(&mut self, statement: &PreparedStatement) -> Result<Vec<Row>, DataAccessError> {
        self.record(statement);
        let users = lock(&self.inner.users);

        match statement.statement_id() {
            statements::FIND_BY_ID => {
                let id = statement
                    .values()
                    .first()
                    .and_then(|value| value.as_i64())
                    .ok_or_else(|| {
                        DataAccessError::execution(
                            statement.statement_id(),
                            "expected one integer parameter",
                        )
                    })?;
                Ok(users.get(&id).map(UserRecord::to_row).into_iter().collect())
            }
            statements::FIND_ALL => Ok(users.values().map(UserRecord::to_row).collect()),
            other => Err(DataAccessError::Unsupported {
                backend: BACKEND,
                statement_id: other.to_string(),
            }),
        }
    }

    fn execute(&mut self, statement: &PreparedStatement) -> Result<u64, DataAccessError> {
        self.record(statement);
        let mut users = lock(&self.inner.users);

        let affected = match statement.statement_id() {
            statements::UPDATE_ALL => {
                for user in users.values_mut() {
                    user.username = RENAMED_TO.to_string();
                }
                users.len()
            }
            statements::UPDATE_ONE => match users.get_mut(&1) {
                Some(user) => {
                    user.username = RENAMED_TO.to_string();
                    1
                }
                None => 0,
            },
            statements::DELETE_ALL => {
                let count = users.len();
                users.clear();
                count
            }
            other => {
                return Err(DataAccessError::Unsupported {
                    backend: BACKEND,
                    statement_id: other.to_string(),
                });
            }
        };
        Ok(affected as u64)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
