//! Backend seam: connections that run prepared statements.

use crate::mapping::{Row, SqlCommandType, SqlValue, positional_markers};

use super::DataAccessError;

/// A statement ready to send to a connection.
///
/// Created by the statement handler's `prepare`, filled by the parameter
/// handler, then executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    statement_id: String,
    command: SqlCommandType,
    sql: String,
    values: Vec<SqlValue>,
}

impl PreparedStatement {
    pub fn new(
        statement_id: impl Into<String>,
        command: SqlCommandType,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            statement_id: statement_id.into(),
            command,
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    pub fn statement_id(&self) -> &str {
        &self.statement_id
    }

    pub fn command(&self) -> SqlCommandType {
        self.command
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn bind(&mut self, values: Vec<SqlValue>) {
        self.values = values;
    }

    /// Number of `?` markers in the SQL, not counting any inside literals.
    pub fn placeholder_count(&self) -> usize {
        positional_markers(&self.sql).count()
    }
}

pub trait Connection: Send {
    /// Check the statement can run on this connection.
    fn prepare(&mut self, _statement: &PreparedStatement) -> Result<(), DataAccessError> {
        Ok(())
    }

    fn query(&mut self, statement: &PreparedStatement) -> Result<Vec<Row>, DataAccessError>;

    fn execute(&mut self, statement: &PreparedStatement) -> Result<u64, DataAccessError>;

    fn commit(&mut self) -> Result<(), DataAccessError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataAccessError> {
        Ok(())
    }
}

pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn open(&self) -> Result<Box<dyn Connection>, DataAccessError>;
}
