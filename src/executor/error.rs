use thiserror::Error;

use crate::{
    mapping::{MappingError, SqlCommandType},
    plugin::Method,
};

/// Failure reported by a raw backend connection.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("data source unavailable: {message}")]
    Unavailable { message: String },
    #[error("statement `{statement_id}` is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        statement_id: String,
    },
    #[error("execution of `{statement_id}` failed: {message}")]
    Execution {
        statement_id: String,
        message: String,
    },
    #[error("column `{column}` could not be decoded: {message}")]
    Decode { column: String, message: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DataAccessError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn execution(statement_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            statement_id: statement_id.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("blocked full-table {command} on `{statement_id}`: {sql}")]
    PolicyViolation {
        statement_id: String,
        command: SqlCommandType,
        sql: String,
    },
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
    #[error("parameter binding failed: {0}")]
    Binding(#[from] MappingError),
    #[error("unknown statement `{id}`")]
    UnknownStatement { id: String },
    #[error("session is closed")]
    SessionClosed,
    #[error("`{method}` produced {actual} where {expected} was expected")]
    SignatureMismatch {
        method: Method,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("`{statement_id}` is a {actual} statement, expected {expected}")]
    CommandMismatch {
        statement_id: String,
        expected: &'static str,
        actual: SqlCommandType,
    },
    #[error("expected at most one row from `{statement_id}`, got {count}")]
    TooManyResults { statement_id: String, count: usize },
    #[error("interceptor `{name}` aborted the call: {message}")]
    Interceptor { name: &'static str, message: String },
}

impl ExecutorError {
    pub(crate) fn outcome_mismatch(
        method: Method,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::SignatureMismatch {
            method,
            expected,
            actual,
        }
    }

    pub fn interceptor(name: &'static str, message: impl Into<String>) -> Self {
        Self::Interceptor {
            name,
            message: message.into(),
        }
    }

    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Self::PolicyViolation { .. })
    }
}
