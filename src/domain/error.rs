use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain entity `{entity}` not found")]
    NotFound { entity: &'static str },
    #[error("row is missing column `{column}`")]
    MissingColumn { column: &'static str },
    #[error("column `{column}` holds {actual}, expected {expected}")]
    ColumnType {
        column: &'static str,
        expected: &'static str,
        actual: String,
    },
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn column_type(column: &'static str, expected: &'static str, actual: impl Into<String>) -> Self {
        Self::ColumnType {
            column,
            expected,
            actual: actual.into(),
        }
    }
}
