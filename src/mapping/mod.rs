//! Statement model: values, templates, bound SQL and the statement registry.

mod markers;
mod registry;
mod statement;
mod value;

use thiserror::Error;

pub use markers::{positional_markers, rewrite_markers};
pub use registry::StatementRegistry;
pub use statement::{BoundSql, CommandKind, MappedStatement, SqlCommandType};
pub use value::{Params, Row, RowBounds, SqlValue};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("unterminated `#{{` placeholder in `{template}`")]
    UnterminatedPlaceholder { template: String },
    #[error("empty `#{{}}` placeholder in `{template}`")]
    EmptyPlaceholder { template: String },
    #[error("statement `{id}` is already registered")]
    DuplicateStatement { id: String },
    #[error("statement `{statement}` requires parameter `{name}`")]
    MissingParameter { statement: String, name: String },
}
