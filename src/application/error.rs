use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mapperlab_api_types::{ErrorBody, ErrorMessage, codes};
use thiserror::Error;

use crate::{
    domain::error::DomainError, executor::ExecutorError, infra::error::InfraError,
    mapping::MappingError,
};

/// Error chain captured for the response logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("statement declaration failed: {0}")]
    Mapping(#[from] MappingError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Executor(ExecutorError::PolicyViolation { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Executor(ExecutorError::DataAccess(_))
            | AppError::Infra(InfraError::Database { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Executor(_)
            | AppError::Domain(_)
            | AppError::Infra(_)
            | AppError::Mapping(_)
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) => codes::NOT_FOUND,
            AppError::Executor(ExecutorError::PolicyViolation { .. }) => codes::POLICY_VIOLATION,
            AppError::Executor(ExecutorError::DataAccess(_))
            | AppError::Infra(InfraError::Database { .. }) => codes::DATA_ACCESS,
            AppError::Executor(
                ExecutorError::UnknownStatement { .. }
                | ExecutorError::CommandMismatch { .. }
                | ExecutorError::Binding(_),
            )
            | AppError::Mapping(_) => codes::INVALID_STATEMENT,
            _ => codes::INTERNAL,
        }
    }

    fn presentation_message(&self) -> String {
        match self {
            AppError::Domain(DomainError::NotFound { entity }) => format!("{entity} not found"),
            AppError::Executor(ExecutorError::PolicyViolation { command, .. }) => {
                format!("{command} without WHERE or LIMIT is not allowed")
            }
            AppError::Executor(ExecutorError::DataAccess(_))
            | AppError::Infra(InfraError::Database { .. }) => {
                "Service temporarily unavailable".to_string()
            }
            _ => "Unexpected error occurred".to_string(),
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            AppError::Executor(ExecutorError::PolicyViolation { statement_id, .. }) => {
                Some(format!("statement `{statement_id}` was blocked before execution"))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorMessage {
                code: self.code().to_string(),
                message: self.presentation_message(),
                hint: self.hint(),
            },
        };
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{executor::DataAccessError, mapping::SqlCommandType};

    #[test]
    fn policy_violation_is_unprocessable() {
        let error = AppError::from(ExecutorError::PolicyViolation {
            statement_id: "UserMapper.updateAll".to_string(),
            command: SqlCommandType::Update,
            sql: "update t_user set username = 'kubo'".to_string(),
        });
        assert_eq!(error.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error.code(), codes::POLICY_VIOLATION);
        assert!(error.hint().is_some_and(|hint| hint.contains("UserMapper.updateAll")));
    }

    #[test]
    fn missing_user_is_not_found() {
        let error = AppError::from(DomainError::not_found("user"));
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(error.presentation_message(), "user not found");
    }

    #[test]
    fn backend_failure_is_unavailable() {
        let error = AppError::from(ExecutorError::from(DataAccessError::unavailable(
            "connection refused",
        )));
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn report_keeps_error_chain() {
        let error = AppError::from(ExecutorError::from(MappingError::MissingParameter {
            statement: "UserMapper.findById".to_string(),
            name: "id".to_string(),
        }));
        let report = ErrorReport::from_error("test", error.status_code(), &error);
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(report.messages[0].contains("parameter binding failed"));
    }
}
