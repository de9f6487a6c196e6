use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::ingest::export::ExportError;
use crate::ingest::parser::{CsvError, ValidationError};
use crate::models::message::ParseEnumError;
use crate::pipeline::processor::ProcessingError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Batch exhausted: {message}")]
    BatchExhausted { message: String, details: Value },

    /// The generative-text service failed on a single-item request.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A save failed after the message text was generated; the text is returned.
    #[error("Persistence error: {message}")]
    Persistence { message: String, details: Value },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            details: None,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<CsvError> for AppError {
    fn from(err: CsvError) -> Self {
        let message = err.to_string();
        match err {
            CsvError::EmptyInput => AppError::validation(message),
            CsvError::NoValidEntries { errors } => AppError::Validation {
                message,
                details: Some(json!({ "rows": errors })),
            },
        }
    }
}

impl From<ParseEnumError> for AppError {
    fn from(err: ParseEnumError) -> Self {
        AppError::validation(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::validation(format!("Invalid upload: {}", err.body_text()))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MessageNotFound(_) | StoreError::ProfileNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            StoreError::InvalidTransition(e) => AppError::InvalidTransition(e.to_string()),
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Corrupt(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        let message = err.to_string();
        match err {
            ProcessingError::Validation(e) => e.into(),
            ProcessingError::Resolution { .. } | ProcessingError::Generation { .. } => {
                AppError::Upstream(message)
            }
            ProcessingError::Persistence {
                identifier,
                body,
                source,
            } => {
                tracing::error!("Saving message for '{identifier}' failed: {source}");
                AppError::Persistence {
                    message,
                    details: json!({ "identifier": identifier, "body": body }),
                }
            }
            ProcessingError::BatchExhausted { failures } => AppError::BatchExhausted {
                message,
                details: json!({ "failures": failures }),
            },
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NoData => AppError::NotFound(err.to_string()),
            ExportError::Serialize(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message, details)
            }
            AppError::InvalidTransition(msg) => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", msg, None)
            }
            AppError::BatchExhausted { message, details } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "BATCH_EXHAUSTED",
                message,
                Some(details),
            ),
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg, None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    None,
                )
            }
            AppError::Persistence { message, details } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                message,
                Some(details),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let Some(details) = details {
            error["details"] = details;
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::MessageStatus;
    use crate::pipeline::processor::ItemFailure;
    use crate::review::state_machine::{InvalidTransition, ReviewAction};

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::from(CsvError::EmptyInput), StatusCode::BAD_REQUEST),
            (
                AppError::from(StoreError::MessageNotFound(uuid::Uuid::nil())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(StoreError::InvalidTransition(InvalidTransition {
                    from: MessageStatus::Rejected,
                    action: ReviewAction::Approve,
                })),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(StoreError::Database(sqlx::Error::PoolTimedOut)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::from(ProcessingError::BatchExhausted { failures: vec![] }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_exhausted_batch_carries_failures() {
        let err = AppError::from(ProcessingError::BatchExhausted {
            failures: vec![ItemFailure {
                index: 0,
                identifier: "john-doe".to_string(),
                error: "boom".to_string(),
                generated_body: None,
            }],
        });
        match err {
            AppError::BatchExhausted { details, .. } => {
                assert_eq!(details["failures"][0]["identifier"], "john-doe");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
