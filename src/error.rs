//! Structured error types for task operations.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    ParentNotFound,
    TaskArchived,
    ParentArchived,
    CircularReference,

    // Not found errors
    TaskNotFound,

    // Internal errors
    InternalError,
}

/// Errors surfaced by the task service.
///
/// Every variant except `Storage` is detected before any write happens.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Task not found")]
    TaskNotFound(String),

    #[error("Parent task not found")]
    ParentNotFound(String),

    #[error("Cannot modify archived task")]
    TaskArchived(String),

    #[error("Cannot use archived task as parent")]
    ParentArchived(String),

    #[error("Circular reference detected: task {task} cannot be placed under {parent}")]
    CircularReference { task: String, parent: String },

    #[error(transparent)]
    Storage(anyhow::Error),
}

impl TaskError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationError,
            Self::TaskNotFound(_) => ErrorCode::TaskNotFound,
            Self::ParentNotFound(_) => ErrorCode::ParentNotFound,
            Self::TaskArchived(_) => ErrorCode::TaskArchived,
            Self::ParentArchived(_) => ErrorCode::ParentArchived,
            Self::CircularReference { .. } => ErrorCode::CircularReference,
            Self::Storage(_) => ErrorCode::InternalError,
        }
    }

    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

// Allow using ? with anyhow errors from the store
impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TaskError>() {
            Ok(task_err) => task_err,
            Err(err) => TaskError::Storage(err),
        }
    }
}

/// Result type for task operations.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn anyhow_wrapping_task_error_is_unwrapped() {
        let err: anyhow::Error = TaskError::TaskNotFound("abc".into()).into();
        let task_err = TaskError::from(err);
        assert!(matches!(task_err, TaskError::TaskNotFound(ref id) if id == "abc"));
    }

    #[test]
    fn other_anyhow_errors_become_storage() {
        let task_err = TaskError::from(anyhow!("disk full"));
        assert_eq!(task_err.code(), ErrorCode::InternalError);
        assert!(!task_err.is_client_error());
    }

    #[test]
    fn codes_serialize_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::CircularReference).unwrap();
        assert_eq!(json, "\"CIRCULAR_REFERENCE\"");
    }

    #[test]
    fn validation_message_is_display() {
        let err = TaskError::validation("title", "Title must be at least 3 characters");
        assert_eq!(err.to_string(), "Title must be at least 3 characters");
        assert!(err.is_client_error());
    }
}
