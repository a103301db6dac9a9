//! Error types for stackd

use http::StatusCode;
use thiserror::Error;

/// Failure of a stack operation.
///
/// Each variant maps to one status category; `message()` is the one-line summary shown to
/// callers and `details()` the underlying cause, when there is one.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Invalid request payload: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("{context}: {cause}")]
    Storage { context: String, cause: String },

    #[error("Stack file rejected by endpoint security settings: {0}")]
    PolicyViolation(String),

    #[error("{cause}{}", secondary_suffix(.secondary))]
    Deployment {
        cause: String,
        /// Logout failure that followed the deployment failure
        secondary: Option<String>,
    },

    #[error("{context}: {cause}")]
    Persistence { context: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn secondary_suffix(secondary: &Option<String>) -> String {
    match secondary {
        Some(logout) => format!(" (registry logout also failed: {})", logout),
        None => String::new(),
    }
}

impl StackError {
    pub fn storage(context: impl Into<String>, cause: impl ToString) -> Self {
        StackError::Storage {
            context: context.into(),
            cause: cause.to_string(),
        }
    }

    pub fn persistence(context: impl Into<String>, cause: impl ToString) -> Self {
        StackError::Persistence {
            context: context.into(),
            cause: cause.to_string(),
        }
    }

    pub fn deployment(cause: impl ToString) -> Self {
        StackError::Deployment {
            cause: cause.to_string(),
            secondary: None,
        }
    }

    /// HTTP status category of the error
    pub fn status_code(&self) -> StatusCode {
        match self {
            StackError::Validation(_) => StatusCode::BAD_REQUEST,
            StackError::Conflict(_) => StatusCode::CONFLICT,
            StackError::NotFound(_) => StatusCode::NOT_FOUND,
            StackError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            StackError::Forbidden(_) => StatusCode::FORBIDDEN,
            StackError::Storage { .. }
            | StackError::PolicyViolation(_)
            | StackError::Deployment { .. }
            | StackError::Persistence { .. }
            | StackError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// One-line summary
    pub fn message(&self) -> String {
        match self {
            StackError::Validation(_) => "Invalid request payload".to_string(),
            StackError::Storage { context, .. } | StackError::Persistence { context, .. } => {
                context.clone()
            }
            StackError::Deployment { cause, .. } => cause.clone(),
            other => other.to_string(),
        }
    }

    /// Underlying cause, when it is not already part of the message
    pub fn details(&self) -> Option<String> {
        match self {
            StackError::Validation(reason) => Some(reason.clone()),
            StackError::Storage { cause, .. } | StackError::Persistence { cause, .. } => {
                Some(cause.clone())
            }
            StackError::Deployment {
                secondary: Some(logout),
                ..
            } => Some(format!("registry logout also failed: {}", logout)),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for StackError {
    fn from(err: anyhow::Error) -> Self {
        StackError::Internal(err.to_string())
    }
}
