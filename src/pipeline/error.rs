use serde::Serialize;
use thiserror::Error;

use crate::executor::traits::{IdentityError, RepositoryError, StorageError};
use crate::mapper::MappingError;

/// Category of a recoverable domain failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapsuleKind {
    ValidationFailed,
    NotFound,
    AlreadyExists,
    Unauthorized,
    Forbidden,
    RouteNotFound,
}

impl CapsuleKind {
    /// HTTP status reported for this kind of failure
    pub fn status(self) -> u16 {
        match self {
            CapsuleKind::ValidationFailed => 400,
            CapsuleKind::NotFound => 404,
            CapsuleKind::AlreadyExists => 400,
            CapsuleKind::Unauthorized => 401,
            CapsuleKind::Forbidden => 403,
            CapsuleKind::RouteNotFound => 404,
        }
    }
}

/// A recoverable failure produced by a hook
///
/// Capsules are values: a command returns one (or appends one to the
/// context) and the executor turns the most recent capsule into the
/// response. They are never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCapsule {
    pub kind: CapsuleKind,
    pub message: String,
    pub status: u16,
}

impl ErrorCapsule {
    pub fn new(kind: CapsuleKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: kind.status(),
        }
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(CapsuleKind::ValidationFailed, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CapsuleKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(CapsuleKind::AlreadyExists, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(CapsuleKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(CapsuleKind::Forbidden, message)
    }

    pub fn route_not_found(route_key: &str) -> Self {
        Self::new(
            CapsuleKind::RouteNotFound,
            format!("No route matches '{}'", route_key),
        )
    }
}

/// Fatal errors that escape the pipeline
///
/// Anything returned as `Err` from a command stops the executor and is
/// handled once at the request boundary as an internal error.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("image storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("identity provider error: {0}")]
    Identity(#[from] IdentityError),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Type mismatch while reshaping context data
    #[error("Type error: {message}{}", describe_types(.expected, .actual))]
    TypeError {
        message: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("{message}")]
    Custom { message: String },
}

fn describe_types(expected: &Option<String>, actual: &Option<String>) -> String {
    match (expected, actual) {
        (Some(exp), Some(act)) => format!(" (expected {}, got {})", exp, act),
        _ => String::new(),
    }
}

impl ExecutionError {
    /// Create a TypeError error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Create a TypeError error with expected and actual types
    pub fn type_error_with_types(
        message: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeError {
            message: message.into(),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a Custom error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
