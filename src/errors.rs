use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{error::Error as StdError, fmt};
use thiserror::Error;

/// Boxed provider error carried through `StoreError::Storage`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing required setting `{field}` (pass it explicitly or set {env_var})")]
    Configuration {
        field: &'static str,
        env_var: &'static str,
    },
    #[error("invalid value `{value}` for setting `{field}`")]
    InvalidSetting { field: &'static str, value: String },
    #[error("store not ready: {0}")]
    Precondition(String),
    #[error("invalid {kind} `{value}`: {reason}")]
    InvalidKey {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("collection `{collection}` not found in bucket `{bucket}`")]
    CollectionNotFound { bucket: String, collection: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("document `{id}` not found in collection `{collection}`")]
    DocumentNotFound { collection: String, id: String },
    #[error("object `{key}` is not a valid JSON document: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage {operation} failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    /// Wrap a provider failure for the named operation.
    pub fn storage(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Storage {
            operation,
            source: source.into(),
        }
    }

    /// True for every "referenced thing is absent" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BucketNotFound(_)
                | Self::CollectionNotFound { .. }
                | Self::ObjectNotFound { .. }
                | Self::DocumentNotFound { .. }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::Configuration { .. }
            | StoreError::InvalidSetting { .. }
            | StoreError::Precondition(_)
            | StoreError::InvalidKey { .. } => StatusCode::BAD_REQUEST,
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            StoreError::Parse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!("request failed: {}", err);
        }
        AppError::new(status, err.to_string())
    }
}
