use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Failure classes of the record → upload → share → refresh pipeline.
#[derive(Debug, Error)]
pub enum ClipError {
    #[error("{0}")]
    Validation(String),
    #[error("upload failed: {message}")]
    Upload {
        status: Option<u16>,
        message: String,
    },
    #[error("share link creation failed: {0}")]
    ShareCreation(String),
    #[error("video `{0}` not found")]
    NotFound(String),
    #[error("authentication required")]
    AuthRequired,
    #[error("remote store request failed: {0}")]
    RemoteStore(String),
    #[error("key `{0}` is already used by another video")]
    Conflict(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type ClipResult<T> = Result<T, ClipError>;

impl ClipError {
    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::Validation(format!("missing required fields: {}", fields.join(", ")))
    }

    pub fn upload(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upload {
            status,
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for ClipError {
    fn from(err: sqlx::Error) -> Self {
        ClipError::Persistence(err.to_string())
    }
}

impl From<io::Error> for ClipError {
    fn from(err: io::Error) -> Self {
        ClipError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ClipError {
    fn from(err: serde_json::Error) -> Self {
        ClipError::Persistence(err.to_string())
    }
}

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub needs_auth: bool,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            needs_auth: false,
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// 401 carrying `needsAuth: true` so the player can prompt for a reconnect.
    pub fn auth_required(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: msg.into(),
            needs_auth: true,
        }
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
        let body = if self.needs_auth {
            json!({
                "error": self.message,
                "status": self.status.as_u16(),
                "needsAuth": true
            })
        } else {
            json!({
                "error": self.message,
                "status": self.status.as_u16()
            })
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<ClipError> for AppError {
    fn from(err: ClipError) -> Self {
        match err {
            ClipError::Validation(_) => AppError::new(StatusCode::BAD_REQUEST, err.to_string()),
            ClipError::NotFound(_) => AppError::not_found("Video not found"),
            ClipError::AuthRequired => AppError::auth_required("Token required for URL refresh"),
            ClipError::Conflict(_) => AppError::new(StatusCode::CONFLICT, err.to_string()),
            ClipError::Upload { .. } | ClipError::ShareCreation(_) | ClipError::RemoteStore(_) => {
                AppError::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            ClipError::Persistence(ref detail) => {
                tracing::error!(error = %detail, "metadata store failure");
                AppError::internal("Failed to access video metadata")
            }
            ClipError::Capture(_) | ClipError::Cancelled => AppError::internal(err.to_string()),
        }
    }
}
