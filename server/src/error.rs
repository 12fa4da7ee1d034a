use std::any::Any;

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use matchday_data_management::DataManagerError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{message}")]
    InvalidPayload { status: StatusCode, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DataManagerError> for AppError {
    fn from(err: DataManagerError) -> Self {
        match err {
            DataManagerError::NotFound(message) => AppError::NotFound(message),
            DataManagerError::Database(message) => AppError::Database(message),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidPayload { status: rejection.status(), message: rejection.body_text() }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidPayload { status: rejection.status(), message: rejection.body_text() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::InvalidPayload { status, .. } => *status,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("{self}");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Turns a handler panic into the same JSON error shape as every other failure.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "Unknown panic".to_string()
    };

    AppError::Internal(message).into_response()
}
