use crate::services::attachment::UploadError;
use crate::services::media::FieldErrors;
use crate::services::permission::Access;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

pub const NO_PERMISSION: &str = "You do not have permission to view this page or perform this action.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{}", .0.as_deref().unwrap_or(NO_PERMISSION))]
    Forbidden(Option<String>),

    /// No album or category was named. Reported exactly like a permission failure.
    #[error("{}", NO_PERMISSION)]
    NoContainerSpecified,

    #[error("Validation failed: {0:?}")]
    ValidationFailed(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(message: &str) -> Self {
        Self::NotFound(message.to_string())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), message.into());
        Self::ValidationFailed(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) | Self::NoContainerSpecified => StatusCode::FORBIDDEN,
            Self::ValidationFailed(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Turns a denied capability check into a `Forbidden` error carrying the oracle's reason.
pub fn ensure(access: Access) -> Result<(), ApiError> {
    match access {
        Access::Granted => Ok(()),
        Access::Denied(reason) => Err(ApiError::Forbidden(reason)),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::ValidationFailed(errors) => json!({ "errors": errors }),
            Self::Internal(e) => {
                tracing::error!("Application error: {:?}", e);
                json!({ "errors": ["Internal server error"] })
            }
            other => json!({ "errors": [other.to_string()] }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        if err.is_rejection() {
            Self::field("file", err.to_string())
        } else {
            Self::Internal(anyhow::Error::new(err))
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, ApiError>;
