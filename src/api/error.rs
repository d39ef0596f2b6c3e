//! HTTP error responses: `{"error": {"code", "message"}}`

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

use super::schemas::{ErrorDetail, ErrorResponse};
use crate::error::{DurationBound, Error};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidVideoFormat(String),

    #[error("{0}")]
    VideoTooShort(String),

    #[error("{0}")]
    VideoTooLong(String),

    #[error("{0}")]
    FileTooLarge(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    ModelInference(String),

    #[error("{0}")]
    StorageUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidVideoFormat(_) | Self::VideoTooShort(_) | Self::VideoTooLong(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::FileTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ModelInference(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable machine-readable error code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVideoFormat(_) => "INVALID_VIDEO_FORMAT",
            Self::VideoTooShort(_) => "VIDEO_TOO_SHORT",
            Self::VideoTooLong(_) => "VIDEO_TOO_LONG",
            Self::FileTooLarge(_) => "FILE_TOO_LARGE",
            Self::InvalidParameter(_) => "INVALID_PARAMETER",
            Self::ModelInference(_) => "MODEL_INFERENCE_ERROR",
            Self::StorageUnavailable(_) => "STORAGE_SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::VideoProcessing(_) => Self::InvalidVideoFormat(message),
            Error::VideoEncoding(_) => Self::Internal(message),
            Error::VideoDuration {
                bound: DurationBound::TooShort,
                ..
            } => Self::VideoTooShort(message),
            Error::VideoDuration {
                bound: DurationBound::TooLong,
                ..
            } => Self::VideoTooLong(message),
            Error::PoseEstimation(_) => Self::ModelInference(message),
            Error::Storage(_) => Self::StorageUnavailable(message),
            Error::InvalidInput(_) => Self::InvalidParameter(message),
            Error::Io(_) | Error::Json(_) => Self::Internal(message),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err).into()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::FileTooLarge(format!("File too large: {}", err.body_text()))
        } else {
            Self::InvalidParameter(format!("Malformed multipart body: {}", err.body_text()))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} ({}): {}", status, self.code(), self);
        } else {
            warn!("{} ({}): {}", status, self.code(), self);
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
