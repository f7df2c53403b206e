use crate::services::image_codec::ImageCodecError;
use crate::services::sampling_estimator::EstimateError;
use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing multipart field `{0}`")]
    MissingField(&'static str),
    #[error("Run count must be between 1 and {max}")]
    InvalidRunCount { max: usize },
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Image(#[from] ImageCodecError),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) | AppError::InvalidRunCount { .. } => StatusCode::BAD_REQUEST,
            AppError::Multipart(err) => err.status(),
            AppError::Image(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Estimate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        (
            status,
            Json(ErrorResponse {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::image_codec::ImageCodec;

    #[test]
    fn client_mistakes_map_to_4xx() {
        assert_eq!(
            AppError::MissingField("current").status(),
            StatusCode::BAD_REQUEST
        );
        let too_many = AppError::InvalidRunCount { max: 50 };
        assert_eq!(too_many.status(), StatusCode::BAD_REQUEST);
        assert_eq!(too_many.to_string(), "Run count must be between 1 and 50");

        let undecodable = ImageCodec::decode(b"not an image").unwrap_err();
        assert_eq!(
            AppError::Image(undecodable).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn error_body_is_json_message() {
        let response = AppError::MissingField("complete").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
