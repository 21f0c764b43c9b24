//! Mapping of service errors onto HTTP status codes.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::error::PixlyError;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error(transparent)]
    Pixly(#[from] PixlyError),
    #[error("BadRequest Status: `{0}`")]
    BadRequest(String),
    #[error("Internal Error: `{0}`")]
    Internal(String),
}

impl From<MultipartError> for HttpError {
    fn from(err: MultipartError) -> Self {
        HttpError::BadRequest(err.body_text())
    }
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HttpError::Pixly(err) => match err {
                PixlyError::NotFound(_) => StatusCode::NOT_FOUND,
                PixlyError::UnsupportedOperation(_)
                | PixlyError::CorruptImage(_)
                | PixlyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                PixlyError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PixlyError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
                PixlyError::Staging(_) | PixlyError::Encode(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Error: {self}");
        }
        (status, self.to_string()).into_response()
    }
}

pub type HttpResult<T = Response> = Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PixlyError::NotFound(1), StatusCode::NOT_FOUND),
            (PixlyError::UnsupportedOperation("sepia".into()), StatusCode::BAD_REQUEST),
            (PixlyError::CorruptImage("eof".into()), StatusCode::BAD_REQUEST),
            (PixlyError::InvalidInput("caption".into()), StatusCode::BAD_REQUEST),
            (PixlyError::Timeout("read".into()), StatusCode::GATEWAY_TIMEOUT),
            (PixlyError::BackendUnavailable("s3".into()), StatusCode::BAD_GATEWAY),
            (PixlyError::Encode("png".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(HttpError::from(err).status(), status);
        }
    }

    #[test]
    fn test_client_errors_keep_message() {
        let response = HttpError::from(PixlyError::NotFound(9)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
