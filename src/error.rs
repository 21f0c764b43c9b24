//! Error taxonomy shared by the extractor, the edit engine and the orchestrator.

use std::io;
use thiserror::Error;

use crate::db::PictureId;

#[derive(Error, Debug)]
pub enum PixlyError {
    #[error("picture {0} not found")]
    NotFound(PictureId),
    #[error("unsupported operation `{0}`")]
    UnsupportedOperation(String),
    #[error("corrupt image: {0}")]
    CorruptImage(String),
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("backend timed out: {0}")]
    Timeout(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("staging failed: {0}")]
    Staging(#[from] io::Error),
    #[error("encoding failed: {0}")]
    Encode(String),
}

impl PixlyError {
    /// Errors caused by the request itself rather than by a backend.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PixlyError::NotFound(_)
                | PixlyError::UnsupportedOperation(_)
                | PixlyError::CorruptImage(_)
                | PixlyError::InvalidInput(_)
        )
    }

    /// A timeout may succeed when the user retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PixlyError::Timeout(_))
    }

    /// Metadata-store failures surface as backend outages.
    pub fn backend(err: anyhow::Error) -> Self {
        PixlyError::BackendUnavailable(format!("{err:#}"))
    }
}

pub type PixlyResult<T> = Result<T, PixlyError>;
