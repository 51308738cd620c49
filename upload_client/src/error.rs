use thiserror::Error;
use tokio::task::JoinError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum UploadClientError {
    #[error("Configuration Error: {0}")]
    ConfigurationError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Authorization Error: {0}")]
    AuthError(String),

    #[error("Api Error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Chunk {chunk_number} failed after {attempts} attempts: {source}")]
    ChunkFailed {
        chunk_number: u32,
        attempts: u32,
        #[source]
        source: Box<UploadClientError>,
    },

    #[error("Upload incomplete: missing parts {missing:?}")]
    IncompleteUpload { missing: Vec<u32> },

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Reqwest Error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("ReqwestMiddleware Error: {0}")]
    ReqwestMiddlewareError(#[from] reqwest_middleware::Error),

    #[error("Other Internal Error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, UploadClientError>;

impl UploadClientError {
    /// Whether the scheduler may retry the operation. Only transient
    /// transport/storage faults qualify; validation-class failures must be
    /// fixed by the caller and are never retried automatically.
    pub fn is_transient(&self) -> bool {
        match self {
            UploadClientError::ApiError { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            },
            UploadClientError::ReqwestError(_) | UploadClientError::ReqwestMiddlewareError(_) => true,
            _ => false,
        }
    }
}

impl From<JoinError> for UploadClientError {
    fn from(value: JoinError) -> Self {
        UploadClientError::InternalError(anyhow::anyhow!("{value:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(UploadClientError::ApiError {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(UploadClientError::ApiError {
            status: 429,
            message: "slow down".into()
        }
        .is_transient());
        assert!(!UploadClientError::ApiError {
            status: 400,
            message: "bad chunk_number".into()
        }
        .is_transient());
        assert!(!UploadClientError::ValidationError("x".into()).is_transient());
        assert!(!UploadClientError::AuthError("x".into()).is_transient());
    }
}
