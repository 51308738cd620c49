use chunk_compression::ChunkCodecError;
use storage_backend::BackendError;
use thiserror::Error;
use upload_types::UploadTypesError;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Decompression Error: {0}")]
    Decompression(ChunkCodecError),

    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("Backend Error: {0}")]
    Backend(BackendError),

    #[error("Authorization Error: {0}")]
    Unauthorized(String),

    #[error("Other Internal Error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

impl From<UploadTypesError> for ServerError {
    fn from(e: UploadTypesError) -> Self {
        ServerError::Validation(e.to_string())
    }
}

impl From<BackendError> for ServerError {
    fn from(e: BackendError) -> Self {
        match e {
            // The caller supplied a handle or part record the backend does
            // not recognize; fixable by the caller, so validation class.
            BackendError::UploadNotFound(id) => ServerError::Validation(format!("unknown upload_id: {id}")),
            BackendError::InvalidPart { .. } => ServerError::Validation(e.to_string()),
            BackendError::Configuration(msg) => ServerError::Configuration(msg),
            other => ServerError::Backend(other),
        }
    }
}

impl From<ChunkCodecError> for ServerError {
    fn from(e: ChunkCodecError) -> Self {
        ServerError::Decompression(e)
    }
}
