use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Multipart upload not found: {0}")]
    UploadNotFound(String),

    #[error("Invalid part {part_number} for upload {upload_id}: {reason}")]
    InvalidPart {
        upload_id: String,
        part_number: u32,
        reason: String,
    },

    #[error("Configuration Error: {0}")]
    Configuration(String),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Other Internal Error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;
