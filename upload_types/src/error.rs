use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadTypesError {
    #[error("file_id must be non-empty")]
    EmptyFileId,
}
