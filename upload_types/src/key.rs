use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::UploadTypesError;

/// A StorageKey names the final object in the backing store: the session's
/// file id, optionally suffixed with a file-extension hint. Immutable once a
/// session starts; `start_upload` and `upload_chunk` must derive the same key.
#[derive(Debug, PartialEq, Serialize, Deserialize, Ord, PartialOrd, Eq, Hash, Clone)]
pub struct StorageKey {
    pub file_id: String,
    pub extension: Option<String>,
}

impl StorageKey {
    pub fn new(file_id: &str, extension: Option<&str>) -> Result<Self, UploadTypesError> {
        if file_id.is_empty() {
            return Err(UploadTypesError::EmptyFileId);
        }
        Ok(Self {
            file_id: file_id.to_owned(),
            extension: extension.filter(|e| !e.is_empty()).map(str::to_owned),
        })
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.extension {
            Some(ext) => write!(f, "{}.{}", self.file_id, ext),
            None => write!(f, "{}", self.file_id),
        }
    }
}
