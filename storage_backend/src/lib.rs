#![cfg_attr(feature = "strict", deny(warnings))]

//! Thin typed binding to the multipart primitives of an object store.
//!
//! The orchestrator depends only on the four-operation contract below; the
//! store's internal durability and consistency guarantees are its own
//! business. Two implementations ship here: [`MemoryBackend`] for tests and
//! ephemeral serving, and [`DiskBackend`] for a local disk-backed store.

use bytes::Bytes;
use upload_types::PartInfo;

pub mod error;
mod disk;
mod memory;

pub use disk::DiskBackend;
pub use error::BackendError;
pub use memory::MemoryBackend;

use crate::error::Result;

/// The finalized object as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedObject {
    pub location: String,
    pub key: String,
}

/// Multipart primitives every backend provides.
///
/// Part writes are last-write-wins per part number: re-uploading the same
/// part number for the same upload replaces the previous body, which is what
/// makes client retry-in-place safe without server-side deduplication.
#[async_trait::async_trait]
pub trait MultipartBackend: Send + Sync {
    /// Open a multipart upload for `key`; returns the opaque upload handle
    /// required by every subsequent call.
    async fn create_multipart(&self, key: &str) -> Result<String>;

    /// Store one part body; returns its etag.
    async fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> Result<String>;

    /// Assemble the listed parts, in the given order, into the final object.
    /// Every listed part must have been uploaded with a matching etag.
    async fn complete_multipart(&self, upload_id: &str, parts: &[PartInfo]) -> Result<CompletedObject>;

    /// Drop the upload and any parts it accumulated.
    async fn abort_multipart(&self, upload_id: &str) -> Result<()>;
}

/// Content tag for a part body. Stable across backends so a re-uploaded
/// identical body keeps its etag.
pub(crate) fn part_etag(body: &[u8]) -> String {
    blake3::hash(body).to_hex().to_string()
}
