use bytes::Bytes;
use upload_types::{
    ChunkUploadQuery, ChunkUploadResponse, CompleteUploadRequest, CompleteUploadResponse, StartUploadRequest,
    StartUploadResponse,
};

use crate::error::Result;

/// Transport to the upload coordinator. The scheduler only ever talks
/// through this trait, so tests drive it against instrumented in-process
/// implementations while production uses [`crate::HttpUploadService`].
#[async_trait::async_trait]
pub trait UploadService: Send + Sync {
    /// Open a new upload session; returns the backend upload handle and the
    /// derived storage key.
    async fn start_upload(&self, req: StartUploadRequest) -> Result<StartUploadResponse>;

    /// Transmit one chunk body. Safe to re-send for the same chunk number:
    /// the part is overwritten, which is what makes retry-in-place safe.
    async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_number: u32,
        query: ChunkUploadQuery,
        body: Bytes,
    ) -> Result<ChunkUploadResponse>;

    /// Finalize the object from the acknowledged parts.
    async fn complete_upload(&self, upload_id: &str, req: CompleteUploadRequest) -> Result<CompleteUploadResponse>;

    /// Abandon the session, releasing whatever the backend accumulated.
    async fn abort_upload(&self, upload_id: &str, file_id: &str) -> Result<()>;
}
