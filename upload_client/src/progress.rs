use std::fmt::Debug;

/// Observer for upload progress. Callbacks fire from worker tasks, so
/// implementations must be cheap and thread-safe.
pub trait UploadProgress: Debug + Send + Sync {
    /// Bytes of source data acknowledged by the server since the last call.
    fn bytes_transferred(&self, _delta: u64) {}

    /// One chunk fully acknowledged.
    fn chunk_completed(&self, _chunk_number: u32, _total_chunks: u32) {}
}

#[derive(Debug)]
pub struct NoOpProgress;

impl UploadProgress for NoOpProgress {}
