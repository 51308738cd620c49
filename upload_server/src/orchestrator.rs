use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use storage_backend::MultipartBackend;
use tracing::{debug, info, warn};
use upload_types::{
    ChunkUploadQuery, ChunkUploadResponse, CompleteUploadRequest, CompleteUploadResponse, PartInfo, StartUploadRequest,
    StartUploadResponse, StorageKey,
};

use crate::error::{Result, ServerError};
use crate::session::{SessionState, SessionStore};

/// Server-side coordinator for multipart upload sessions.
///
/// Owns the session table and delegates the storage work to the injected
/// [`MultipartBackend`]. Handlers validate nothing themselves; every rule
/// lives here so the operations are testable without HTTP.
pub struct Orchestrator {
    backend: Arc<dyn MultipartBackend>,
    sessions: SessionStore,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn MultipartBackend>, session_ttl: Duration) -> Self {
        Self {
            backend,
            sessions: SessionStore::new(session_ttl),
        }
    }

    pub fn open_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// `key = "{file_id}.{extension}"` when an extension hint is present,
    /// else `file_id`. Recomputed identically by every operation.
    fn derive_key(file_id: &str, extension: Option<&str>) -> Result<StorageKey> {
        if let Some(ext) = extension {
            if ext.contains(['/', '\\']) || ext.contains("..") {
                return Err(ServerError::Validation(format!("invalid file_extension: {ext:?}")));
            }
        }
        Ok(StorageKey::new(file_id, extension)?)
    }

    pub async fn start_upload(&self, req: StartUploadRequest) -> Result<StartUploadResponse> {
        let key = Self::derive_key(&req.file_id, req.file_extension.as_deref())?.to_string();

        let upload_id = self.backend.create_multipart(&key).await?;
        self.sessions.insert(&upload_id, &req.file_id, &key);

        info!(
            "started upload session {upload_id} for {key} (client compression: {})",
            if req.compressed { "on" } else { "off" }
        );
        Ok(StartUploadResponse { upload_id, key })
    }

    pub async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_number: &str,
        query: ChunkUploadQuery,
        body: Bytes,
    ) -> Result<ChunkUploadResponse> {
        let part_number = chunk_number
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ServerError::Validation(format!("chunk_number must be an integer >= 1, got {chunk_number:?}"))
            })?;
        if query.file_id.is_empty() {
            return Err(ServerError::Validation("file_id must be non-empty".to_owned()));
        }
        if body.is_empty() {
            return Err(ServerError::Validation(format!("chunk {part_number} has an empty body")));
        }

        let session_key = self.sessions.validate(upload_id, &query.file_id)?;
        let key = Self::derive_key(&query.file_id, query.file_extension.as_deref())?.to_string();
        if key != session_key {
            return Err(ServerError::Validation(format!(
                "derived key {key} does not match session key {session_key}"
            )));
        }

        // A compressed chunk that fails to decompress is rejected here, not
        // forwarded; the caller may retry uncompressed.
        let payload = if query.compressed {
            Bytes::from(chunk_compression::decompress_chunk(&body)?)
        } else {
            body
        };

        let etag = self.backend.upload_part(upload_id, part_number, payload).await?;
        debug!("stored part {part_number} of upload {upload_id} (etag {etag})");
        Ok(ChunkUploadResponse { etag, part_number })
    }

    pub async fn complete_upload(&self, upload_id: &str, req: CompleteUploadRequest) -> Result<CompleteUploadResponse> {
        if req.parts.is_empty() {
            return Err(ServerError::Validation("parts must be a non-empty list".to_owned()));
        }
        self.sessions.validate(upload_id, &req.file_id)?;

        let mut parts: Vec<PartInfo> = req.parts;
        parts.sort_by_key(|p| p.part_number);

        // Strict sequencing: after sorting, slot i must hold part i + 1.
        // Gaps and duplicates are rejected, never repaired.
        for (i, part) in parts.iter().enumerate() {
            let expected = i as u32 + 1;
            if part.part_number != expected {
                return Err(ServerError::Validation(format!(
                    "non-sequential parts: expected part {expected} at position {i}, got {} ({} parts total)",
                    part.part_number,
                    parts.len()
                )));
            }
        }

        let object = self.backend.complete_multipart(upload_id, &parts).await?;
        self.sessions.finish(upload_id, SessionState::Completed);

        info!("completed upload {upload_id}: {} parts -> {}", parts.len(), object.location);
        Ok(CompleteUploadResponse {
            location: object.location,
            key: object.key,
            file_extension: req.file_extension,
        })
    }

    pub async fn abort_upload(&self, upload_id: &str, file_id: &str) -> Result<()> {
        self.sessions.validate(upload_id, file_id)?;
        self.backend.abort_multipart(upload_id).await?;
        self.sessions.finish(upload_id, SessionState::Aborted);
        info!("aborted upload {upload_id}");
        Ok(())
    }

    /// Aborts the backend uploads of every expired session. Returns how many
    /// sessions were swept.
    pub async fn sweep_expired(&self) -> usize {
        let expired = self.sessions.take_expired();
        let count = expired.len();
        for upload_id in expired {
            if let Err(e) = self.backend.abort_multipart(&upload_id).await {
                warn!("failed to abort expired upload {upload_id}: {e}");
            }
        }
        if count > 0 {
            info!("swept {count} expired upload sessions");
        }
        count
    }

    /// Spawns the periodic expiry sweep. The task runs until the returned
    /// handle is aborted or dropped by the server on shutdown.
    pub fn spawn_expiry_sweep(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                orchestrator.sweep_expired().await;
            }
        })
    }
}
