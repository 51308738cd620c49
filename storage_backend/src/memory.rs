use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;
use upload_types::PartInfo;

use crate::error::{BackendError, Result};
use crate::{part_etag, CompletedObject, MultipartBackend};

struct MemoryUpload {
    key: String,
    // part number -> (etag, body); insertion overwrites, last write wins.
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// In-memory multipart store. Used by the test suite and the server's
/// `--in-memory` mode; everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryBackend {
    uploads: RwLock<HashMap<String, MemoryUpload>>,
    objects: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The finalized object stored under `key`, if any.
    pub fn object(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).cloned()
    }

    /// Number of multipart uploads still open.
    pub fn open_upload_count(&self) -> usize {
        self.uploads.read().len()
    }

    pub fn has_upload(&self, upload_id: &str) -> bool {
        self.uploads.read().contains_key(upload_id)
    }
}

#[async_trait::async_trait]
impl MultipartBackend for MemoryBackend {
    async fn create_multipart(&self, key: &str) -> Result<String> {
        let upload_id = uuid::Uuid::new_v4().to_string();
        self.uploads.write().insert(
            upload_id.clone(),
            MemoryUpload {
                key: key.to_owned(),
                parts: BTreeMap::new(),
            },
        );
        debug!("created multipart upload {upload_id} for key {key}");
        Ok(upload_id)
    }

    async fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> Result<String> {
        let etag = part_etag(&body);
        let mut uploads = self.uploads.write();
        let upload = uploads
            .get_mut(upload_id)
            .ok_or_else(|| BackendError::UploadNotFound(upload_id.to_owned()))?;
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_multipart(&self, upload_id: &str, parts: &[PartInfo]) -> Result<CompletedObject> {
        let mut uploads = self.uploads.write();
        let upload = uploads
            .get(upload_id)
            .ok_or_else(|| BackendError::UploadNotFound(upload_id.to_owned()))?;

        let mut assembled = Vec::new();
        for part in parts {
            let Some((etag, body)) = upload.parts.get(&part.part_number) else {
                return Err(BackendError::InvalidPart {
                    upload_id: upload_id.to_owned(),
                    part_number: part.part_number,
                    reason: "part was never uploaded".to_owned(),
                });
            };
            if *etag != part.etag {
                return Err(BackendError::InvalidPart {
                    upload_id: upload_id.to_owned(),
                    part_number: part.part_number,
                    reason: format!("etag mismatch: expected {etag}, got {}", part.etag),
                });
            }
            assembled.extend_from_slice(body);
        }

        let key = upload.key.clone();
        self.objects.write().insert(key.clone(), Bytes::from(assembled));
        uploads.remove(upload_id);

        debug!("completed multipart upload {upload_id} into key {key}");
        Ok(CompletedObject {
            location: format!("memory://{key}"),
            key,
        })
    }

    async fn abort_multipart(&self, upload_id: &str) -> Result<()> {
        self.uploads
            .write()
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| BackendError::UploadNotFound(upload_id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_upload_complete() {
        let backend = MemoryBackend::new();
        let upload_id = backend.create_multipart("f1.bin").await.unwrap();

        let e1 = backend.upload_part(&upload_id, 1, Bytes::from_static(b"hello ")).await.unwrap();
        let e2 = backend.upload_part(&upload_id, 2, Bytes::from_static(b"world")).await.unwrap();

        let parts = vec![
            PartInfo { part_number: 1, etag: e1 },
            PartInfo { part_number: 2, etag: e2 },
        ];
        let object = backend.complete_multipart(&upload_id, &parts).await.unwrap();
        assert_eq!(object.key, "f1.bin");
        assert_eq!(object.location, "memory://f1.bin");
        assert_eq!(backend.object("f1.bin").unwrap(), Bytes::from_static(b"hello world"));
        assert_eq!(backend.open_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_part_overwrite_keeps_latest() {
        let backend = MemoryBackend::new();
        let upload_id = backend.create_multipart("k").await.unwrap();

        let stale = backend.upload_part(&upload_id, 1, Bytes::from_static(b"old")).await.unwrap();
        let fresh = backend.upload_part(&upload_id, 1, Bytes::from_static(b"new")).await.unwrap();
        assert_ne!(stale, fresh);

        // Completing with the stale etag is rejected; the latest body won.
        let err = backend
            .complete_multipart(&upload_id, &[PartInfo { part_number: 1, etag: stale }])
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::InvalidPart { .. }));

        let object = backend
            .complete_multipart(&upload_id, &[PartInfo { part_number: 1, etag: fresh }])
            .await
            .unwrap();
        assert_eq!(object.key, "k");
        assert_eq!(backend.object("k").unwrap(), Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_missing_part_rejected() {
        let backend = MemoryBackend::new();
        let upload_id = backend.create_multipart("k").await.unwrap();
        let etag = backend.upload_part(&upload_id, 1, Bytes::from_static(b"a")).await.unwrap();

        let parts = vec![
            PartInfo { part_number: 1, etag },
            PartInfo {
                part_number: 2,
                etag: "nope".to_owned(),
            },
        ];
        let err = backend.complete_multipart(&upload_id, &parts).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidPart { part_number: 2, .. }));
    }

    #[tokio::test]
    async fn test_abort_drops_upload() {
        let backend = MemoryBackend::new();
        let upload_id = backend.create_multipart("k").await.unwrap();
        backend.upload_part(&upload_id, 1, Bytes::from_static(b"a")).await.unwrap();

        backend.abort_multipart(&upload_id).await.unwrap();
        assert!(!backend.has_upload(&upload_id));
        assert!(matches!(
            backend.abort_multipart(&upload_id).await.unwrap_err(),
            BackendError::UploadNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_upload() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.upload_part("missing", 1, Bytes::from_static(b"a")).await.unwrap_err(),
            BackendError::UploadNotFound(_)
        ));
    }
}
