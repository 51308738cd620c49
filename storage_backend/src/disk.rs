use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;
use upload_types::PartInfo;

use crate::error::{BackendError, Result};
use crate::{part_etag, CompletedObject, MultipartBackend};

const KEY_FILE: &str = "key";

/// Disk-backed multipart store. Parts accumulate as one file per part number
/// under `<root>/staging/<upload_id>/`, and completion assembles them into
/// `<root>/objects/<key>` before the staging directory is removed.
pub struct DiskBackend {
    staging_root: PathBuf,
    objects_root: PathBuf,
}

impl DiskBackend {
    /// Opens (creating if needed) the backing directories under `root`.
    /// An uncreatable root is a configuration error, reported before any
    /// part I/O is attempted.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let staging_root = root.join("staging");
        let objects_root = root.join("objects");
        for dir in [&staging_root, &objects_root] {
            std::fs::create_dir_all(dir)
                .map_err(|e| BackendError::Configuration(format!("cannot create {}: {e}", dir.display())))?;
        }
        Ok(Self {
            staging_root,
            objects_root,
        })
    }

    fn upload_dir(&self, upload_id: &str) -> PathBuf {
        self.staging_root.join(upload_id)
    }

    fn part_path(&self, upload_id: &str, part_number: u32) -> PathBuf {
        self.upload_dir(upload_id).join(format!("part.{part_number}"))
    }

    /// Object keys are derived from a file id plus an extension hint and must
    /// stay flat; anything that could escape the objects directory is
    /// rejected outright.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
            return Err(BackendError::Configuration(format!("invalid object key: {key:?}")));
        }
        Ok(self.objects_root.join(key))
    }
}

#[async_trait::async_trait]
impl MultipartBackend for DiskBackend {
    async fn create_multipart(&self, key: &str) -> Result<String> {
        // Validate the key now so a bad one fails the session at start.
        self.object_path(key)?;

        let upload_id = uuid::Uuid::new_v4().to_string();
        let dir = self.upload_dir(&upload_id);
        tokio::fs::create_dir(&dir).await?;
        tokio::fs::write(dir.join(KEY_FILE), key.as_bytes()).await?;
        debug!("created multipart upload {upload_id} for key {key} at {}", dir.display());
        Ok(upload_id)
    }

    async fn upload_part(&self, upload_id: &str, part_number: u32, body: Bytes) -> Result<String> {
        let dir = self.upload_dir(upload_id);
        if tokio::fs::metadata(&dir).await.is_err() {
            return Err(BackendError::UploadNotFound(upload_id.to_owned()));
        }
        let etag = part_etag(&body);
        tokio::fs::write(self.part_path(upload_id, part_number), &body).await?;
        Ok(etag)
    }

    async fn complete_multipart(&self, upload_id: &str, parts: &[PartInfo]) -> Result<CompletedObject> {
        let dir = self.upload_dir(upload_id);
        let key_bytes = tokio::fs::read(dir.join(KEY_FILE)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BackendError::UploadNotFound(upload_id.to_owned())
            } else {
                BackendError::IOError(e)
            }
        })?;
        let key = String::from_utf8(key_bytes)
            .map_err(|e| BackendError::Internal(anyhow::anyhow!("corrupt key file for {upload_id}: {e}")))?;

        let mut assembled = Vec::new();
        for part in parts {
            let body = tokio::fs::read(self.part_path(upload_id, part.part_number))
                .await
                .map_err(|e| {
                    if e.kind() == ErrorKind::NotFound {
                        BackendError::InvalidPart {
                            upload_id: upload_id.to_owned(),
                            part_number: part.part_number,
                            reason: "part was never uploaded".to_owned(),
                        }
                    } else {
                        BackendError::IOError(e)
                    }
                })?;
            let etag = part_etag(&body);
            if etag != part.etag {
                return Err(BackendError::InvalidPart {
                    upload_id: upload_id.to_owned(),
                    part_number: part.part_number,
                    reason: format!("etag mismatch: expected {etag}, got {}", part.etag),
                });
            }
            assembled.extend_from_slice(&body);
        }

        let object_path = self.object_path(&key)?;
        tokio::fs::write(&object_path, &assembled).await?;
        tokio::fs::remove_dir_all(&dir).await?;

        let location = format!("file://{}", object_path.display());
        debug!("completed multipart upload {upload_id} into {location}");
        Ok(CompletedObject { location, key })
    }

    async fn abort_multipart(&self, upload_id: &str) -> Result<()> {
        let dir = self.upload_dir(upload_id);
        tokio::fs::remove_dir_all(&dir).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                BackendError::UploadNotFound(upload_id.to_owned())
            } else {
                BackendError::IOError(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_disk_round_trip() {
        let temp = tempdir().unwrap();
        let backend = DiskBackend::new(temp.path()).unwrap();

        let upload_id = backend.create_multipart("f1.txt").await.unwrap();
        let e1 = backend.upload_part(&upload_id, 1, Bytes::from_static(b"part one ")).await.unwrap();
        let e2 = backend.upload_part(&upload_id, 2, Bytes::from_static(b"part two")).await.unwrap();

        let object = backend
            .complete_multipart(
                &upload_id,
                &[
                    PartInfo { part_number: 1, etag: e1 },
                    PartInfo { part_number: 2, etag: e2 },
                ],
            )
            .await
            .unwrap();

        assert_eq!(object.key, "f1.txt");
        let written = std::fs::read(temp.path().join("objects").join("f1.txt")).unwrap();
        assert_eq!(written, b"part one part two");

        // Staging is gone once the object exists.
        assert!(!temp.path().join("staging").join(&upload_id).exists());
    }

    #[tokio::test]
    async fn test_disk_part_overwrite() {
        let temp = tempdir().unwrap();
        let backend = DiskBackend::new(temp.path()).unwrap();

        let upload_id = backend.create_multipart("k").await.unwrap();
        backend.upload_part(&upload_id, 1, Bytes::from_static(b"old")).await.unwrap();
        let fresh = backend.upload_part(&upload_id, 1, Bytes::from_static(b"new")).await.unwrap();

        let object = backend
            .complete_multipart(&upload_id, &[PartInfo { part_number: 1, etag: fresh }])
            .await
            .unwrap();
        assert_eq!(object.key, "k");
        assert_eq!(std::fs::read(temp.path().join("objects").join("k")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_disk_abort_and_unknown() {
        let temp = tempdir().unwrap();
        let backend = DiskBackend::new(temp.path()).unwrap();

        let upload_id = backend.create_multipart("k").await.unwrap();
        backend.abort_multipart(&upload_id).await.unwrap();
        assert!(matches!(
            backend.upload_part(&upload_id, 1, Bytes::from_static(b"a")).await.unwrap_err(),
            BackendError::UploadNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_disk_rejects_traversal_key() {
        let temp = tempdir().unwrap();
        let backend = DiskBackend::new(temp.path()).unwrap();
        assert!(backend.create_multipart("../escape").await.is_err());
    }
}
