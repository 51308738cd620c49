//! The chunk scheduler: splits a file into fixed-size chunks, dispatches
//! them under a bounded worker pool, retries transient faults in place, and
//! finalizes the object once every part is acknowledged.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chunk_compression::CompressionMode;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tracing::{debug, info, warn};
use upload_types::{ChunkUploadQuery, CompleteUploadRequest, PartInfo, StartUploadRequest};

use crate::chunks::{plan_chunks, ChunkState, ChunkTask};
use crate::error::{Result, UploadClientError};
use crate::http_service::HttpUploadService;
use crate::progress::{NoOpProgress, UploadProgress};
use crate::service::UploadService;
use crate::AuthConfig;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_PARALLEL: usize = 3;
pub const DEFAULT_MAX_RETRIES_PER_CHUNK: u32 = 3;

/// First retry waits ~this long; later ones double, capped and jittered.
const RETRY_BASE_DELAY_MS: u64 = 100;
const RETRY_MAX_DELAY_MS: u64 = 2000;

const MIB: f64 = (1024 * 1024) as f64;

/// Client-side upload configuration.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    pub endpoint: String,
    pub chunk_size: u64,
    /// Upper bound on concurrently in-flight chunk transmissions.
    pub max_parallel: usize,
    pub compression_mode: CompressionMode,
    /// Retry credits per chunk; only transient faults consume them.
    pub max_retries_per_chunk: u32,
    pub auth: Option<AuthConfig>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_parallel: DEFAULT_MAX_PARALLEL,
            compression_mode: CompressionMode::default(),
            max_retries_per_chunk: DEFAULT_MAX_RETRIES_PER_CHUNK,
            auth: None,
        }
    }
}

/// What one finished upload looked like.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub file_id: String,
    pub key: String,
    pub location: String,
    pub original_name: String,
    pub file_extension: Option<String>,
    pub size: u64,
    pub total_chunks: u32,
    pub elapsed: Duration,
    pub throughput_mbps: f64,
    pub compression_enabled: bool,
    /// Total bytes actually transmitted for chunk bodies when compression
    /// was on.
    pub compressed_bytes: u64,
    /// `compressed_bytes / size`, when compression was on.
    pub compression_ratio: Option<f64>,
}

/// Everything a worker needs, cloned once per worker slot.
#[derive(Clone)]
struct ChunkContext {
    service: Arc<dyn UploadService>,
    data: Bytes,
    upload_id: String,
    file_id: String,
    file_extension: Option<String>,
    compression_enabled: bool,
    total_chunks: u32,
    max_retries: u32,
    queue: Arc<Mutex<VecDeque<ChunkTask>>>,
    failed: Arc<AtomicBool>,
    compressed_bytes: Arc<AtomicU64>,
    progress: Arc<dyn UploadProgress>,
}

/// Uploads one file per call: split, compress (maybe), dispatch under the
/// concurrency bound, retry transient faults, verify the part set, complete.
///
/// Sessions live only for the duration of one call; an interrupted upload
/// starts over from `start_upload`.
pub struct FileUploader {
    service: Arc<dyn UploadService>,
    config: UploaderConfig,
    progress: Arc<dyn UploadProgress>,
}

impl FileUploader {
    /// Builds an uploader talking HTTP to `config.endpoint`.
    pub fn new(config: UploaderConfig) -> Result<Self> {
        let service = Arc::new(HttpUploadService::new(&config.endpoint, config.auth.clone())?);
        Self::with_service(service, config)
    }

    /// Builds an uploader over an arbitrary transport; tests inject
    /// instrumented services here.
    pub fn with_service(service: Arc<dyn UploadService>, config: UploaderConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(UploadClientError::ConfigurationError("chunk_size must be at least 1".to_owned()));
        }
        if config.max_parallel == 0 {
            return Err(UploadClientError::ConfigurationError("max_parallel must be at least 1".to_owned()));
        }
        Ok(Self {
            service,
            config,
            progress: Arc::new(NoOpProgress),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn UploadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Reads `path` and uploads it under its own file name.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadSummary> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| UploadClientError::ValidationError(format!("invalid file name in {}", path.display())))?
            .to_owned();
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(Bytes::from(data), &filename).await
    }

    /// Uploads an in-memory byte sequence as `filename`.
    pub async fn upload_bytes(&self, data: Bytes, filename: &str) -> Result<UploadSummary> {
        if data.is_empty() {
            return Err(UploadClientError::ValidationError("cannot upload an empty file".to_owned()));
        }

        let started_at = Instant::now();
        let size = data.len() as u64;
        let file_id = uuid::Uuid::new_v4().to_string();
        let file_extension = split_extension(filename).map(str::to_owned);

        let specs = plan_chunks(size, self.config.chunk_size);
        let total_chunks = specs.len() as u32;

        // One compression decision per upload, from a trial on the first
        // chunk; applied uniformly to every chunk of this session.
        let sample_end = (self.config.chunk_size as usize).min(data.len());
        let compression_enabled = chunk_compression::should_compress(self.config.compression_mode, &data[..sample_end]);
        debug!(
            "uploading {filename} as {file_id}: {size} bytes in {total_chunks} chunks, compression {}",
            if compression_enabled { "on" } else { "off" }
        );

        let started = self
            .service
            .start_upload(StartUploadRequest {
                file_id: file_id.clone(),
                file_extension: file_extension.clone(),
                compressed: compression_enabled,
            })
            .await?;
        let upload_id = started.upload_id;

        let queue: VecDeque<ChunkTask> = specs.into_iter().map(ChunkTask::new).collect();
        let ctx = ChunkContext {
            service: self.service.clone(),
            data,
            upload_id: upload_id.clone(),
            file_id: file_id.clone(),
            file_extension: file_extension.clone(),
            compression_enabled,
            total_chunks,
            max_retries: self.config.max_retries_per_chunk,
            queue: Arc::new(Mutex::new(queue)),
            failed: Arc::new(AtomicBool::new(false)),
            compressed_bytes: Arc::new(AtomicU64::new(0)),
            progress: self.progress.clone(),
        };

        // Fixed pool of workers over the shared queue: at most max_parallel
        // chunks in flight, and a freed slot immediately pulls the next
        // pending task regardless of completion order.
        let worker_count = self.config.max_parallel.min(total_chunks as usize);
        let mut workers = JoinSet::new();
        for _ in 0..worker_count {
            workers.spawn(run_worker(ctx.clone()));
        }

        let mut parts: Vec<PartInfo> = Vec::with_capacity(total_chunks as usize);
        let mut failure: Option<UploadClientError> = None;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(worker_parts)) => parts.extend(worker_parts),
                Ok(Err(e)) => {
                    if failure.is_none() {
                        failure = Some(e);
                    }
                },
                Err(join_err) => {
                    if failure.is_none() {
                        failure = Some(join_err.into());
                    }
                },
            }
        }
        if let Some(e) = failure {
            self.try_abort(&upload_id, &file_id).await;
            return Err(e);
        }

        // Every part number 1..=N must be present exactly once; anything
        // less is an aggregate failure distinct from individual chunk
        // errors.
        parts.sort_by_key(|p| p.part_number);
        let missing: Vec<u32> = (1..=total_chunks)
            .filter(|n| parts.binary_search_by_key(n, |p| p.part_number).is_err())
            .collect();
        if !missing.is_empty() {
            self.try_abort(&upload_id, &file_id).await;
            return Err(UploadClientError::IncompleteUpload { missing });
        }

        let completed = match self
            .service
            .complete_upload(
                &upload_id,
                CompleteUploadRequest {
                    file_id: file_id.clone(),
                    filename: filename.to_owned(),
                    file_extension: file_extension.clone(),
                    parts,
                },
            )
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.try_abort(&upload_id, &file_id).await;
                return Err(e);
            },
        };

        let elapsed = started_at.elapsed();
        let compressed_bytes = ctx.compressed_bytes.load(Ordering::Relaxed);
        let throughput_mbps = (size as f64 / MIB) / elapsed.as_secs_f64().max(f64::EPSILON);
        let compression_ratio = compression_enabled.then(|| compressed_bytes as f64 / size as f64);

        info!(
            "upload {file_id} complete: {size} bytes in {total_chunks} chunks, {:.2}s ({throughput_mbps:.2} MB/s)",
            elapsed.as_secs_f64()
        );

        Ok(UploadSummary {
            file_id,
            key: completed.key,
            location: completed.location,
            original_name: filename.to_owned(),
            file_extension,
            size,
            total_chunks,
            elapsed,
            throughput_mbps,
            compression_enabled,
            compressed_bytes,
            compression_ratio,
        })
    }

    /// Best-effort backend cleanup on terminal failure; the sweep on the
    /// server side is the backstop if this also fails.
    async fn try_abort(&self, upload_id: &str, file_id: &str) {
        if let Err(e) = self.service.abort_upload(upload_id, file_id).await {
            warn!("failed to abort upload {upload_id}: {e}");
        }
    }
}

/// Drains the task queue until it is empty or another worker hit a terminal
/// failure. Returns the parts this worker acknowledged.
async fn run_worker(ctx: ChunkContext) -> Result<Vec<PartInfo>> {
    let mut parts = Vec::new();
    loop {
        if ctx.failed.load(Ordering::Relaxed) {
            break;
        }
        let Some(mut task) = ctx.queue.lock().pop_front() else {
            break;
        };
        match process_chunk(&ctx, &mut task).await {
            Ok(part) => {
                ctx.progress.chunk_completed(task.spec.number, ctx.total_chunks);
                parts.push(part);
            },
            Err(e) => {
                ctx.failed.store(true, Ordering::Relaxed);
                return Err(UploadClientError::ChunkFailed {
                    chunk_number: task.spec.number,
                    attempts: task.attempts + 1,
                    source: Box::new(e),
                });
            },
        }
    }
    Ok(parts)
}

/// One chunk through its state machine: read the range, compress if the
/// session says so, transmit, retrying in place on transient faults with
/// exponential backoff until the credits run out.
async fn process_chunk(ctx: &ChunkContext, task: &mut ChunkTask) -> Result<PartInfo> {
    let spec = task.spec;
    let chunk = ctx.data.slice(spec.start as usize..spec.end as usize);

    // Compressed once here; retries resend the same payload.
    let payload = if ctx.compression_enabled {
        let compressed = Bytes::from(chunk_compression::compress_chunk(&chunk));
        ctx.compressed_bytes.fetch_add(compressed.len() as u64, Ordering::Relaxed);
        compressed
    } else {
        chunk.clone()
    };
    let query = ChunkUploadQuery {
        file_id: ctx.file_id.clone(),
        file_extension: ctx.file_extension.clone(),
        compressed: ctx.compression_enabled,
        original_size: Some(chunk.len() as u64),
    };

    let mut backoff = ExponentialBackoff::from_millis(2)
        .factor(RETRY_BASE_DELAY_MS / 2)
        .max_delay(Duration::from_millis(RETRY_MAX_DELAY_MS))
        .map(jitter);

    loop {
        task.state = ChunkState::InFlight;
        match ctx
            .service
            .upload_chunk(&ctx.upload_id, spec.number, query.clone(), payload.clone())
            .await
        {
            Ok(resp) => {
                task.state = ChunkState::Acked;
                ctx.progress.bytes_transferred(chunk.len() as u64);
                return Ok(PartInfo {
                    part_number: resp.part_number,
                    etag: resp.etag,
                });
            },
            Err(e) if e.is_transient() && task.attempts < ctx.max_retries => {
                task.attempts += 1;
                task.state = ChunkState::Retrying;
                let delay = backoff.next().unwrap_or(Duration::from_millis(RETRY_MAX_DELAY_MS));
                warn!(
                    "chunk {} attempt {} failed transiently ({e}); retrying in {delay:?}",
                    spec.number, task.attempts
                );
                tokio::time::sleep(delay).await;
            },
            Err(e) => {
                task.state = ChunkState::Failed;
                return Err(e);
            },
        }
    }
}

/// Extension hint from a file name, matching how the storage key is derived
/// server-side. `"archive.tar.gz"` hints `"gz"`; bare names hint nothing.
fn split_extension(filename: &str) -> Option<&str> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::hash::{DefaultHasher, Hash, Hasher};
    use std::sync::atomic::AtomicUsize;

    use more_asserts::assert_le;
    use rand::{thread_rng, RngCore};
    use upload_types::{ChunkUploadResponse, CompleteUploadResponse, StartUploadResponse};

    use super::*;

    #[derive(Default)]
    struct StubUpload {
        key: String,
        file_id: String,
        parts: BTreeMap<u32, (String, Vec<u8>)>,
        compressed_chunks: u32,
    }

    /// In-process service double with failure injection and concurrency
    /// instrumentation.
    #[derive(Default)]
    struct StubService {
        uploads: Mutex<HashMap<String, StubUpload>>,
        objects: Mutex<HashMap<String, Vec<u8>>>,
        // chunk number -> how many times it should still fail
        fail_remaining: Mutex<HashMap<u32, u32>>,
        fail_status: u16,
        calls_per_chunk: Mutex<HashMap<u32, u32>>,
        upload_counter: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        aborted: Mutex<Vec<String>>,
        chunk_delay: Duration,
    }

    impl StubService {
        fn new() -> Self {
            Self {
                fail_status: 503,
                ..Default::default()
            }
        }

        fn fail_chunk(&self, chunk_number: u32, times: u32) {
            self.fail_remaining.lock().insert(chunk_number, times);
        }

        fn etag(body: &[u8]) -> String {
            let mut hasher = DefaultHasher::new();
            body.hash(&mut hasher);
            format!("{:016x}", hasher.finish())
        }

        fn object(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().get(key).cloned()
        }

        fn calls_for(&self, chunk_number: u32) -> u32 {
            self.calls_per_chunk.lock().get(&chunk_number).copied().unwrap_or(0)
        }
    }

    #[async_trait::async_trait]
    impl UploadService for StubService {
        async fn start_upload(&self, req: StartUploadRequest) -> Result<StartUploadResponse> {
            let n = self.upload_counter.fetch_add(1, Ordering::Relaxed);
            let upload_id = format!("upload-{n}");
            let key = match &req.file_extension {
                Some(ext) => format!("{}.{ext}", req.file_id),
                None => req.file_id.clone(),
            };
            self.uploads.lock().insert(
                upload_id.clone(),
                StubUpload {
                    key: key.clone(),
                    file_id: req.file_id,
                    ..Default::default()
                },
            );
            Ok(StartUploadResponse { upload_id, key })
        }

        async fn upload_chunk(
            &self,
            upload_id: &str,
            chunk_number: u32,
            query: ChunkUploadQuery,
            body: Bytes,
        ) -> Result<ChunkUploadResponse> {
            *self.calls_per_chunk.lock().entry(chunk_number).or_insert(0) += 1;

            let entered = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(entered, Ordering::SeqCst);
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let should_fail = {
                let mut failures = self.fail_remaining.lock();
                match failures.get_mut(&chunk_number) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        true
                    },
                    _ => false,
                }
            };
            if should_fail {
                return Err(UploadClientError::ApiError {
                    status: self.fail_status,
                    message: "injected failure".to_owned(),
                });
            }

            let payload = if query.compressed {
                chunk_compression::decompress_chunk(&body)
                    .map_err(|e| UploadClientError::ValidationError(e.to_string()))?
            } else {
                body.to_vec()
            };

            let etag = Self::etag(&payload);
            let mut uploads = self.uploads.lock();
            let upload = uploads.get_mut(upload_id).expect("unknown upload");
            assert_eq!(upload.file_id, query.file_id);
            if query.compressed {
                upload.compressed_chunks += 1;
            }
            upload.parts.insert(chunk_number, (etag.clone(), payload));
            Ok(ChunkUploadResponse {
                etag,
                part_number: chunk_number,
            })
        }

        async fn complete_upload(&self, upload_id: &str, req: CompleteUploadRequest) -> Result<CompleteUploadResponse> {
            let mut uploads = self.uploads.lock();
            let upload = uploads.remove(upload_id).expect("unknown upload");

            let mut assembled = Vec::new();
            for (i, part) in req.parts.iter().enumerate() {
                assert_eq!(part.part_number, i as u32 + 1, "parts must arrive sorted and dense");
                let (etag, body) = &upload.parts[&part.part_number];
                assert_eq!(*etag, part.etag);
                assembled.extend_from_slice(body);
            }
            self.objects.lock().insert(upload.key.clone(), assembled);
            Ok(CompleteUploadResponse {
                location: format!("stub://{}", upload.key),
                key: upload.key,
                file_extension: req.file_extension,
            })
        }

        async fn abort_upload(&self, upload_id: &str, _file_id: &str) -> Result<()> {
            self.uploads.lock().remove(upload_id);
            self.aborted.lock().push(upload_id.to_owned());
            Ok(())
        }
    }

    fn test_config(chunk_size: u64, max_parallel: usize, mode: CompressionMode) -> UploaderConfig {
        UploaderConfig {
            chunk_size,
            max_parallel,
            compression_mode: mode,
            ..Default::default()
        }
    }

    fn patterned_bytes(n: usize) -> Bytes {
        Bytes::from((0..n).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    #[tokio::test]
    async fn test_multi_chunk_upload() {
        let service = Arc::new(StubService::new());
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 3, CompressionMode::Never)).unwrap();

        let data = patterned_bytes(2500);
        let summary = uploader.upload_bytes(data.clone(), "movie.mp4").await.unwrap();

        assert_eq!(summary.total_chunks, 3);
        assert_eq!(summary.size, 2500);
        assert_eq!(summary.file_extension.as_deref(), Some("mp4"));
        assert!(summary.key.ends_with(".mp4"));
        assert_eq!(summary.location, format!("stub://{}", summary.key));
        assert!(!summary.compression_enabled);
        assert!(summary.compression_ratio.is_none());
        assert!(summary.throughput_mbps > 0.0);

        assert_eq!(service.object(&summary.key).unwrap(), data.to_vec());
    }

    #[tokio::test]
    async fn test_concurrency_bound_respected() {
        let service = Arc::new(StubService {
            chunk_delay: Duration::from_millis(10),
            ..StubService::new()
        });
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 3, CompressionMode::Never)).unwrap();

        let data = patterned_bytes(12_000);
        uploader.upload_bytes(data, "big.bin").await.unwrap();

        assert_le!(service.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_to_success() {
        let service = Arc::new(StubService::new());
        service.fail_chunk(2, 2);
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 2, CompressionMode::Never)).unwrap();

        let data = patterned_bytes(3000);
        let summary = uploader.upload_bytes(data.clone(), "f.bin").await.unwrap();

        // Two injected failures plus the success.
        assert_eq!(service.calls_for(2), 3);
        assert_eq!(service.object(&summary.key).unwrap(), data.to_vec());
        assert!(service.aborted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_aborts_upload() {
        let service = Arc::new(StubService::new());
        service.fail_chunk(2, 100);
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 2, CompressionMode::Never)).unwrap();

        let err = uploader.upload_bytes(patterned_bytes(3000), "f.bin").await.unwrap_err();

        match err {
            UploadClientError::ChunkFailed {
                chunk_number, attempts, ..
            } => {
                assert_eq!(chunk_number, 2);
                assert_eq!(attempts, DEFAULT_MAX_RETRIES_PER_CHUNK + 1);
            },
            other => panic!("expected ChunkFailed, got {other}"),
        }
        // The initial attempt plus max_retries.
        assert_eq!(service.calls_for(2), DEFAULT_MAX_RETRIES_PER_CHUNK + 1);
        // The backend session was cleaned up.
        assert_eq!(service.aborted.lock().len(), 1);
        assert!(service.objects.lock().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_not_retried() {
        let service = Arc::new(StubService {
            fail_status: 400,
            ..StubService::new()
        });
        service.fail_chunk(1, 1);
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 2, CompressionMode::Never)).unwrap();

        let err = uploader.upload_bytes(patterned_bytes(3000), "f.bin").await.unwrap_err();
        assert!(matches!(err, UploadClientError::ChunkFailed { chunk_number: 1, attempts: 1, .. }), "{err}");
        assert_eq!(service.calls_for(1), 1);
        assert_eq!(service.aborted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_compression_on_compressible_data() {
        let service = Arc::new(StubService::new());
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 3, CompressionMode::Auto)).unwrap();

        let data = Bytes::from(vec![7u8; 10_000]);
        let summary = uploader.upload_bytes(data.clone(), "zeros.raw").await.unwrap();

        assert!(summary.compression_enabled);
        assert!(summary.compression_ratio.unwrap() < 1.0);
        assert!(summary.compressed_bytes < summary.size);
        assert_eq!(service.object(&summary.key).unwrap(), data.to_vec());
    }

    #[tokio::test]
    async fn test_auto_compression_off_for_random_data() {
        let service = Arc::new(StubService::new());
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 3, CompressionMode::Auto)).unwrap();

        let mut raw = vec![0u8; 5000];
        thread_rng().fill_bytes(&mut raw);
        let data = Bytes::from(raw);
        let summary = uploader.upload_bytes(data.clone(), "noise.bin").await.unwrap();

        assert!(!summary.compression_enabled);
        let uploads_seen = service.object(&summary.key).unwrap();
        assert_eq!(uploads_seen, data.to_vec());
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let service = Arc::new(StubService::new());
        let uploader = FileUploader::with_service(service, test_config(1000, 3, CompressionMode::Never)).unwrap();
        assert!(matches!(
            uploader.upload_bytes(Bytes::new(), "empty").await.unwrap_err(),
            UploadClientError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_upload_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let data = patterned_bytes(4096);
        std::fs::write(&path, &data).unwrap();

        let service = Arc::new(StubService::new());
        let uploader =
            FileUploader::with_service(service.clone(), test_config(1000, 2, CompressionMode::Never)).unwrap();

        let summary = uploader.upload_file(&path).await.unwrap();
        assert_eq!(summary.original_name, "report.pdf");
        assert_eq!(summary.file_extension.as_deref(), Some("pdf"));
        assert_eq!(summary.total_chunks, 5);
        assert_eq!(service.object(&summary.key).unwrap(), data.to_vec());
    }

    #[derive(Debug, Default)]
    struct CountingProgress {
        bytes: AtomicU64,
        chunks: AtomicUsize,
    }

    impl UploadProgress for CountingProgress {
        fn bytes_transferred(&self, delta: u64) {
            self.bytes.fetch_add(delta, Ordering::Relaxed);
        }

        fn chunk_completed(&self, _chunk_number: u32, _total_chunks: u32) {
            self.chunks.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn test_progress_callbacks() {
        let service = Arc::new(StubService::new());
        let progress = Arc::new(CountingProgress::default());
        let uploader = FileUploader::with_service(service, test_config(1000, 2, CompressionMode::Never))
            .unwrap()
            .with_progress(progress.clone());

        uploader.upload_bytes(patterned_bytes(2500), "f.bin").await.unwrap();

        assert_eq!(progress.bytes.load(Ordering::Relaxed), 2500);
        assert_eq!(progress.chunks.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("movie.mp4"), Some("mp4"));
        assert_eq!(split_extension("archive.tar.gz"), Some("gz"));
        assert_eq!(split_extension("noext"), None);
        assert_eq!(split_extension(".hidden"), None);
        assert_eq!(split_extension("trailing."), None);
    }

    #[test]
    fn test_config_validation() {
        let service: Arc<dyn UploadService> = Arc::new(StubService::new());
        assert!(FileUploader::with_service(service.clone(), test_config(0, 3, CompressionMode::Never)).is_err());
        assert!(FileUploader::with_service(service, test_config(1000, 0, CompressionMode::Never)).is_err());
    }
}
