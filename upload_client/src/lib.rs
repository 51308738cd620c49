#![cfg_attr(feature = "strict", deny(warnings))]

//! Client-side chunk scheduler for resumable multipart uploads.
//!
//! [`FileUploader`] splits a file into fixed-size chunks, decides once per
//! upload whether to compress, transmits chunks under a bounded worker pool
//! with transient-fault retry, and finalizes the object when every part is
//! acknowledged.

pub use crate::auth::{AuthConfig, AuthMiddleware, TokenProvider};
pub use crate::chunks::{plan_chunks, ChunkSpec, ChunkState, ChunkTask};
pub use crate::error::UploadClientError;
pub use crate::http_service::HttpUploadService;
pub use crate::progress::{NoOpProgress, UploadProgress};
pub use crate::scheduler::{
    FileUploader, UploadSummary, UploaderConfig, DEFAULT_CHUNK_SIZE, DEFAULT_ENDPOINT, DEFAULT_MAX_PARALLEL,
    DEFAULT_MAX_RETRIES_PER_CHUNK,
};
pub use crate::service::UploadService;

mod auth;
mod chunks;
mod error;
mod http_service;
mod progress;
mod scheduler;
mod service;
