#![cfg_attr(feature = "strict", deny(warnings))]

//! Chunk compression for the upload pipeline.
//!
//! Chunks travel LZ4 block-compressed with the uncompressed size prepended,
//! so decompression recovers the exact original bytes without out-of-band
//! length bookkeeping. Whether a session compresses at all is decided once
//! per upload by [`should_compress`] and then applied uniformly to every
//! chunk of that upload.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A compressed chunk must be at most this fraction of its original size for
/// `auto` mode to turn compression on, i.e. compression must save at least
/// 25% on the sampled chunk.
pub const COMPRESSION_RATIO_THRESHOLD: f64 = 0.75;

#[derive(Error, Debug)]
pub enum ChunkCodecError {
    #[error("Decompression Error: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    #[error("Unknown compression mode: {0}")]
    UnknownMode(String),
}

pub type Result<T> = std::result::Result<T, ChunkCodecError>;

/// Per-upload compression policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Compress every chunk.
    Always,
    /// Never compress.
    Never,
    /// Trial-compress the first chunk and enable compression only if the
    /// ratio clears [`COMPRESSION_RATIO_THRESHOLD`].
    #[default]
    Auto,
}

impl FromStr for CompressionMode {
    type Err = ChunkCodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "always" => Ok(CompressionMode::Always),
            "never" => Ok(CompressionMode::Never),
            "auto" => Ok(CompressionMode::Auto),
            other => Err(ChunkCodecError::UnknownMode(other.to_owned())),
        }
    }
}

/// Compress one chunk. The output embeds the uncompressed length, so
/// [`decompress_chunk`] needs nothing but the bytes themselves.
pub fn compress_chunk(data: &[u8]) -> Vec<u8> {
    lz4_flex::block::compress_prepend_size(data)
}

/// Decompress one chunk produced by [`compress_chunk`]. A corrupt or
/// mismatched payload is a typed error; the caller rejects the chunk rather
/// than forwarding garbage.
pub fn decompress_chunk(data: &[u8]) -> Result<Vec<u8>> {
    Ok(lz4_flex::block::decompress_size_prepended(data)?)
}

/// Decide whether an upload should compress its chunks.
///
/// `sample` is the first chunk of the file (or the whole file if smaller than
/// one chunk). Evaluated exactly once per upload; `auto` pays one trial
/// compression of the sample and nothing more.
pub fn should_compress(mode: CompressionMode, sample: &[u8]) -> bool {
    match mode {
        CompressionMode::Always => true,
        CompressionMode::Never => false,
        CompressionMode::Auto => {
            if sample.is_empty() {
                return false;
            }
            let compressed = compress_chunk(sample);
            let ratio = compressed.len() as f64 / sample.len() as f64;
            ratio <= COMPRESSION_RATIO_THRESHOLD
        },
    }
}

#[cfg(test)]
mod tests {
    use rand::{thread_rng, Rng, RngCore};

    use super::*;

    fn random_bytes(n: usize) -> Vec<u8> {
        let mut data = vec![0u8; n];
        thread_rng().fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_round_trip_exact() {
        for size in [0usize, 1, 100, 1024, 1_000_000] {
            let data = random_bytes(size);
            let compressed = compress_chunk(&data);
            let restored = decompress_chunk(&compressed).unwrap();
            assert_eq!(restored, data);
        }
    }

    #[test]
    fn test_round_trip_compressible() {
        let mut data = Vec::with_capacity(64 * 1024);
        let mut rng = thread_rng();
        while data.len() < 64 * 1024 {
            let run: u8 = rng.gen_range(b'a'..=b'f');
            data.extend(std::iter::repeat(run).take(rng.gen_range(16..512)));
        }
        let compressed = compress_chunk(&data);
        assert!(compressed.len() < data.len());
        assert_eq!(decompress_chunk(&compressed).unwrap(), data);
    }

    #[test]
    fn test_decompress_garbage_fails() {
        // A small prepended size followed by bytes that are not a valid LZ4
        // block.
        let mut garbage = 64u32.to_le_bytes().to_vec();
        garbage.extend_from_slice(&[0xff; 16]);
        assert!(decompress_chunk(&garbage).is_err());
    }

    #[test]
    fn test_mode_short_circuits() {
        let data = random_bytes(4096);
        assert!(should_compress(CompressionMode::Always, &data));
        assert!(!should_compress(CompressionMode::Never, &data));
    }

    #[test]
    fn test_auto_rejects_incompressible() {
        // Uniform random bytes do not compress; the trial must say no.
        let data = random_bytes(256 * 1024);
        assert!(!should_compress(CompressionMode::Auto, &data));
    }

    #[test]
    fn test_auto_accepts_compressible() {
        let data = vec![0u8; 256 * 1024];
        assert!(should_compress(CompressionMode::Auto, &data));
    }

    #[test]
    fn test_auto_empty_sample() {
        assert!(!should_compress(CompressionMode::Auto, &[]));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(CompressionMode::from_str("auto").unwrap(), CompressionMode::Auto);
        assert_eq!(CompressionMode::from_str("always").unwrap(), CompressionMode::Always);
        assert_eq!(CompressionMode::from_str("never").unwrap(), CompressionMode::Never);
        assert!(CompressionMode::from_str("sometimes").is_err());
    }
}
