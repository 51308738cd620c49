//! Chunk planning and per-task state.
//!
//! Part numbering is assigned deterministically from byte offset before
//! anything is dispatched, so the assembled object is byte-correct no matter
//! what order the network completes chunks in.

/// One contiguous byte range of the source, the unit of transmission.
/// Ranges are half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    /// 1-based chunk number; doubles as the backend part number.
    pub number: u32,
    pub start: u64,
    pub end: u64,
}

impl ChunkSpec {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight,
    Retrying,
    Acked,
    Failed,
}

/// One unit of scheduler work: a chunk plus its retry bookkeeping. A task
/// that fails transiently retries in place, consuming one credit per
/// attempt; exhausting the credits fails the whole upload.
#[derive(Debug, Clone)]
pub struct ChunkTask {
    pub spec: ChunkSpec,
    pub attempts: u32,
    pub state: ChunkState,
}

impl ChunkTask {
    pub fn new(spec: ChunkSpec) -> Self {
        Self {
            spec,
            attempts: 0,
            state: ChunkState::Pending,
        }
    }
}

/// Splits `[0, size)` into `ceil(size / chunk_size)` disjoint contiguous
/// ranges; the last one may be shorter.
pub fn plan_chunks(size: u64, chunk_size: u64) -> Vec<ChunkSpec> {
    debug_assert!(chunk_size > 0);
    let mut specs = Vec::with_capacity(size.div_ceil(chunk_size) as usize);
    let mut start = 0u64;
    let mut number = 1u32;
    while start < size {
        let end = (start + chunk_size).min(size);
        specs.push(ChunkSpec { number, start, end });
        start = end;
        number += 1;
    }
    specs
}
