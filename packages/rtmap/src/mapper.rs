// Per-read mapping engine seam
//
// The alignment engine itself lives outside this crate. A pool creates one
// mapper per read and feeds it that read's chunks in order on a single worker.

use crate::error::Result;
use crate::types::{Chunk, PafTarget};

/// Decision after feeding a mapper one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum MapStep {
    /// Needs more signal
    Continue,
    /// Confidently placed the read
    Mapped(PafTarget),
    /// Gave up on the read
    Unmapped,
}

pub trait ChunkMapper: Send {
    /// Consume the next chunk of the read. An error marks the read as failed.
    fn map_chunk(&mut self, chunk: &Chunk) -> Result<MapStep>;
}

/// Builds a fresh mapper for a read, given its first chunk
pub type MapperFactory = dyn Fn(&Chunk) -> Box<dyn ChunkMapper> + Send + Sync;
