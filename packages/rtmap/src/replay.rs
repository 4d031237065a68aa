// Replay of recorded mapping decisions
//
// Stands in for a live alignment engine when re-running recorded reads: each
// read may carry the alignment it eventually produced and how many chunks the
// engine needed to reach it.

use crate::error::{MapError, Result};
use crate::mapper::{ChunkMapper, MapStep, MapperFactory};
use crate::types::{Chunk, PafTarget};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

fn default_after_chunks() -> u32 {
    1
}

/// Recorded decision for one read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayAlignment {
    /// Non-empty chunks consumed before the decision
    #[serde(default = "default_after_chunks")]
    pub after_chunks: u32,
    /// Alignment to report; None reports the read unmapped
    #[serde(default)]
    pub target: Option<PafTarget>,
    /// Simulate the engine failing on this read
    #[serde(default)]
    pub fail: bool,
}

/// Recorded decisions keyed by read id, shared between loader and workers
#[derive(Debug, Default)]
pub struct ReplayTable {
    alignments: RwLock<HashMap<String, ReplayAlignment>>,
}

impl ReplayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, read_id: String, alignment: ReplayAlignment) {
        self.alignments.write().insert(read_id, alignment);
    }

    pub fn get(&self, read_id: &str) -> Option<ReplayAlignment> {
        self.alignments.read().get(read_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.alignments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.read().is_empty()
    }
}

/// Mapper that replays a [`ReplayAlignment`]. Reads without one never decide,
/// leaving the pool to finalise them unmapped.
pub struct ReplayMapper {
    read_id: String,
    alignment: Option<ReplayAlignment>,
    seen: u32,
}

impl ReplayMapper {
    pub fn new(read_id: impl Into<String>, alignment: Option<ReplayAlignment>) -> Self {
        Self {
            read_id: read_id.into(),
            alignment,
            seen: 0,
        }
    }

    /// Factory creating a replay mapper per read from `table`
    pub fn factory(table: Arc<ReplayTable>) -> Arc<MapperFactory> {
        Arc::new(move |chunk: &Chunk| {
            let alignment = table.get(&chunk.read_id);
            Box::new(ReplayMapper::new(chunk.read_id.clone(), alignment)) as Box<dyn ChunkMapper>
        })
    }
}

impl ChunkMapper for ReplayMapper {
    fn map_chunk(&mut self, chunk: &Chunk) -> Result<MapStep> {
        if chunk.is_empty() {
            return Ok(MapStep::Continue);
        }
        self.seen += 1;

        let Some(alignment) = &self.alignment else {
            return Ok(MapStep::Continue);
        };
        if self.seen < alignment.after_chunks {
            return Ok(MapStep::Continue);
        }
        if alignment.fail {
            return Err(MapError::Mapping(format!(
                "replayed failure for read {}",
                self.read_id
            )));
        }
        Ok(match &alignment.target {
            Some(target) => MapStep::Mapped(target.clone()),
            None => MapStep::Unmapped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Strand;

    fn target() -> PafTarget {
        PafTarget {
            query_start: 0,
            query_end: 450,
            strand: Strand::Forward,
            name: "chr2".to_string(),
            length: 1_000_000,
            start: 1200,
            end: 1650,
            matches: 430,
            block_len: 450,
            mapq: 60,
        }
    }

    fn chunk(index: usize, samples: usize) -> Chunk {
        Chunk {
            read_id: "r1".to_string(),
            channel: 0,
            number: 1,
            index,
            is_last: false,
            signal: vec![0.0; samples],
        }
    }

    #[test]
    fn test_maps_after_recorded_chunk_count() {
        let mut mapper = ReplayMapper::new(
            "r1",
            Some(ReplayAlignment {
                after_chunks: 2,
                target: Some(target()),
                fail: false,
            }),
        );
        assert_eq!(mapper.map_chunk(&chunk(0, 10)).unwrap(), MapStep::Continue);
        // Empty chunks do not count toward the decision
        assert_eq!(mapper.map_chunk(&chunk(1, 0)).unwrap(), MapStep::Continue);
        assert_eq!(
            mapper.map_chunk(&chunk(2, 10)).unwrap(),
            MapStep::Mapped(target())
        );
    }

    #[test]
    fn test_recorded_unmapped() {
        let mut mapper = ReplayMapper::new(
            "r1",
            Some(ReplayAlignment {
                after_chunks: 1,
                target: None,
                fail: false,
            }),
        );
        assert_eq!(mapper.map_chunk(&chunk(0, 10)).unwrap(), MapStep::Unmapped);
    }

    #[test]
    fn test_recorded_failure() {
        let mut mapper = ReplayMapper::new(
            "r1",
            Some(ReplayAlignment {
                after_chunks: 1,
                target: None,
                fail: true,
            }),
        );
        assert!(matches!(
            mapper.map_chunk(&chunk(0, 10)),
            Err(MapError::Mapping(_))
        ));
    }

    #[test]
    fn test_without_recording_never_decides() {
        let mut mapper = ReplayMapper::new("r1", None);
        for i in 0..10 {
            assert_eq!(mapper.map_chunk(&chunk(i, 10)).unwrap(), MapStep::Continue);
        }
    }

    #[test]
    fn test_factory_looks_up_table() {
        let table = Arc::new(ReplayTable::new());
        table.insert(
            "r1".to_string(),
            ReplayAlignment {
                after_chunks: 1,
                target: Some(target()),
                fail: false,
            },
        );
        let factory = ReplayMapper::factory(Arc::clone(&table));
        let first = chunk(0, 5);
        let mut mapper = factory(&first);
        assert_eq!(mapper.map_chunk(&first).unwrap(), MapStep::Mapped(target()));
        assert_eq!(table.len(), 1);
    }
}
