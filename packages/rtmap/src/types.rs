use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a read by its channel slot and per-read number.
///
/// The number doubles as a generation tag: a result carrying a key whose number
/// no longer matches the channel's front read is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadKey {
    pub channel: u16,
    pub number: u32,
}

/// Incremental fragment of a read's signal, the unit submitted to a map pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub read_id: String,
    /// 0-based channel index
    pub channel: u16,
    pub number: u32,
    /// Position of this chunk within its read
    pub index: usize,
    /// Set on the final chunk of a read so the pool can finalise it
    pub is_last: bool,
    pub signal: Vec<f32>,
}

impl Chunk {
    /// Chunk carrying no signal ("nothing available right now", not "read ended")
    pub fn empty(read_id: impl Into<String>, channel: u16, number: u32, index: usize) -> Self {
        Self {
            read_id: read_id.into(),
            channel,
            number,
            index,
            is_last: false,
            signal: Vec::new(),
        }
    }

    pub fn key(&self) -> ReadKey {
        ReadKey {
            channel: self.channel,
            number: self.number,
        }
    }

    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }
}

/// One read: the signal acquired on a single channel, split into chunks.
///
/// Chunk signal is moved out with [`ReadBuffer::take_chunk`] when submitted and
/// moved back with [`ReadBuffer::restore_chunk`] if the pool turns it away, so
/// retrying a rejected chunk never copies sample data.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBuffer {
    pub id: String,
    /// 0-based channel index
    pub channel: u16,
    pub number: u32,
    /// Sample offset at which the read started on its channel
    pub start_sample: u64,
    num_samples: u64,
    chunks: Vec<Vec<f32>>,
}

impl ReadBuffer {
    pub fn new(
        id: impl Into<String>,
        channel: u16,
        number: u32,
        start_sample: u64,
        chunks: Vec<Vec<f32>>,
    ) -> Self {
        let num_samples = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            id: id.into(),
            channel,
            number,
            start_sample,
            num_samples,
            chunks,
        }
    }

    pub fn key(&self) -> ReadKey {
        ReadKey {
            channel: self.channel,
            number: self.number,
        }
    }

    /// Natural temporal order of reads on a channel
    pub fn order_key(&self) -> (u64, u32) {
        (self.start_sample, self.number)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total samples across all chunks, fixed at construction
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    /// Move the chunk at `index` out of the read.
    ///
    /// Indices at or past `chunk_count()` yield an empty chunk.
    pub fn take_chunk(&mut self, index: usize) -> Chunk {
        let count = self.chunks.len();
        match self.chunks.get_mut(index) {
            Some(signal) => Chunk {
                read_id: self.id.clone(),
                channel: self.channel,
                number: self.number,
                index,
                is_last: index + 1 == count,
                signal: std::mem::take(signal),
            },
            None => Chunk::empty(self.id.clone(), self.channel, self.number, index),
        }
    }

    /// Return a chunk previously taken from this read
    pub fn restore_chunk(&mut self, chunk: Chunk) {
        debug_assert_eq!(chunk.key(), self.key(), "chunk restored to the wrong read");
        if let Some(signal) = self.chunks.get_mut(chunk.index) {
            *signal = chunk.signal;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strand {
    #[serde(rename = "+")]
    Forward,
    #[serde(rename = "-")]
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Where a read aligned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PafTarget {
    pub query_start: u64,
    pub query_end: u64,
    pub strand: Strand,
    pub name: String,
    pub length: u64,
    pub start: u64,
    pub end: u64,
    pub matches: u64,
    pub block_len: u64,
    pub mapq: u8,
}

/// Alignment record produced for a read, rendered as a PAF line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PafRecord {
    pub read_id: String,
    pub read_len: u64,
    pub channel: u16,
    pub number: u32,
    /// Chunks the mapper consumed before deciding
    pub chunks_mapped: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PafTarget>,
    /// The pool could not process this read
    #[serde(default)]
    pub failed: bool,
}

impl PafRecord {
    pub fn unmapped(
        read_id: impl Into<String>,
        read_len: u64,
        channel: u16,
        number: u32,
        chunks_mapped: u32,
    ) -> Self {
        Self {
            read_id: read_id.into(),
            read_len,
            channel,
            number,
            chunks_mapped,
            target: None,
            failed: false,
        }
    }

    pub fn failed(
        read_id: impl Into<String>,
        read_len: u64,
        channel: u16,
        number: u32,
        chunks_mapped: u32,
    ) -> Self {
        Self {
            failed: true,
            ..Self::unmapped(read_id, read_len, channel, number, chunks_mapped)
        }
    }

    pub fn with_target(mut self, target: PafTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn is_mapped(&self) -> bool {
        self.target.is_some()
    }
}

impl fmt::Display for PafRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t", self.read_id, self.read_len)?;
        match &self.target {
            Some(t) => write!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                t.query_start,
                t.query_end,
                t.strand,
                t.name,
                t.length,
                t.start,
                t.end,
                t.matches,
                t.block_len,
                t.mapq
            )?,
            None => write!(f, "*\t*\t*\t*\t*\t*\t*\t*\t*\t255")?,
        }
        // Tags use 1-based channel numbers to match instrument labelling
        write!(
            f,
            "\tch:i:{}\trn:i:{}\tmc:i:{}",
            u32::from(self.channel) + 1,
            self.number,
            self.chunks_mapped
        )?;
        if self.failed {
            write!(f, "\tff:i:1")?;
        }
        Ok(())
    }
}

/// Completed mapping outcome for one read, as drained from a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapResult {
    /// 0-based channel index
    pub channel: u16,
    /// Number of the read the result belongs to
    pub number: u32,
    pub record: PafRecord,
}

impl MapResult {
    pub fn new(record: PafRecord) -> Self {
        Self {
            channel: record.channel,
            number: record.number,
            record,
        }
    }

    pub fn key(&self) -> ReadKey {
        ReadKey {
            channel: self.channel,
            number: self.number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_with_chunks(n: usize) -> ReadBuffer {
        let chunks = (0..n).map(|i| vec![i as f32; 4]).collect();
        ReadBuffer::new("read-a", 3, 7, 1000, chunks)
    }

    #[test]
    fn test_take_and_restore_chunk() {
        let mut read = read_with_chunks(3);
        let chunk = read.take_chunk(1);
        assert_eq!(chunk.index, 1);
        assert_eq!(chunk.signal, vec![1.0; 4]);
        assert!(!chunk.is_last);

        // Signal moved out until restored
        assert!(read.take_chunk(1).is_empty());
        read.restore_chunk(chunk);
        assert_eq!(read.take_chunk(1).signal, vec![1.0; 4]);
    }

    #[test]
    fn test_last_chunk_flag() {
        let mut read = read_with_chunks(3);
        assert!(read.take_chunk(2).is_last);
    }

    #[test]
    fn test_take_past_end_is_empty() {
        let mut read = read_with_chunks(2);
        let chunk = read.take_chunk(2);
        assert!(chunk.is_empty());
        assert!(!chunk.is_last);
        assert_eq!(chunk.key(), read.key());
        assert_eq!(read.chunk_count(), 2);
    }

    #[test]
    fn test_num_samples_fixed_at_construction() {
        let mut read = read_with_chunks(3);
        let _ = read.take_chunk(0);
        assert_eq!(read.num_samples(), 12);
    }

    #[test]
    fn test_unmapped_paf_line() {
        let record = PafRecord::unmapped("read-a", 4000, 0, 12, 2);
        assert_eq!(
            record.to_string(),
            "read-a\t4000\t*\t*\t*\t*\t*\t*\t*\t*\t*\t255\tch:i:1\trn:i:12\tmc:i:2"
        );
    }

    #[test]
    fn test_mapped_paf_line() {
        let record = PafRecord::unmapped("read-b", 4000, 9, 3, 1).with_target(PafTarget {
            query_start: 10,
            query_end: 410,
            strand: Strand::Reverse,
            name: "chr1".to_string(),
            length: 248956422,
            start: 5000,
            end: 5400,
            matches: 380,
            block_len: 400,
            mapq: 60,
        });
        assert!(record.is_mapped());
        assert_eq!(
            record.to_string(),
            "read-b\t4000\t10\t410\t-\tchr1\t248956422\t5000\t5400\t380\t400\t60\tch:i:10\trn:i:3\tmc:i:1"
        );
    }

    #[test]
    fn test_failed_record_tag() {
        let record = PafRecord::failed("read-c", 10, 1, 1, 0);
        assert!(record.failed);
        assert!(!record.is_mapped());
        assert!(record.to_string().ends_with("\tff:i:1"));
    }

    #[test]
    fn test_map_result_takes_key_from_record() {
        let result = MapResult::new(PafRecord::unmapped("r", 1, 5, 42, 0));
        assert_eq!(
            result.key(),
            ReadKey {
                channel: 5,
                number: 42
            }
        );
    }
}
