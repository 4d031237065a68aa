// Read sources feeding the loader
//
// A source yields reads one at a time until exhausted. Exhaustion is the normal
// end condition; errors are reserved for input that cannot be turned into a read.

use crate::error::{MapError, Result};
use crate::replay::{ReplayAlignment, ReplayTable};
use crate::types::ReadBuffer;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use std::sync::Arc;

pub trait ReadSource {
    /// Whether another read can be pulled
    fn has_more(&self) -> bool;

    /// Pull the next read. Only called while `has_more()` is true.
    fn next_read(&mut self) -> Result<ReadBuffer>;
}

/// In-memory source, yielding reads in the order given
#[derive(Debug, Default)]
pub struct VecReadSource {
    reads: VecDeque<ReadBuffer>,
}

impl VecReadSource {
    pub fn new(reads: impl IntoIterator<Item = ReadBuffer>) -> Self {
        Self {
            reads: reads.into_iter().collect(),
        }
    }
}

impl ReadSource for VecReadSource {
    fn has_more(&self) -> bool {
        !self.reads.is_empty()
    }

    fn next_read(&mut self) -> Result<ReadBuffer> {
        self.reads
            .pop_front()
            .ok_or_else(|| MapError::Parse("read source exhausted".to_string()))
    }
}

/// One line of a JSON-lines read file
#[derive(Debug, Deserialize)]
struct ReadLine {
    id: String,
    /// 0-based channel index
    channel: u16,
    number: u32,
    #[serde(default)]
    start_sample: u64,
    chunks: Vec<Vec<f32>>,
    #[serde(default)]
    replay: Option<ReplayAlignment>,
}

/// Replays recorded reads from JSON-lines files, one read per line.
///
/// Files are read in the order given. Blank lines are skipped. Alignments
/// recorded under `replay` are published to an optional [`ReplayTable`] as their
/// reads are pulled.
pub struct JsonlReadSource {
    paths: VecDeque<PathBuf>,
    current: Option<(PathBuf, Lines<BufReader<File>>, usize)>,
    // Look-ahead so `has_more` can answer without I/O; errors wait their turn
    pending: Option<Result<ReadLine>>,
    replay_table: Option<Arc<ReplayTable>>,
}

impl JsonlReadSource {
    /// Open a source over `paths`; fails if any file is missing.
    pub fn open<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: VecDeque<PathBuf> = paths.into_iter().map(Into::into).collect();
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(MapError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("read file not found: {}", missing.display()),
            )));
        }

        let mut source = Self {
            paths,
            current: None,
            pending: None,
            replay_table: None,
        };
        source.pending = source.read_line();
        Ok(source)
    }

    /// Publish replayed alignments into `table` as reads are pulled
    pub fn with_replay_table(mut self, table: Arc<ReplayTable>) -> Self {
        self.replay_table = Some(table);
        self
    }

    fn read_line(&mut self) -> Option<Result<ReadLine>> {
        loop {
            if self.current.is_none() {
                let path = self.paths.pop_front()?;
                log::debug!("Reading reads from {}", path.display());
                match File::open(&path) {
                    Ok(file) => self.current = Some((path, BufReader::new(file).lines(), 0)),
                    Err(e) => return Some(Err(MapError::Io(e))),
                }
            }

            let (path, lines, line_no) = self.current.as_mut()?;
            match lines.next() {
                Some(Ok(line)) => {
                    *line_no += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(&line).map_err(|e| {
                        MapError::Parse(format!("{}:{}: {}", path.display(), line_no, e))
                    }));
                }
                Some(Err(e)) => return Some(Err(MapError::Io(e))),
                None => self.current = None,
            }
        }
    }
}

impl ReadSource for JsonlReadSource {
    fn has_more(&self) -> bool {
        self.pending.is_some()
    }

    fn next_read(&mut self) -> Result<ReadBuffer> {
        let next = self.read_line();
        let line = std::mem::replace(&mut self.pending, next)
            .ok_or_else(|| MapError::Parse("read source exhausted".to_string()))??;

        if let (Some(table), Some(replay)) = (&self.replay_table, line.replay) {
            table.insert(line.id.clone(), replay);
        }
        Ok(ReadBuffer::new(
            line.id,
            line.channel,
            line.number,
            line.start_sample,
            line.chunks,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_lines(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_vec_source_drains_in_order() {
        let mut source = VecReadSource::new(vec![
            ReadBuffer::new("a", 0, 1, 0, vec![vec![1.0]]),
            ReadBuffer::new("b", 1, 2, 0, vec![vec![1.0]]),
        ]);
        assert!(source.has_more());
        assert_eq!(source.next_read().unwrap().id, "a");
        assert_eq!(source.next_read().unwrap().id, "b");
        assert!(!source.has_more());
        assert!(source.next_read().is_err());
    }

    #[test]
    fn test_jsonl_source_reads_across_files() {
        let first = write_lines(&[
            r#"{"id":"r1","channel":0,"number":1,"chunks":[[1.0,2.0],[3.0]]}"#,
            "",
            r#"{"id":"r2","channel":3,"number":2,"start_sample":500,"chunks":[[1.0]]}"#,
        ]);
        let second = write_lines(&[r#"{"id":"r3","channel":1,"number":3,"chunks":[]}"#]);

        let mut source = JsonlReadSource::open([first.path(), second.path()]).unwrap();
        let mut ids = Vec::new();
        while source.has_more() {
            ids.push(source.next_read().unwrap());
        }

        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].id, "r1");
        assert_eq!(ids[0].chunk_count(), 2);
        assert_eq!(ids[1].channel, 3);
        assert_eq!(ids[1].start_sample, 500);
        assert_eq!(ids[2].id, "r3");
    }

    #[test]
    fn test_jsonl_source_reports_bad_line() {
        let file = write_lines(&[
            r#"{"id":"r1","channel":0,"number":1,"chunks":[]}"#,
            r#"{"id":"r2","channel":"x"}"#,
        ]);
        let mut source = JsonlReadSource::open([file.path()]).unwrap();
        assert_eq!(source.next_read().unwrap().id, "r1");
        assert!(source.has_more());
        let err = source.next_read().unwrap_err();
        match err {
            MapError::Parse(msg) => assert!(msg.contains(":2:"), "unexpected message {}", msg),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_jsonl_source_missing_file() {
        let result = JsonlReadSource::open(["/nonexistent/reads.jsonl"]);
        assert!(matches!(result, Err(MapError::Io(_))));
    }

    #[test]
    fn test_jsonl_source_publishes_replay() {
        let file = write_lines(&[
            r#"{"id":"r1","channel":0,"number":1,"chunks":[[1.0]],"replay":{"after_chunks":1}}"#,
        ]);
        let table = Arc::new(ReplayTable::new());
        let mut source = JsonlReadSource::open([file.path()])
            .unwrap()
            .with_replay_table(Arc::clone(&table));

        // Published as the read is pulled, not on open
        assert!(table.get("r1").is_none());
        source.next_read().unwrap();
        assert!(table.get("r1").is_some());
    }
}
