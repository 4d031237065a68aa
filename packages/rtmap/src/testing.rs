//! Test harness for code driving a [`MapPool`].
//!
//! [`ScriptedPool`] does no mapping of its own. It records every chunk it is
//! offered and produces results only when the test tells it to, which makes
//! scheduler behaviour fully deterministic.
//!
//! ```
//! use std::sync::Arc;
//! use rtmap::testing::ScriptedPool;
//! use rtmap::{MapScheduler, ReadBuffer, ReadKey, VecReadSource};
//!
//! let pool = Arc::new(ScriptedPool::new());
//! let mut scheduler = MapScheduler::new(1, Arc::clone(&pool));
//! let read = ReadBuffer::new("r1", 0, 1, 0, vec![vec![0.0; 4]; 2]);
//! scheduler.load_all(&mut VecReadSource::new(vec![read])).unwrap();
//!
//! scheduler.tick();
//! pool.complete(ReadKey { channel: 0, number: 1 });
//! let out = scheduler.tick();
//! assert_eq!(out.len(), 1);
//! ```

use crate::pool::{MapPool, Submission};
use crate::types::{Chunk, MapResult, PafRecord, ReadBuffer, ReadKey};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
struct ScriptState {
    accepting: bool,
    terminated: bool,
    submitted: Vec<Chunk>,
    finished: HashSet<ReadKey>,
    // Samples and chunks seen per read still awaiting a result
    outstanding: HashMap<ReadKey, (String, u64, u32)>,
    results: VecDeque<MapResult>,
}

/// Pool whose admission and completion are driven by the test
#[derive(Debug)]
pub struct ScriptedPool {
    state: Mutex<ScriptState>,
}

impl Default for ScriptedPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedPool {
    /// An empty pool that accepts every chunk
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptState {
                accepting: true,
                ..Default::default()
            }),
        }
    }

    /// Toggle backpressure: while false every submission is rejected
    pub fn set_accepting(&self, accepting: bool) {
        self.state.lock().accepting = accepting;
    }

    /// Report `key` as finished without producing its result yet
    pub fn finish(&self, key: ReadKey) {
        self.state.lock().finished.insert(key);
    }

    /// Finish `key` and queue an unmapped result built from the chunks it received
    pub fn complete(&self, key: ReadKey) {
        let mut state = self.state.lock();
        let (read_id, samples, chunks) = state
            .outstanding
            .remove(&key)
            .unwrap_or_else(|| (format!("read-{}", key.number), 0, 0));
        state.finished.insert(key);
        state.results.push_back(MapResult::new(PafRecord::unmapped(
            read_id,
            samples,
            key.channel,
            key.number,
            chunks,
        )));
    }

    /// Queue an arbitrary result, e.g. one for a read that has already moved on
    pub fn push_result(&self, result: MapResult) {
        self.state.lock().results.push_back(result);
    }

    /// Every chunk accepted so far, in submission order
    pub fn submitted(&self) -> Vec<Chunk> {
        self.state.lock().submitted.clone()
    }

    /// Accepted chunks belonging to `key`
    pub fn submitted_for(&self, key: ReadKey) -> Vec<Chunk> {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|c| c.key() == key)
            .cloned()
            .collect()
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }
}

impl MapPool for ScriptedPool {
    fn is_finished(&self, read: &ReadBuffer) -> bool {
        self.state.lock().finished.contains(&read.key())
    }

    fn try_submit(&self, chunk: Chunk) -> Submission {
        let mut state = self.state.lock();
        if !state.accepting || state.terminated {
            return Submission::Rejected(chunk);
        }
        let entry = state
            .outstanding
            .entry(chunk.key())
            .or_insert_with(|| (chunk.read_id.clone(), 0, 0));
        entry.1 += chunk.len() as u64;
        entry.2 += 1;
        state.submitted.push(chunk);
        Submission::Accepted
    }

    fn drain_results(&self) -> Vec<MapResult> {
        self.state.lock().results.drain(..).collect()
    }

    fn all_finished(&self) -> bool {
        let state = self.state.lock();
        state.outstanding.is_empty() && state.results.is_empty()
    }

    fn terminate_all(&self) {
        let mut state = self.state.lock();
        state.terminated = true;
        state.outstanding.clear();
    }
}
