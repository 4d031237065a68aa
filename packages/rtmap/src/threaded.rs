// Threaded map pool
//
// Runs one long-lived worker per thread on a dedicated rayon pool. Every read is
// pinned to a single worker for its whole life so its mapper state never
// crosses threads; new reads go to the worker with the fewest active reads.
// Workers are fed through bounded channels, and a full channel is reported to
// the scheduler as a rejected submission.

use crate::config::RtMapConfig;
use crate::error::{MapError, Result};
use crate::mapper::{ChunkMapper, MapStep, MapperFactory};
use crate::pool::{MapPool, Submission};
use crate::types::{Chunk, MapResult, PafRecord, ReadBuffer, ReadKey};
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use crossbeam::queue::SegQueue;
use crossbeam::sync::WaitGroup;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Bookkeeping for a read admitted to the pool
#[derive(Debug)]
struct ActiveRead {
    worker: usize,
    /// Chunks sent to the worker but not yet processed
    queued: usize,
    finished: bool,
}

struct Shared {
    reads: Mutex<HashMap<ReadKey, ActiveRead>>,
    // Finished reads whose result has not been drained yet
    finished: Mutex<HashSet<ReadKey>>,
    results: SegQueue<MapResult>,
    /// Active reads per worker
    loads: Vec<AtomicUsize>,
    stopping: AtomicBool,
    factory: Arc<MapperFactory>,
    max_chunks: u32,
}

impl Shared {
    /// Record that `worker` processed one chunk of `key`, releasing the read
    /// once it is finished and nothing more is queued for it
    fn chunk_done(&self, key: ReadKey, worker: usize, finished_now: bool) {
        let mut reads = self.reads.lock();
        let Some(entry) = reads.get_mut(&key) else {
            return;
        };
        entry.queued = entry.queued.saturating_sub(1);
        entry.finished |= finished_now;
        if entry.finished && entry.queued == 0 {
            reads.remove(&key);
            self.loads[worker].fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn publish(&self, record: PafRecord) {
        let result = MapResult::new(record);
        self.finished.lock().insert(result.key());
        self.results.push(result);
    }
}

/// Mapping progress of a read on its worker
struct Progress {
    mapper: Box<dyn ChunkMapper>,
    read_id: String,
    samples: u64,
    chunks: u32,
}

pub struct ThreadedMapPool {
    shared: Arc<Shared>,
    senders: RwLock<Vec<Sender<Chunk>>>,
    max_active_reads: usize,
    wait_group: Mutex<Option<WaitGroup>>,
    // Owns the worker threads; dropped after they have been told to exit
    _workers: rayon::ThreadPool,
}

impl ThreadedMapPool {
    /// Start `config.global.threads` workers mapping reads with mappers built by `factory`
    pub fn new(config: &RtMapConfig, factory: Arc<MapperFactory>) -> Result<Self> {
        config.validate()?;
        let threads = config.global.threads;

        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("rtmap-worker-{}", i))
            .build()
            .map_err(|e| MapError::ThreadPool(e.to_string()))?;

        let shared = Arc::new(Shared {
            reads: Mutex::new(HashMap::new()),
            finished: Mutex::new(HashSet::new()),
            results: SegQueue::new(),
            loads: (0..threads).map(|_| AtomicUsize::new(0)).collect(),
            stopping: AtomicBool::new(false),
            factory,
            max_chunks: config.pool.max_chunks,
        });

        let wait_group = WaitGroup::new();
        let mut senders = Vec::with_capacity(threads);
        for worker in 0..threads {
            let (tx, rx) = bounded(config.pool.chunk_queue_len);
            senders.push(tx);
            let shared = Arc::clone(&shared);
            let wg = wait_group.clone();
            workers.spawn(move || {
                run_worker(worker, rx, &shared);
                drop(wg);
            });
        }

        log::info!(
            "Started map pool: {} workers, {} max active reads, {} max chunks per read",
            threads,
            config.pool.max_active_reads,
            config.pool.max_chunks
        );

        Ok(Self {
            shared,
            senders: RwLock::new(senders),
            max_active_reads: config.pool.max_active_reads,
            wait_group: Mutex::new(Some(wait_group)),
            _workers: workers,
        })
    }

    /// Reads admitted and not yet released by their worker
    pub fn active_reads(&self) -> usize {
        self.shared.reads.lock().len()
    }

    fn least_loaded_worker(&self) -> usize {
        self.shared
            .loads
            .iter()
            .enumerate()
            .min_by_key(|(_, load)| load.load(Ordering::Acquire))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

impl MapPool for ThreadedMapPool {
    fn is_finished(&self, read: &ReadBuffer) -> bool {
        let key = read.key();
        if self.shared.finished.lock().contains(&key) {
            return true;
        }
        self.shared
            .reads
            .lock()
            .get(&key)
            .is_some_and(|entry| entry.finished)
    }

    fn try_submit(&self, chunk: Chunk) -> Submission {
        if self.shared.stopping.load(Ordering::Acquire) {
            return Submission::Rejected(chunk);
        }
        let key = chunk.key();
        let mut reads = self.shared.reads.lock();

        let (worker, is_new) = match reads.get(&key) {
            Some(entry) if entry.finished => return Submission::Accepted,
            Some(entry) => (entry.worker, false),
            None => {
                if self.shared.finished.lock().contains(&key) {
                    return Submission::Accepted;
                }
                if reads.len() >= self.max_active_reads {
                    return Submission::Rejected(chunk);
                }
                (self.least_loaded_worker(), true)
            }
        };

        let senders = self.senders.read();
        let Some(sender) = senders.get(worker) else {
            return Submission::Rejected(chunk);
        };
        match sender.try_send(chunk) {
            Ok(()) => {
                if is_new {
                    self.shared.loads[worker].fetch_add(1, Ordering::AcqRel);
                }
                reads
                    .entry(key)
                    .or_insert(ActiveRead {
                        worker,
                        queued: 0,
                        finished: false,
                    })
                    .queued += 1;
                Submission::Accepted
            }
            Err(TrySendError::Full(chunk)) | Err(TrySendError::Disconnected(chunk)) => {
                Submission::Rejected(chunk)
            }
        }
    }

    fn drain_results(&self) -> Vec<MapResult> {
        let mut out = Vec::with_capacity(self.shared.results.len());
        while let Some(result) = self.shared.results.pop() {
            out.push(result);
        }
        if !out.is_empty() {
            let mut finished = self.shared.finished.lock();
            for result in &out {
                finished.remove(&result.key());
            }
        }
        out
    }

    fn all_finished(&self) -> bool {
        self.shared.reads.lock().is_empty() && self.shared.results.is_empty()
    }

    fn terminate_all(&self) {
        if self.shared.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        // Disconnecting the channels lets idle workers fall out of their loop
        self.senders.write().clear();
        if let Some(wg) = self.wait_group.lock().take() {
            wg.wait();
        }
        let abandoned = {
            let mut reads = self.shared.reads.lock();
            let n = reads.len();
            reads.clear();
            n
        };
        for load in &self.shared.loads {
            load.store(0, Ordering::Release);
        }
        log::info!("Map pool terminated ({} active reads abandoned)", abandoned);
    }
}

impl Drop for ThreadedMapPool {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

fn run_worker(worker: usize, rx: Receiver<Chunk>, shared: &Shared) {
    log::debug!("Worker {} started", worker);
    let mut progress: HashMap<ReadKey, Progress> = HashMap::new();

    for chunk in rx.iter() {
        if shared.stopping.load(Ordering::Acquire) {
            break;
        }
        let key = chunk.key();
        let finished_now = map_one(&mut progress, chunk, shared);
        shared.chunk_done(key, worker, finished_now);
    }
    log::debug!("Worker {} exiting", worker);
}

/// Feed one chunk to its read's mapper. Returns true if the read finished.
fn map_one(progress: &mut HashMap<ReadKey, Progress>, chunk: Chunk, shared: &Shared) -> bool {
    let key = chunk.key();
    let already_done = shared
        .reads
        .lock()
        .get(&key)
        .map_or(true, |entry| entry.finished);
    if already_done {
        return false;
    }

    let state = progress.entry(key).or_insert_with(|| Progress {
        mapper: (shared.factory)(&chunk),
        read_id: chunk.read_id.clone(),
        samples: 0,
        chunks: 0,
    });
    state.samples += chunk.len() as u64;
    state.chunks += 1;

    let step = state.mapper.map_chunk(&chunk);
    let record = match step {
        Ok(MapStep::Continue) if !chunk.is_last && state.chunks < shared.max_chunks => {
            return false;
        }
        Ok(MapStep::Mapped(target)) => {
            PafRecord::unmapped(&state.read_id, state.samples, key.channel, key.number, state.chunks)
                .with_target(target)
        }
        Ok(_) => {
            PafRecord::unmapped(&state.read_id, state.samples, key.channel, key.number, state.chunks)
        }
        Err(e) => {
            log::warn!("Mapping read {} failed: {}", state.read_id, e);
            PafRecord::failed(&state.read_id, state.samples, key.channel, key.number, state.chunks)
        }
    };

    progress.remove(&key);
    shared.publish(record);
    true
}
