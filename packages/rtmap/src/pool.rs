// Processing pool contract
//
// The scheduler only ever talks to a pool through these calls, and none of them
// may block: admission control is expressed as a rejected submission, never as
// waiting.

use crate::types::{Chunk, MapResult, ReadBuffer};

/// Outcome of a non-blocking chunk submission
#[derive(Debug)]
pub enum Submission {
    Accepted,
    /// The pool is at capacity; the chunk is handed back to be retried later
    Rejected(Chunk),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted)
    }
}

/// Asynchronous, admission-controlled mapping pool.
///
/// Implementations are shared between the scheduler and their own workers, so
/// every method takes `&self` and must be safe to call concurrently.
pub trait MapPool: Send + Sync {
    /// Whether the pool has already finished `read`. Safe for reads never submitted.
    fn is_finished(&self, read: &ReadBuffer) -> bool;

    /// Offer a chunk. Rejection only ever means "try again later".
    fn try_submit(&self, chunk: Chunk) -> Submission;

    /// Results completed since the last drain, each exactly once
    fn drain_results(&self) -> Vec<MapResult>;

    /// True iff no submitted work is still outstanding
    fn all_finished(&self) -> bool;

    /// Request cooperative shutdown of all in-flight work. Idempotent.
    fn terminate_all(&self);
}
