// Per-channel read queue and submission cursor
//
// Each channel owns an ordered queue of reads; only the front read is active.
// The cursor counts how many chunks of the front read a pool has accepted and
// always stays within [0, chunk_count]. The front read moves through three
// phases:
//
//   Submitting --(pool reports it finished)--> Finished
//   Submitting | Finished --(matching result drained)--> Retired
//
// A Retired channel activates its next queued read at the start of the next
// tick, never in the same tick the previous read was popped.

use crate::types::{Chunk, ReadBuffer};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Lifecycle of a channel's front read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadPhase {
    /// Chunks are still being fed to the pool
    Submitting,
    /// The pool finished the read early; no further chunks are submitted
    Finished,
    /// The previous front read was popped; nothing is active yet
    Retired,
}

#[derive(Debug)]
pub struct ChannelState {
    reads: VecDeque<ReadBuffer>,
    cursor: usize,
    phase: ReadPhase,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            cursor: 0,
            phase: ReadPhase::Retired,
        }
    }

    /// Queue a read behind any already waiting on this channel
    pub fn push(&mut self, read: ReadBuffer) {
        self.reads.push_back(read);
    }

    /// Stable sort of the queued reads into temporal order.
    ///
    /// Only valid before any read has been activated.
    pub fn sort(&mut self) {
        debug_assert_eq!(self.phase, ReadPhase::Retired);
        self.reads
            .make_contiguous()
            .sort_by_key(ReadBuffer::order_key);
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn front(&self) -> Option<&ReadBuffer> {
        self.reads.front()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn phase(&self) -> ReadPhase {
        self.phase
    }

    /// Make the front read active if the channel was between reads.
    ///
    /// Returns false if the queue is empty.
    pub fn activate(&mut self) -> bool {
        let Some(front) = self.reads.front() else {
            return false;
        };
        if self.phase == ReadPhase::Retired {
            log::trace!("Channel {} activating read {}", front.channel, front.number);
            self.phase = ReadPhase::Submitting;
        }
        true
    }

    /// Stop feeding the front read: jump the cursor to its end.
    pub fn mark_finished(&mut self) {
        if let Some(front) = self.reads.front() {
            self.cursor = front.chunk_count();
            self.phase = ReadPhase::Finished;
        }
    }

    /// Take the next chunk to submit, if the front read still wants one.
    ///
    /// A taken chunk must be handed back through [`ChannelState::advance`] on
    /// acceptance or [`ChannelState::reject`] on rejection.
    pub fn next_chunk(&mut self) -> Option<Chunk> {
        if self.phase != ReadPhase::Submitting {
            return None;
        }
        let front = self.reads.front_mut()?;
        if self.cursor >= front.chunk_count() {
            return None;
        }
        Some(front.take_chunk(self.cursor))
    }

    /// The pool accepted the chunk at the cursor
    pub fn advance(&mut self) {
        if let Some(front) = self.reads.front() {
            self.cursor = (self.cursor + 1).min(front.chunk_count());
        }
    }

    /// The pool turned the chunk away; keep it for the next attempt
    pub fn reject(&mut self, chunk: Chunk) {
        if let Some(front) = self.reads.front_mut() {
            front.restore_chunk(chunk);
        }
    }

    /// Pop the front read if it is the one numbered `number`.
    ///
    /// Returns the retired read, or None when the number is stale (the front read
    /// has already moved on) or the queue is empty; channel state is untouched in
    /// that case.
    pub fn retire(&mut self, number: u32) -> Option<ReadBuffer> {
        if self.reads.front()?.number != number {
            return None;
        }
        let read = self.reads.pop_front();
        self.cursor = 0;
        self.phase = ReadPhase::Retired;
        read
    }
}
