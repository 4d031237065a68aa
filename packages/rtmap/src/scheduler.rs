// Channel-multiplexing scheduler
//
// Each tick makes at most one submission attempt per non-empty channel, in
// ascending channel order, then drains whatever results the pool has ready and
// reconciles them against the channels' front reads. The scheduler never
// blocks and never loops on its own; the caller decides how often to tick.

use crate::channel::{ChannelState, ReadPhase};
use crate::config::{LoaderConfig, RtMapConfig};
use crate::error::Result;
use crate::pool::{MapPool, Submission};
use crate::source::ReadSource;
use crate::store::{load_reads, LoadSummary};
use crate::types::{MapResult, PafRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Running counters, updated every tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub chunks_submitted: u64,
    /// Submission attempts turned away by backpressure
    pub chunks_rejected: u64,
    /// Reads the pool finished before all their chunks were submitted
    pub reads_finished_externally: u64,
    pub reads_retired: u64,
    pub results: u64,
    /// Results whose read was no longer at the front of its channel
    pub stale_results: u64,
}

pub struct MapScheduler<P: MapPool + ?Sized> {
    channels: Vec<ChannelState>,
    pool: Arc<P>,
    loader: LoaderConfig,
    // True iff every channel queue was empty when the last tick scanned it
    channels_empty: bool,
    stats: SchedulerStats,
}

impl<P: MapPool + ?Sized> MapScheduler<P> {
    /// Create a scheduler over `num_channels` channels feeding `pool`
    pub fn new(num_channels: usize, pool: Arc<P>) -> Self {
        Self {
            channels: (0..num_channels).map(|_| ChannelState::new()).collect(),
            pool,
            loader: LoaderConfig::default(),
            channels_empty: false,
            stats: SchedulerStats::default(),
        }
    }

    /// Create a scheduler sized and filtered by `config`
    pub fn from_config(config: &RtMapConfig, pool: Arc<P>) -> Result<Self> {
        config.validate()?;
        let mut scheduler = Self::new(config.global.num_channels, pool);
        scheduler.loader = config.loader.clone();
        Ok(scheduler)
    }

    /// Drain `source` into the channel queues. Call once, before the first tick.
    pub fn load_all<S>(&mut self, source: &mut S) -> Result<LoadSummary>
    where
        S: ReadSource + ?Sized,
    {
        load_reads(source, &mut self.channels, &self.loader)
    }

    /// Run one dispatch round across all channels.
    ///
    /// Returns `(channel, record)` for every result drained this tick, in the
    /// order the pool produced them. Stale results are included.
    pub fn tick(&mut self) -> Vec<(u16, PafRecord)> {
        self.stats.ticks += 1;
        self.channels_empty = true;

        for channel in self.channels.iter_mut() {
            if !channel.activate() {
                continue;
            }
            self.channels_empty = false;

            if channel.phase() == ReadPhase::Submitting {
                if let Some(front) = channel.front() {
                    if self.pool.is_finished(front) {
                        log::debug!(
                            "Read {} on channel {} finished after {} of {} chunks",
                            front.number,
                            front.channel,
                            channel.cursor(),
                            front.chunk_count()
                        );
                        channel.mark_finished();
                        self.stats.reads_finished_externally += 1;
                    }
                }
            }

            if let Some(chunk) = channel.next_chunk() {
                match self.pool.try_submit(chunk) {
                    Submission::Accepted => {
                        channel.advance();
                        self.stats.chunks_submitted += 1;
                    }
                    Submission::Rejected(chunk) => {
                        channel.reject(chunk);
                        self.stats.chunks_rejected += 1;
                    }
                }
            }
        }

        let results = self.pool.drain_results();
        let mut out = Vec::with_capacity(results.len());
        for result in results {
            self.reconcile(&result);
            out.push((result.channel, result.record));
        }
        self.stats.results += out.len() as u64;
        out
    }

    /// Retire the channel's front read if `result` belongs to it
    fn reconcile(&mut self, result: &MapResult) {
        let Some(channel) = self.channels.get_mut(usize::from(result.channel)) else {
            log::warn!(
                "Result for read {} names unknown channel {}",
                result.number,
                result.channel
            );
            self.stats.stale_results += 1;
            return;
        };

        match channel.retire(result.number) {
            Some(read) => {
                log::debug!("Retired read {} on channel {}", read.id, result.channel);
                self.stats.reads_retired += 1;
            }
            None => {
                log::warn!(
                    "Stale result for read {} on channel {} (front is {:?})",
                    result.number,
                    result.channel,
                    channel.front().map(|r| r.number)
                );
                self.stats.stale_results += 1;
            }
        }
    }

    /// False once the last tick found every channel empty and the pool is idle
    pub fn is_running(&self) -> bool {
        !(self.channels_empty && self.pool.all_finished())
    }

    /// Ask the pool to abandon all in-flight work. Channel queues are left as is.
    pub fn stop(&self) {
        log::info!("Stopping map pool");
        self.pool.terminate_all();
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }
}
