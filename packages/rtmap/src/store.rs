// Read store loading
//
// Drains a read source into per-channel queues, then puts every queue into
// temporal order. Runs to completion before the first tick.

use crate::channel::ChannelState;
use crate::config::LoaderConfig;
use crate::error::{MapError, Result};
use crate::source::ReadSource;
use serde::{Deserialize, Serialize};

/// What happened during a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub loaded: usize,
    pub skipped_inactive: usize,
    pub skipped_empty: usize,
    /// Channels holding at least one read after loading
    pub channels_used: usize,
}

/// Pull every read from `source` into its channel's queue and sort the queues.
///
/// A read naming a channel outside `channels` aborts the load. Reads on
/// channels excluded by `options.active_chs` and reads without chunks are
/// skipped.
pub fn load_reads<S>(
    source: &mut S,
    channels: &mut [ChannelState],
    options: &LoaderConfig,
) -> Result<LoadSummary>
where
    S: ReadSource + ?Sized,
{
    let mut summary = LoadSummary::default();
    let num_channels = channels.len();

    log::info!("Loading reads");
    while source.has_more() {
        if options.max_reads > 0 && summary.loaded >= options.max_reads {
            log::info!("Read limit of {} reached", options.max_reads);
            break;
        }

        let read = source.next_read()?;
        let channel = channels
            .get_mut(usize::from(read.channel))
            .ok_or(MapError::ChannelOutOfRange {
                channel: read.channel,
                num_channels,
            })?;

        if !options.active_chs.includes(read.channel) {
            log::debug!("Skipping read {} on inactive channel {}", read.id, read.channel);
            summary.skipped_inactive += 1;
            continue;
        }
        if read.chunk_count() == 0 {
            log::warn!("Skipping read {} with no chunks", read.id);
            summary.skipped_empty += 1;
            continue;
        }

        channel.push(read);
        summary.loaded += 1;
    }

    log::info!("Sorting reads");
    for channel in channels.iter_mut() {
        channel.sort();
    }
    summary.channels_used = channels.iter().filter(|c| !c.is_empty()).count();

    log::info!(
        "Loaded {} reads across {} channels ({} inactive, {} empty skipped)",
        summary.loaded,
        summary.channels_used,
        summary.skipped_inactive,
        summary.skipped_empty
    );
    Ok(summary)
}
