//! Gap-free scheduling of received speech chunks.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::audio::{EncodedChunk, decode_chunk, parse_pcm_rate};
use crate::error::SessionError;
use crate::io::OutputDevice;

use super::SourceId;

/// Schedules decoded chunks back-to-back on an output device.
///
/// Owns the timeline cursor `next_start_time` (end of the last scheduled
/// buffer, in output-clock seconds) and the set of sources that are
/// scheduled or playing. Every new buffer starts at
/// `max(next_start_time, now)`, so in-order chunks arriving with network
/// jitter play without gaps and never start in the past.
pub struct PlaybackScheduler {
    next_start_time: f64,
    live: HashSet<SourceId>,
    next_id: u64,
    channel_count: usize,
}

impl PlaybackScheduler {
    pub fn new(channel_count: usize) -> Self {
        Self {
            next_start_time: 0.0,
            live: HashSet::new(),
            next_id: 0,
            channel_count,
        }
    }

    #[cfg(test)]
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    #[cfg(test)]
    pub fn live_sources(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub fn is_live(&self, id: SourceId) -> bool {
        self.live.contains(&id)
    }

    /// Decode `chunk` and schedule it after everything already queued.
    ///
    /// Returns `Ok(None)` for an empty chunk. A malformed chunk is returned
    /// as an error and leaves the schedule untouched.
    pub fn on_chunk_received(
        &mut self,
        output: &mut dyn OutputDevice,
        chunk: &EncodedChunk,
    ) -> Result<Option<SourceId>, SessionError> {
        let sample_rate = output.sample_rate();
        if let Some(declared) = parse_pcm_rate(&chunk.mime_type) {
            if declared != sample_rate {
                warn!(
                    "Chunk declares {} Hz but output runs at {} Hz",
                    declared, sample_rate
                );
            }
        }

        let buffer = decode_chunk(&chunk.data, sample_rate, self.channel_count)?;
        if buffer.frame_count() == 0 {
            debug!("Skipping empty audio chunk");
            return Ok(None);
        }

        let start_at = self.next_start_time.max(output.current_time());
        let duration = buffer.duration();

        let id = SourceId::new(self.next_id);
        self.next_id += 1;

        // The clock may have moved since it was read; the cursor follows the
        // start the output actually chose.
        let started = output.start_source(id, buffer, start_at);
        self.next_start_time = started + duration;
        self.live.insert(id);

        Ok(Some(id))
    }

    /// Forget a source that played to completion.
    pub fn on_source_ended(&mut self, id: SourceId) -> bool {
        self.live.remove(&id)
    }

    /// Barge-in: stop every scheduled or playing source and rewind the cursor.
    ///
    /// Returns how many sources were stopped.
    pub fn on_interrupted(&mut self, output: &mut dyn OutputDevice) -> usize {
        let stopped = self.live.len();
        for id in self.live.drain() {
            output.stop_source(id);
        }
        self.next_start_time = 0.0;
        stopped
    }

    /// Drop all bookkeeping without touching a device, for when the output
    /// is already gone.
    pub fn clear(&mut self) {
        self.live.clear();
        self.next_start_time = 0.0;
    }
}
