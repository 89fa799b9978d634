//! Render side of the playback schedule.
//!
//! The [`OutputTimeline`] is shared between the session event loop, which
//! starts and stops sources on it, and the speaker callback, which renders it.
//!
//! ```text
//!  frames rendered ──────────────►│ now
//!  ┌──────────┐┌──────────┐┌──────┼───┐
//!  │ source 1 ││ source 2 ││ sourc│e 3│   (back-to-back, no gaps)
//!  └──────────┘└──────────┘└──────┼───┘
//!                                 │
//! ```
//!
//! The output clock is the number of frames rendered so far divided by the
//! device sample rate, so it only advances as the device consumes audio.

use tracing::debug;

use crate::audio::PlaybackBuffer;

use super::SourceId;

struct Voice {
    id: SourceId,
    start_frame: u64,
    buffer: PlaybackBuffer,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.buffer.frame_count() as u64
    }
}

pub struct OutputTimeline {
    sample_rate: u32,
    channels: usize,
    rendered_frames: u64,
    voices: Vec<Voice>,
    on_ended: Box<dyn FnMut(SourceId) + Send>,
}

impl OutputTimeline {
    /// `on_ended` is called from [`render`](Self::render) for each source that
    /// plays to completion. Stopped sources are not reported.
    pub fn new(
        sample_rate: u32,
        channels: usize,
        on_ended: impl FnMut(SourceId) + Send + 'static,
    ) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            rendered_frames: 0,
            voices: Vec::new(),
            on_ended: Box::new(on_ended),
        }
    }

    /// Current output time in seconds.
    pub fn current_time(&self) -> f64 {
        self.rendered_frames as f64 / self.sample_rate as f64
    }

    /// Schedule `buffer` to begin at `at` seconds.
    ///
    /// A start time that has already passed starts the source at the
    /// current clock instead, never part-way through. Returns the start
    /// time chosen, in seconds.
    pub fn start(&mut self, id: SourceId, buffer: PlaybackBuffer, at: f64) -> f64 {
        let requested = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        let start_frame = requested.max(self.rendered_frames);
        debug!(
            "Scheduling source {} at frame {} ({} frames)",
            id,
            start_frame,
            buffer.frame_count()
        );
        self.voices.push(Voice {
            id,
            start_frame,
            buffer,
        });
        start_frame as f64 / self.sample_rate as f64
    }

    /// Stop a source immediately. Unknown or finished sources are ignored.
    pub fn stop(&mut self, id: SourceId) -> bool {
        let before = self.voices.len();
        self.voices.retain(|v| v.id != id);
        self.voices.len() != before
    }

    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    #[cfg(test)]
    pub fn active_sources(&self) -> usize {
        self.voices.len()
    }

    /// Mix every scheduled source into an interleaved device block and
    /// advance the clock by the block's frame count.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let channels = self.channels;
        let frames = out.len() / channels;
        let block_start = self.rendered_frames;
        let block_end = block_start + frames as u64;

        for voice in &self.voices {
            let from = voice.start_frame.max(block_start);
            let to = voice.end_frame().min(block_end);
            for frame in from..to {
                let src = (frame - voice.start_frame) as usize;
                let dst = (frame - block_start) as usize * channels;
                for ch in 0..channels {
                    out[dst + ch] += voice.buffer.sample_for_output(ch, src);
                }
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.rendered_frames = block_end;

        let mut idx = 0;
        while idx < self.voices.len() {
            if self.voices[idx].end_frame() <= block_end {
                let voice = self.voices.swap_remove(idx);
                (self.on_ended)(voice.id);
            } else {
                idx += 1;
            }
        }
    }
}
