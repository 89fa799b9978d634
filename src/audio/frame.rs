use anyhow::Result;

/// Microphone capture rate expected by the remote speech model.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Rate of the synthesized speech streamed back by the remote model.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// One tick of mono microphone audio at [`CAPTURE_SAMPLE_RATE`].
///
/// Samples are normalized to `[-1.0, 1.0]`. A frame is created by the
/// capture tap, handed to the codec once and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Frame duration in seconds.
    #[cfg(test)]
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / CAPTURE_SAMPLE_RATE as f64
    }
}

/// Decoded, ready-to-play planar audio.
///
/// Each channel holds exactly `frame_count` samples. Once scheduled, the
/// buffer is owned by the output timeline until it ends or is stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    channels: Vec<Vec<f32>>,
    frame_count: usize,
    sample_rate: u32,
}

impl PlaybackBuffer {
    /// Create a buffer from planar channel data.
    ///
    /// Returns an error if there are no channels, the channels differ in
    /// length, or the sample rate is zero.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        let Some(first) = channels.first() else {
            anyhow::bail!("Playback buffer needs at least one channel");
        };
        if sample_rate == 0 {
            anyhow::bail!("Playback buffer sample rate must be positive");
        }
        let frame_count = first.len();
        if let Some(idx) = channels.iter().position(|c| c.len() != frame_count) {
            anyhow::bail!(
                "Channel {} has {} frames, expected {}",
                idx,
                channels[idx].len(),
                frame_count
            );
        }
        Ok(Self {
            channels,
            frame_count,
            sample_rate,
        })
    }

    #[cfg(test)]
    pub fn channel(&self, idx: usize) -> &[f32] {
        &self.channels[idx]
    }

    #[cfg(test)]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Buffer duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }

    /// Sample to play on device channel `out_channel` at `frame`.
    ///
    /// Device channels beyond the buffer's own channel count repeat the
    /// last buffer channel, so mono speech fills every speaker.
    pub fn sample_for_output(&self, out_channel: usize, frame: usize) -> f32 {
        let channel = out_channel.min(self.channels.len() - 1);
        self.channels[channel][frame]
    }
}
