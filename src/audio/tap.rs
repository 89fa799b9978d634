//! Fixed-size frame tap for microphone input.

use crate::audio::frame::AudioFrame;

/// Slices a raw sample stream into fixed-size [`AudioFrame`]s.
///
/// Device callbacks deliver whatever block size the backend chooses. The tap
/// accumulates those blocks and emits one frame every `frame_size` samples,
/// in capture order, through the `on_frame` callback.
pub struct FrameTap {
    buffer: Vec<f32>,
    frame_size: usize,
    on_frame: Box<dyn FnMut(AudioFrame) + Send>,
}

impl FrameTap {
    pub fn new(frame_size: usize, on_frame: impl FnMut(AudioFrame) + Send + 'static) -> Self {
        debug_assert!(frame_size.is_power_of_two());
        Self {
            buffer: Vec::with_capacity(frame_size * 2),
            frame_size,
            on_frame: Box::new(on_frame),
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Append captured samples, emitting every frame that becomes complete.
    pub fn push(&mut self, samples: &[f32]) {
        self.buffer.extend_from_slice(samples);
        while self.buffer.len() >= self.frame_size {
            let frame: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            (self.on_frame)(AudioFrame::new(frame));
        }
    }
}
