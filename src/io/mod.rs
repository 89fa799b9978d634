//! Hardware I/O.
//!
//! The session core talks to audio hardware only through the traits below,
//! so it can be driven by fakes in tests:
//!
//! - [`AudioDevices`] - Acquires the microphone and opens the speaker for one session
//! - [`MicrophoneStream`] - A live capture stream a [`FrameTap`] can be attached to
//! - [`OutputDevice`] - A speaker with a clock that plays buffers at scheduled times
//!
//! [`audio`] implements them with cpal.

pub mod audio;

pub use audio::CpalDevices;

use anyhow::Result;

use crate::audio::{FrameTap, PlaybackBuffer};
use crate::playback::SourceId;
use crate::session::AudioConfig;

/// Callback reporting a source that played to completion.
pub type EndedCallback = Box<dyn FnMut(SourceId) + Send>;

pub trait AudioDevices {
    /// Acquire the capture device. Capture does not begin until a tap is attached.
    fn acquire_microphone(&self, config: &AudioConfig) -> Result<Box<dyn MicrophoneStream>>;

    /// Open the output device. `on_ended` may be called from the device thread.
    fn open_output(
        &self,
        config: &AudioConfig,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn OutputDevice>>;
}

pub trait MicrophoneStream {
    /// Start delivering captured samples to `tap`.
    fn attach(&mut self, tap: FrameTap) -> Result<()>;

    /// Stop delivering samples. No-op when nothing is attached.
    fn detach(&mut self);

    /// Release the underlying hardware handle. Safe to call more than once.
    fn release(&mut self);
}

pub trait OutputDevice {
    /// Output clock in seconds.
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> u32;

    /// Play `buffer` starting at `at` seconds on the output clock.
    ///
    /// Returns the start time actually used, read under the same lock as the
    /// clock, which is later than `at` when `at` has already passed.
    fn start_source(&mut self, id: SourceId, buffer: PlaybackBuffer, at: f64) -> f64;

    /// Stop a source immediately. Unknown or finished sources are ignored.
    fn stop_source(&mut self, id: SourceId);

    /// Stop all sources and release the device. Safe to call more than once.
    fn close(&mut self);
}
