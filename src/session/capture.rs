//! Microphone capture pipeline.
//!
//! ```text
//! MicrophoneStream ──► FrameTap ──► frame-ready event ──► encode_frame ──► ChannelSender
//!                                                             │
//!                                                 (queued until a channel is given)
//! ```

use std::collections::VecDeque;

use anyhow::Result;
use tracing::{debug, info};

use crate::audio::{AudioFrame, EncodedChunk, FrameTap, encode_frame};
use crate::channel::ChannelSender;
use crate::error::SessionError;
use crate::io::MicrophoneStream;

/// Encodes microphone frames and forwards them to the session channel in
/// capture order.
///
/// Frames that arrive while no channel is available are queued and flushed,
/// oldest first, before the next frame is sent.
pub struct CapturePipeline {
    microphone: Option<Box<dyn MicrophoneStream>>,
    pending: VecDeque<EncodedChunk>,
    frames_sent: u64,
}

impl CapturePipeline {
    pub fn new() -> Self {
        Self {
            microphone: None,
            pending: VecDeque::new(),
            frames_sent: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.microphone.is_some()
    }

    #[cfg(test)]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    #[cfg(test)]
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Attach `tap` to `microphone` and take ownership of the stream.
    ///
    /// On failure the stream is released and no tap stays attached.
    pub fn start(&mut self, mut microphone: Box<dyn MicrophoneStream>, tap: FrameTap) -> Result<()> {
        if self.microphone.is_some() {
            debug!("Capture already running, releasing extra microphone");
            microphone.release();
            return Ok(());
        }
        let frame_size = tap.frame_size();
        if let Err(e) = microphone.attach(tap) {
            microphone.detach();
            microphone.release();
            return Err(e);
        }
        info!("Capture started ({} samples per frame)", frame_size);
        self.microphone = Some(microphone);
        self.frames_sent = 0;
        Ok(())
    }

    /// Encode a captured frame and submit it, or queue it when `channel` is `None`.
    ///
    /// Frames delivered after [`stop`](Self::stop) are dropped.
    pub fn on_frame(
        &mut self,
        frame: &AudioFrame,
        channel: Option<&dyn ChannelSender>,
    ) -> Result<(), SessionError> {
        if !self.is_running() {
            debug!("Dropping frame captured after stop");
            return Ok(());
        }
        let chunk = encode_frame(frame);
        match channel {
            Some(channel) => {
                self.flush(channel)?;
                channel.send_realtime_input(chunk)?;
                self.frames_sent += 1;
            }
            None => self.pending.push_back(chunk),
        }
        Ok(())
    }

    /// Send every queued frame, oldest first.
    pub fn flush(&mut self, channel: &dyn ChannelSender) -> Result<(), SessionError> {
        while let Some(chunk) = self.pending.pop_front() {
            channel.send_realtime_input(chunk)?;
            self.frames_sent += 1;
        }
        Ok(())
    }

    /// Detach the tap and release the microphone. No-op when not started.
    pub fn stop(&mut self) {
        self.pending.clear();
        if let Some(mut microphone) = self.microphone.take() {
            microphone.detach();
            microphone.release();
            info!("Capture stopped after {} frames", self.frames_sent);
        }
    }
}

impl Default for CapturePipeline {
    fn default() -> Self {
        Self::new()
    }
}
