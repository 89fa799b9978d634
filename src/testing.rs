//! In-memory devices and channel for driving the session without hardware.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::mpsc;

use crate::audio::{EncodedChunk, FrameTap, PLAYBACK_SAMPLE_RATE, PlaybackBuffer};
use crate::channel::{ChannelEvent, ChannelLink, ChannelSender, SessionChannel};
use crate::error::SessionError;
use crate::io::{AudioDevices, EndedCallback, MicrophoneStream, OutputDevice};
use crate::playback::SourceId;
use crate::session::{AudioConfig, LiveConfig};

/// A 24 kHz mono speech chunk lasting `duration` seconds.
pub fn speech_chunk(duration: f64) -> EncodedChunk {
    let frames = (duration * PLAYBACK_SAMPLE_RATE as f64).round() as usize;
    let bytes: Vec<u8> = (0..frames).flat_map(|_| 1000i16.to_le_bytes()).collect();
    EncodedChunk {
        data: STANDARD.encode(bytes),
        mime_type: format!("audio/pcm;rate={PLAYBACK_SAMPLE_RATE}"),
    }
}

/// Output device with a hand-driven clock.
pub struct ManualOutput {
    now: f64,
    started: Vec<(SourceId, f64)>,
    stopped: Vec<SourceId>,
}

impl ManualOutput {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            started: Vec::new(),
            stopped: Vec::new(),
        }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds;
    }

    pub fn start_of(&self, id: SourceId) -> Option<f64> {
        self.started.iter().find(|(s, _)| *s == id).map(|(_, at)| *at)
    }

    pub fn was_stopped(&self, id: SourceId) -> bool {
        self.stopped.contains(&id)
    }
}

impl OutputDevice for ManualOutput {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn sample_rate(&self) -> u32 {
        PLAYBACK_SAMPLE_RATE
    }

    fn start_source(&mut self, id: SourceId, _buffer: PlaybackBuffer, at: f64) -> f64 {
        let at = at.max(self.now);
        self.started.push((id, at));
        at
    }

    fn stop_source(&mut self, id: SourceId) {
        self.stopped.push(id);
    }

    fn close(&mut self) {}
}

#[derive(Debug, Clone, Default)]
pub struct DeviceLog {
    pub mic_acquired: usize,
    pub mic_attached: bool,
    pub mic_released: usize,
    pub output_opened: usize,
    pub output_closed: usize,
    /// `(source, start time, duration)` per scheduled buffer.
    pub started: Vec<(SourceId, f64, f64)>,
    pub stopped: Vec<SourceId>,
}

#[derive(Default)]
struct DeviceShared {
    log: DeviceLog,
    deny_microphone: bool,
    fail_attach: bool,
    fail_output: bool,
    clock: f64,
    tap: Option<FrameTap>,
    on_ended: Option<EndedCallback>,
}

/// Fake microphone and speaker sharing one inspectable log.
#[derive(Clone, Default)]
pub struct FakeDevices {
    shared: Arc<Mutex<DeviceShared>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> DeviceLog {
        self.shared.lock().unwrap().log.clone()
    }

    pub fn deny_microphone(&self) {
        self.shared.lock().unwrap().deny_microphone = true;
    }

    pub fn fail_attach(&self) {
        self.shared.lock().unwrap().fail_attach = true;
    }

    pub fn fail_output(&self) {
        self.shared.lock().unwrap().fail_output = true;
    }

    pub fn restore_output(&self) {
        self.shared.lock().unwrap().fail_output = false;
    }

    pub fn advance(&self, seconds: f64) {
        self.shared.lock().unwrap().clock += seconds;
    }

    /// Deliver captured samples to the attached tap, if any.
    pub fn feed(&self, samples: &[f32]) {
        if let Some(tap) = self.shared.lock().unwrap().tap.as_mut() {
            tap.push(samples);
        }
    }

    /// Report that a source played to completion.
    pub fn finish(&self, id: SourceId) {
        if let Some(on_ended) = self.shared.lock().unwrap().on_ended.as_mut() {
            on_ended(id);
        }
    }
}

impl AudioDevices for FakeDevices {
    fn acquire_microphone(&self, _config: &AudioConfig) -> Result<Box<dyn MicrophoneStream>> {
        let mut shared = self.shared.lock().unwrap();
        if shared.deny_microphone {
            anyhow::bail!("permission denied");
        }
        shared.log.mic_acquired += 1;
        Ok(Box::new(FakeMicrophone {
            shared: self.shared.clone(),
            attached: false,
            released: false,
        }))
    }

    fn open_output(
        &self,
        _config: &AudioConfig,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn OutputDevice>> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_output {
            anyhow::bail!("no output device");
        }
        shared.log.output_opened += 1;
        shared.on_ended = Some(on_ended);
        Ok(Box::new(FakeOutput {
            shared: self.shared.clone(),
            closed: false,
        }))
    }
}

struct FakeMicrophone {
    shared: Arc<Mutex<DeviceShared>>,
    attached: bool,
    released: bool,
}

impl MicrophoneStream for FakeMicrophone {
    fn attach(&mut self, tap: FrameTap) -> Result<()> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_attach {
            anyhow::bail!("stream failed to start");
        }
        shared.tap = Some(tap);
        shared.log.mic_attached = true;
        self.attached = true;
        Ok(())
    }

    fn detach(&mut self) {
        if self.attached {
            let mut shared = self.shared.lock().unwrap();
            shared.tap = None;
            shared.log.mic_attached = false;
            self.attached = false;
        }
    }

    fn release(&mut self) {
        self.detach();
        if !self.released {
            self.released = true;
            self.shared.lock().unwrap().log.mic_released += 1;
        }
    }
}

struct FakeOutput {
    shared: Arc<Mutex<DeviceShared>>,
    closed: bool,
}

impl OutputDevice for FakeOutput {
    fn current_time(&self) -> f64 {
        self.shared.lock().unwrap().clock
    }

    fn sample_rate(&self) -> u32 {
        PLAYBACK_SAMPLE_RATE
    }

    fn start_source(&mut self, id: SourceId, buffer: PlaybackBuffer, at: f64) -> f64 {
        let mut shared = self.shared.lock().unwrap();
        let at = at.max(shared.clock);
        shared.log.started.push((id, at, buffer.duration()));
        at
    }

    fn stop_source(&mut self, id: SourceId) {
        self.shared.lock().unwrap().log.stopped.push(id);
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut shared = self.shared.lock().unwrap();
            shared.log.output_closed += 1;
            shared.on_ended = None;
        }
    }
}

/// Channel sender that records everything it is given.
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<EncodedChunk>>>,
    closes: Arc<AtomicUsize>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EncodedChunk> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl ChannelSender for RecordingSender {
    fn send_realtime_input(&self, chunk: EncodedChunk) -> Result<(), SessionError> {
        self.sent.lock().unwrap().push(chunk);
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ChannelShared {
    reject: bool,
    opens: usize,
    remote: Option<mpsc::UnboundedSender<ChannelEvent>>,
}

/// Session channel whose remote side is driven by the test.
#[derive(Clone, Default)]
pub struct FakeChannel {
    shared: Arc<Mutex<ChannelShared>>,
    sender: RecordingSender,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self) {
        self.shared.lock().unwrap().reject = true;
    }

    pub fn opens(&self) -> usize {
        self.shared.lock().unwrap().opens
    }

    pub fn sender(&self) -> &RecordingSender {
        &self.sender
    }

    /// Emit an event from the remote side of the most recent link.
    pub fn remote(&self, event: ChannelEvent) {
        if let Some(remote) = self.shared.lock().unwrap().remote.as_ref() {
            let _ = remote.send(event);
        }
    }
}

#[async_trait]
impl SessionChannel for FakeChannel {
    async fn open(&self, _config: &LiveConfig) -> Result<ChannelLink, SessionError> {
        let mut shared = self.shared.lock().unwrap();
        if shared.reject {
            return Err(SessionError::ChannelOpenFailure("rejected by remote".to_string()));
        }
        shared.opens += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        shared.remote = Some(tx);
        Ok(ChannelLink {
            sender: Box::new(self.sender.clone()),
            events: rx,
        })
    }
}
