//! Session lifecycle controller.
//!
//! Owns the session state machine, the device handles of the current
//! session, and the two pipelines. Every asynchronous notification (channel
//! open, channel messages, captured frames, playback ends) arrives as a
//! [`SessionEvent`] on one queue and is handled to completion before the
//! next, so no two handlers ever run at the same time.
//!
//! ```text
//!             commands (UI)                    events
//!                  │          ┌───────────────────┴──────────────────┐
//!                  ▼          │ channel open   channel msgs   frames │ playback ends
//!        ┌──────────────────────────────────────────────────────────────────┐
//!        │ SessionController   state ─ epoch ─ resources (mic, out, sender) │
//!        │   CapturePipeline ──► sender          PlaybackScheduler ──► out │
//!        └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each start bumps an epoch and every event carries the epoch it was created
//! under. Teardown bumps it again, so results of in-flight work from an
//! abandoned session are recognised and discarded.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::audio::{AudioFrame, FrameTap, calculate_rms_level};
use crate::channel::{ChannelEvent, ChannelLink, ChannelSender, ServerMessage, SessionChannel};
use crate::error::SessionError;
use crate::io::{AudioDevices, EndedCallback, MicrophoneStream, OutputDevice};
use crate::playback::{PlaybackScheduler, SourceId};

use super::capture::CapturePipeline;
use super::config::MentorConfig;
use super::state::{SessionState, SessionStatus};

/// Requests from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Stop,
    /// Stop any session and end the event loop.
    Shutdown,
}

pub enum SessionEvent {
    Opened {
        epoch: u64,
        result: Result<ChannelLink, SessionError>,
    },
    Channel {
        epoch: u64,
        event: ChannelEvent,
    },
    Frame {
        epoch: u64,
        frame: AudioFrame,
    },
    PlaybackEnded {
        epoch: u64,
        id: SourceId,
    },
}

/// Device and channel handles held for the duration of one session.
#[derive(Default)]
struct SessionResources {
    /// Acquired microphone, until capture takes it over.
    microphone: Option<Box<dyn MicrophoneStream>>,
    output: Option<Box<dyn OutputDevice>>,
    channel: Option<Box<dyn ChannelSender>>,
}

pub struct SessionController {
    config: MentorConfig,
    channel: Arc<dyn SessionChannel>,
    devices: Box<dyn AudioDevices>,
    state: SessionState,
    epoch: u64,
    capture: CapturePipeline,
    playback: PlaybackScheduler,
    resources: SessionResources,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl SessionController {
    pub fn new(
        config: MentorConfig,
        channel: Arc<dyn SessionChannel>,
        devices: Box<dyn AudioDevices>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let playback = PlaybackScheduler::new(config.audio.playback_channels);
        Self {
            config,
            channel,
            devices,
            state: SessionState::Idle,
            epoch: 0,
            capture: CapturePipeline::new(),
            playback,
            resources: SessionResources::default(),
            events_tx,
            events_rx,
            status,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Process commands and session events until `Shutdown` or until every
    /// command sender is gone.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        info!("Session controller running");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Start) => self.start(),
                    Some(SessionCommand::Stop) => self.stop(),
                    Some(SessionCommand::Shutdown) | None => {
                        self.stop();
                        break;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
        info!("Session controller stopped");
    }

    /// `Idle`/`Error` -> `Connecting`: acquire devices and open the channel.
    pub fn start(&mut self) {
        if !self.state.can_start() {
            debug!("Ignoring start while {}", self.state.label());
            return;
        }

        self.epoch += 1;
        let epoch = self.epoch;
        self.set_state(SessionState::Connecting);
        self.status.send_modify(|status| {
            status.error = None;
            status.notice = None;
            status.transcript.clear();
            status.input_level = 0;
        });
        info!("Starting voice session (epoch {})", epoch);

        if let Err(e) = self.config.validate() {
            self.fail_start(e);
            return;
        }

        let channel = self.channel.clone();
        let live = self.config.live.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = channel.open(&live).await;
            let _ = events.send(SessionEvent::Opened { epoch, result });
        });

        match self.devices.acquire_microphone(&self.config.audio) {
            Ok(microphone) => self.resources.microphone = Some(microphone),
            Err(e) => {
                self.fail_start(SessionError::PermissionDenied(format!("{e:#}")));
                return;
            }
        }

        let events = self.events_tx.clone();
        let on_ended: EndedCallback = Box::new(move |id| {
            let _ = events.send(SessionEvent::PlaybackEnded { epoch, id });
        });
        match self.devices.open_output(&self.config.audio, on_ended) {
            Ok(output) => self.resources.output = Some(output),
            Err(e) => self.fail_start(SessionError::OutputUnavailable(format!("{e:#}"))),
        }
    }

    /// End the current session, if any. Safe to call in every state.
    pub fn stop(&mut self) {
        match self.state {
            SessionState::Connecting | SessionState::Active => {
                info!("Stopping voice session");
                self.end_session(None);
            }
            SessionState::Closing => debug!("Stop ignored, already closing"),
            SessionState::Idle | SessionState::Error => self.teardown(),
        }
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Opened { epoch, result } => self.on_opened(epoch, result),
            SessionEvent::Channel { epoch, event } => {
                if self.is_current(epoch, SessionState::Active) {
                    self.on_channel_event(event);
                } else {
                    debug!("Discarding channel event from a finished session");
                }
            }
            SessionEvent::Frame { epoch, frame } => {
                if self.is_current(epoch, SessionState::Active) {
                    self.on_frame(frame);
                }
            }
            SessionEvent::PlaybackEnded { epoch, id } => {
                if epoch == self.epoch {
                    self.playback.on_source_ended(id);
                }
            }
        }
    }

    fn is_current(&self, epoch: u64, state: SessionState) -> bool {
        epoch == self.epoch && self.state == state
    }

    /// `Connecting` -> `Active` once the remote side is ready.
    fn on_opened(&mut self, epoch: u64, result: Result<ChannelLink, SessionError>) {
        if !self.is_current(epoch, SessionState::Connecting) {
            if let Ok(link) = result {
                debug!("Closing channel opened for an abandoned session");
                link.sender.close();
            }
            return;
        }

        let ChannelLink { sender, mut events } = match result {
            Ok(link) => link,
            Err(e) => {
                self.fail_start(e);
                return;
            }
        };
        self.resources.channel = Some(sender);

        let forward = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if forward.send(SessionEvent::Channel { epoch, event }).is_err() {
                    break;
                }
            }
        });

        let Some(microphone) = self.resources.microphone.take() else {
            self.fail_start(SessionError::PermissionDenied(
                "microphone was released before the channel opened".to_string(),
            ));
            return;
        };
        let frames = self.events_tx.clone();
        let tap = FrameTap::new(self.config.audio.frame_size, move |frame| {
            let _ = frames.send(SessionEvent::Frame { epoch, frame });
        });
        if let Err(e) = self.capture.start(microphone, tap) {
            self.fail_start(SessionError::PermissionDenied(format!("{e:#}")));
            return;
        }
        if let Some(channel) = self.resources.channel.as_deref() {
            if let Err(e) = self.capture.flush(channel) {
                self.fail_start(e);
                return;
            }
        }

        self.set_state(SessionState::Active);
        info!("Voice session active");
    }

    fn on_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message(message) => self.on_server_message(message),
            ChannelEvent::Error(e) => {
                let err = SessionError::ChannelError(e);
                warn!("{}", err);
                self.end_session(Some(format!("Session ended: {err}")));
            }
            ChannelEvent::Closed(reason) => {
                info!("Remote closed the session: {:?}", reason);
                let notice = match reason {
                    Some(reason) => format!("Session ended by the server: {reason}"),
                    None => "Session ended by the server".to_string(),
                };
                self.end_session(Some(notice));
            }
        }
    }

    fn on_server_message(&mut self, message: ServerMessage) {
        if let Some(output) = self.resources.output.as_deref_mut() {
            for chunk in &message.audio {
                if let Err(e) = self.playback.on_chunk_received(output, chunk) {
                    warn!("Dropping audio chunk: {}", e);
                }
            }
            if message.interrupted {
                let stopped = self.playback.on_interrupted(output);
                info!("Interrupted, stopped {} queued source(s)", stopped);
            }
        }

        if message.transcript.is_some() || message.turn_complete || message.interrupted {
            self.status.send_modify(|status| {
                if let Some(text) = &message.transcript {
                    status.append_transcript(text);
                }
                if message.turn_complete || message.interrupted {
                    status.finish_turn();
                }
            });
        }
        if message.turn_complete {
            debug!("Model turn complete");
        }
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        let level = calculate_rms_level(frame.samples());
        self.status.send_if_modified(|status| {
            let changed = status.input_level != level;
            status.input_level = level;
            changed
        });

        if let Err(e) = self
            .capture
            .on_frame(&frame, self.resources.channel.as_deref())
        {
            warn!("Failed to submit microphone frame: {}", e);
            self.end_session(Some(format!("Session ended: {e}")));
        }
    }

    /// `Connecting` -> `Error` after tearing down whatever was acquired.
    fn fail_start(&mut self, err: SessionError) {
        error!("Failed to start voice session: {}", err);
        self.teardown();
        self.state = SessionState::Error;
        self.status.send_modify(|status| {
            status.state = SessionState::Error;
            status.error = Some(err);
        });
    }

    /// `Active`/`Connecting` -> `Closing` -> `Idle`.
    fn end_session(&mut self, notice: Option<String>) {
        self.set_state(SessionState::Closing);
        self.teardown();
        self.state = SessionState::Idle;
        self.status.send_modify(|status| {
            status.state = SessionState::Idle;
            status.notice = notice;
            status.input_level = 0;
        });
        info!("Voice session ended");
    }

    /// Release every session resource. Idempotent.
    fn teardown(&mut self) {
        self.epoch += 1;
        self.capture.stop();

        match self.resources.output.as_deref_mut() {
            Some(output) => {
                self.playback.on_interrupted(output);
            }
            None => self.playback.clear(),
        }

        if let Some(channel) = self.resources.channel.take() {
            channel.close();
        }
        if let Some(mut microphone) = self.resources.microphone.take() {
            microphone.release();
        }
        if let Some(mut output) = self.resources.output.take() {
            output.close();
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state {} -> {}", self.state.label(), state.label());
        }
        self.state = state;
        self.status.send_modify(|status| status.state = state);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_frame;
    use crate::testing::{FakeChannel, FakeDevices, speech_chunk};

    struct Harness {
        controller: SessionController,
        channel: FakeChannel,
        devices: FakeDevices,
        status: watch::Receiver<SessionStatus>,
    }

    fn harness() -> Harness {
        let mut config = MentorConfig::default();
        config.live.api_key = Some("test-key".to_string());
        config.audio.frame_size = 8;

        let channel = FakeChannel::new();
        let devices = FakeDevices::new();
        let (status_tx, status) = watch::channel(SessionStatus::default());
        let controller = SessionController::new(
            config,
            Arc::new(channel.clone()),
            Box::new(devices.clone()),
            status_tx,
        );
        Harness {
            controller,
            channel,
            devices,
            status,
        }
    }

    impl Harness {
        async fn pump(&mut self) {
            let event = self.controller.events_rx.recv().await.unwrap();
            self.controller.handle_event(event);
        }

        async fn activate(&mut self) {
            self.controller.start();
            assert_eq!(self.controller.state(), SessionState::Connecting);
            self.pump().await;
            assert_eq!(self.controller.state(), SessionState::Active);
        }

        fn audio(&self, durations: &[f64]) {
            self.channel.remote(ChannelEvent::Message(ServerMessage {
                audio: durations.iter().map(|d| speech_chunk(*d)).collect(),
                ..Default::default()
            }));
        }

        fn assert_released(&self) {
            let log = self.devices.log();
            assert!(!log.mic_attached);
            assert_eq!(log.mic_released, log.mic_acquired);
            assert_eq!(log.output_closed, log.output_opened);
        }
    }

    #[tokio::test]
    async fn test_start_opens_channel_then_captures() {
        let mut h = harness();
        h.controller.start();

        assert_eq!(h.status.borrow().state, SessionState::Connecting);
        assert!(!h.devices.log().mic_attached);

        h.pump().await;
        assert_eq!(h.controller.state(), SessionState::Active);
        assert_eq!(h.status.borrow().state, SessionState::Active);
        assert!(h.devices.log().mic_attached);
        assert_eq!(h.channel.opens(), 1);
    }

    #[tokio::test]
    async fn test_captured_frames_reach_channel_in_order() {
        let mut h = harness();
        h.activate().await;

        let samples: Vec<f32> = (0..20).map(|i| i as f32 / 40.0).collect();
        h.devices.feed(&samples);
        h.pump().await;
        h.pump().await;

        let sent = h.channel.sender().sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], encode_frame(&AudioFrame::new(samples[..8].to_vec())));
        assert_eq!(sent[1], encode_frame(&AudioFrame::new(samples[8..16].to_vec())));
        assert!(h.status.borrow().input_level > 0);
    }

    #[tokio::test]
    async fn test_received_audio_is_scheduled_back_to_back() {
        let mut h = harness();
        h.activate().await;
        h.devices.advance(4.0);

        h.audio(&[1.0]);
        h.pump().await;
        h.devices.advance(0.4);
        h.audio(&[1.0]);
        h.pump().await;
        h.devices.advance(0.7);
        h.audio(&[1.0]);
        h.pump().await;

        let started = h.devices.log().started;
        assert_eq!(started.len(), 3);
        let first = started[0].1;
        assert!((first - 4.0).abs() < 1e-9);
        assert!((started[1].1 - (first + 1.0)).abs() < 1e-9);
        assert!((started[2].1 - (first + 2.0)).abs() < 1e-9);
        assert!((h.controller.playback.next_start_time() - (first + 3.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_interruption_clears_playback_and_keeps_session() {
        let mut h = harness();
        h.activate().await;

        h.audio(&[1.0, 1.0, 1.0]);
        h.pump().await;
        h.devices.advance(1.5);

        h.channel.remote(ChannelEvent::Message(ServerMessage {
            interrupted: true,
            ..Default::default()
        }));
        h.pump().await;

        assert_eq!(h.controller.state(), SessionState::Active);
        assert_eq!(h.controller.playback.live_sources(), 0);
        assert_eq!(h.controller.playback.next_start_time(), 0.0);
        assert_eq!(h.devices.log().stopped.len(), 3);

        h.audio(&[0.5]);
        h.pump().await;
        let started = h.devices.log().started;
        assert!((started[3].1 - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ended_source_leaves_live_set() {
        let mut h = harness();
        h.activate().await;
        h.audio(&[0.2]);
        h.pump().await;
        let id = h.devices.log().started[0].0;

        h.devices.finish(id);
        h.pump().await;
        assert!(!h.controller.playback.is_live(id));
    }

    #[tokio::test]
    async fn test_malformed_chunk_does_not_end_session() {
        let mut h = harness();
        h.activate().await;

        let mut bad = speech_chunk(0.1);
        bad.data = "AAAA".to_string();
        h.channel.remote(ChannelEvent::Message(ServerMessage {
            audio: vec![bad, speech_chunk(0.1)],
            ..Default::default()
        }));
        h.pump().await;

        assert_eq!(h.controller.state(), SessionState::Active);
        assert_eq!(h.devices.log().started.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_tears_everything_down_and_is_idempotent() {
        let mut h = harness();
        h.activate().await;
        h.audio(&[1.0, 1.0]);
        h.pump().await;

        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Idle);
        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Idle);

        h.assert_released();
        assert_eq!(h.devices.log().stopped.len(), 2);
        assert_eq!(h.channel.sender().close_count(), 1);
        assert_eq!(h.controller.playback.next_start_time(), 0.0);
        assert_eq!(h.status.borrow().notice, None);
    }

    #[tokio::test]
    async fn test_stop_before_channel_opens_discards_link() {
        let mut h = harness();
        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Idle);

        h.controller.start();
        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Idle);
        h.assert_released();

        // the open completes after the stop and must be closed, not used
        h.pump().await;
        assert_eq!(h.controller.state(), SessionState::Idle);
        assert_eq!(h.channel.sender().close_count(), 1);
        assert!(!h.devices.log().mic_attached);
    }

    #[tokio::test]
    async fn test_denied_microphone_fails_start_without_leaks() {
        let mut h = harness();
        h.devices.deny_microphone();
        h.controller.start();

        assert_eq!(h.controller.state(), SessionState::Error);
        assert!(matches!(
            h.status.borrow().error,
            Some(SessionError::PermissionDenied(_))
        ));
        assert_eq!(h.devices.log().output_opened, 0);

        h.pump().await;
        assert_eq!(h.controller.state(), SessionState::Error);
        assert_eq!(h.channel.sender().close_count(), 1);
        assert!(!h.devices.log().mic_attached);
        assert!(h.channel.sender().sent().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_channel_releases_devices() {
        let mut h = harness();
        h.channel.reject();
        h.controller.start();
        h.pump().await;

        assert_eq!(h.controller.state(), SessionState::Error);
        assert!(matches!(
            h.status.borrow().error,
            Some(SessionError::ChannelOpenFailure(_))
        ));
        h.assert_released();
        assert_eq!(h.devices.log().mic_acquired, 1);
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_acquiring_devices() {
        let mut h = harness();
        h.controller.config.live.api_key = None;
        h.controller.start();

        assert_eq!(h.controller.state(), SessionState::Error);
        assert!(matches!(h.status.borrow().error, Some(SessionError::Config(_))));
        assert_eq!(h.devices.log().mic_acquired, 0);
        assert_eq!(h.channel.opens(), 0);
    }

    #[tokio::test]
    async fn test_retry_after_failed_start() {
        let mut h = harness();
        h.devices.fail_output();
        h.controller.start();
        assert_eq!(h.controller.state(), SessionState::Error);
        h.pump().await;

        h.devices.restore_output();
        h.activate().await;
        assert_eq!(h.status.borrow().error, None);
    }

    #[tokio::test]
    async fn test_remote_error_ends_session_with_notice() {
        let mut h = harness();
        h.activate().await;
        h.audio(&[1.0]);
        h.pump().await;

        h.channel.remote(ChannelEvent::Error("socket reset".to_string()));
        h.pump().await;

        assert_eq!(h.controller.state(), SessionState::Idle);
        let status = h.status.borrow().clone();
        assert!(status.error.is_none());
        assert!(status.notice.unwrap().contains("socket reset"));
        h.assert_released();
        assert_eq!(h.devices.log().stopped.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_close_then_user_stop_is_harmless() {
        let mut h = harness();
        h.activate().await;

        h.channel.remote(ChannelEvent::Closed(None));
        h.pump().await;
        assert_eq!(h.controller.state(), SessionState::Idle);

        h.controller.stop();
        h.assert_released();
        assert_eq!(h.channel.sender().close_count(), 1);
    }

    #[tokio::test]
    async fn test_frames_from_previous_session_are_dropped() {
        let mut h = harness();
        h.activate().await;
        h.devices.feed(&[0.1; 8]);
        h.controller.stop();

        h.pump().await;
        assert!(h.channel.sender().sent().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_collected_per_turn() {
        let mut h = harness();
        h.activate().await;

        for (text, done) in [("Hello ", false), ("world.", true), ("Bye.", true)] {
            h.channel.remote(ChannelEvent::Message(ServerMessage {
                transcript: Some(text.to_string()),
                turn_complete: done,
                ..Default::default()
            }));
            h.pump().await;
        }

        let status = h.status.borrow().clone();
        let lines: Vec<&str> = status.transcript_lines().collect();
        assert_eq!(lines, vec!["Hello world.", "Bye."]);
    }

    #[tokio::test]
    async fn test_run_loop_handles_commands() {
        let Harness {
            controller,
            devices,
            mut status,
            ..
        } = harness();
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = async {
            tx.send(SessionCommand::Start).unwrap();
            status
                .wait_for(|s| s.state == SessionState::Active)
                .await
                .unwrap();
            tx.send(SessionCommand::Shutdown).unwrap();
        };
        tokio::join!(controller.run(rx), driver);

        let log = devices.log();
        assert!(!log.mic_attached);
        assert_eq!(log.mic_released, 1);
        assert_eq!(log.output_closed, 1);
    }
}
