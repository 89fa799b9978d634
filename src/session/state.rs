//! Session state machine and the status published to the UI.

use crate::error::SessionError;

const MAX_TRANSCRIPT_LINES: usize = 50;

/// Lifecycle of one voice session.
///
/// ```text
/// Idle ──start──► Connecting ──open──► Active ──stop/close──► Closing ──► Idle
///   ▲                 │
///   └── start ── Error ◄── failure
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Closing,
    /// A start attempt failed; resources are released and a new start is allowed.
    Error,
}

impl SessionState {
    pub fn can_start(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Error)
    }

    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Active => "Active",
            SessionState::Closing => "Closing",
            SessionState::Error => "Error",
        }
    }
}

/// Snapshot of the session published to observers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Why the last start attempt failed.
    pub error: Option<SessionError>,
    /// Non-fatal message, e.g. why an active session ended.
    pub notice: Option<String>,
    /// Transcribed assistant speech, one entry per turn.
    pub transcript: Vec<String>,
    /// Microphone RMS level (0-100).
    pub input_level: u32,
}

impl SessionStatus {
    /// Append transcription text to the current turn.
    pub fn append_transcript(&mut self, text: &str) {
        match self.transcript.last_mut() {
            Some(line) => line.push_str(text),
            None => self.transcript.push(text.to_string()),
        }
    }

    /// Close the current turn so the next transcription starts a new line.
    pub fn finish_turn(&mut self) {
        if self.transcript.last().is_some_and(|line| !line.is_empty()) {
            self.transcript.push(String::new());
        }
        if self.transcript.len() > MAX_TRANSCRIPT_LINES {
            let excess = self.transcript.len() - MAX_TRANSCRIPT_LINES;
            self.transcript.drain(..excess);
        }
    }

    /// Transcript lines with the trailing open turn omitted when empty.
    pub fn transcript_lines(&self) -> impl Iterator<Item = &str> {
        self.transcript
            .iter()
            .map(String::as_str)
            .filter(|line| !line.is_empty())
    }
}
