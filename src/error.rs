//! Error taxonomy for the voice session.

use thiserror::Error;

/// Errors surfaced by the voice session.
///
/// Start-path errors (`Config`, `PermissionDenied`, `OutputUnavailable`,
/// `ChannelOpenFailure`) abort a start attempt. `MalformedAudioChunk` is
/// recovered locally by dropping the chunk. `ChannelError` and
/// `ChannelClosed` end an active session with a notice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Session configuration is incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Microphone could not be acquired (denied, missing or unsupported).
    #[error("Microphone unavailable: {0}")]
    PermissionDenied(String),

    /// Speaker output could not be opened.
    #[error("Audio output unavailable: {0}")]
    OutputUnavailable(String),

    /// Remote channel rejected or failed the connection.
    #[error("Failed to open session channel: {0}")]
    ChannelOpenFailure(String),

    /// Received audio could not be decoded.
    #[error("Malformed audio chunk: {0}")]
    MalformedAudioChunk(String),

    /// Remote channel reported an error mid-session.
    #[error("Session channel error: {0}")]
    ChannelError(String),

    /// Remote channel went away.
    #[error("Session channel closed: {0}")]
    ChannelClosed(String),
}

impl SessionError {
    /// Whether this error aborts a start attempt rather than a running session.
    pub fn is_start_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Config(_)
                | SessionError::PermissionDenied(_)
                | SessionError::OutputUnavailable(_)
                | SessionError::ChannelOpenFailure(_)
        )
    }
}
