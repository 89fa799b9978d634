//! Bidirectional streaming channel to the remote speech model.
//!
//! A [`SessionChannel`] opens a [`ChannelLink`]: a [`ChannelSender`] for
//! outbound microphone chunks plus an ordered stream of [`ChannelEvent`]s.
//! Opening resolves only once the remote side reports it is ready, so a
//! successful `open` doubles as the channel's "open" event.
//!
//! - [`gemini`] - Gemini Live websocket implementation
//! - [`protocol`] - Its JSON wire messages

pub mod gemini;
pub mod protocol;

pub use gemini::GeminiLiveChannel;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::audio::EncodedChunk;
use crate::error::SessionError;
use crate::session::LiveConfig;

/// One decoded server message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerMessage {
    /// Speech chunks in arrival order.
    pub audio: Vec<EncodedChunk>,
    /// The user started talking over the assistant.
    pub interrupted: bool,
    pub turn_complete: bool,
    /// Transcription fragment of the assistant's speech.
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(ServerMessage),
    Error(String),
    Closed(Option<String>),
}

pub trait ChannelSender: Send {
    /// Queue a microphone chunk. Chunks are delivered in call order.
    fn send_realtime_input(&self, chunk: EncodedChunk) -> Result<(), SessionError>;

    /// Ask the remote side to close. Safe to call more than once.
    fn close(&self);
}

pub struct ChannelLink {
    pub sender: Box<dyn ChannelSender>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

#[async_trait]
pub trait SessionChannel: Send + Sync {
    async fn open(&self, config: &LiveConfig) -> Result<ChannelLink, SessionError>;
}
