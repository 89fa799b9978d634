//! Application state shared with the UI.
//!
//! - [`AppState`] - Owns the voice session handle for the lifetime of the window

use anyhow::Result;
use std::sync::Arc;

use crate::session::{MentorConfig, SessionHandle, SessionStatus};

/// Shared application state
pub struct AppState {
    pub session: SessionHandle,
    /// Model and voice shown in the header.
    pub model: String,
    pub voice: String,
}

impl AppState {
    pub fn new(config: MentorConfig) -> Result<Arc<Self>> {
        let model = config.live.model.clone();
        let voice = config.live.voice.clone();
        let session = SessionHandle::spawn(config)?;
        Ok(Arc::new(Self {
            session,
            model,
            voice,
        }))
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }
}
