//! Voice session orchestration.
//!
//! - [`controller`] - Lifecycle state machine owning devices, channel and pipelines
//! - [`capture`] - Microphone frames to the channel
//! - [`runtime`] - Thread and runtime hosting the controller for the UI
//! - [`config`] / [`state`] - Configuration and the status shown to the user

pub mod capture;
pub mod config;
pub mod controller;
pub mod runtime;
pub mod state;

pub use capture::CapturePipeline;
pub use config::{AudioConfig, LiveConfig, MentorConfig};
pub use controller::{SessionCommand, SessionController};
pub use runtime::SessionHandle;
pub use state::{SessionState, SessionStatus};
