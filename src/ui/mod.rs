//! User interface components.
//!
//! This module provides the Dioxus-based UI for the application:
//!
//! - [`app`] - Main application entry point, mirrors the session status into a signal
//! - [`mentor`] - Voice session panel: talk button, status, level meter, transcript

mod app;
mod mentor;

pub use app::App;
