//! Playback of streamed speech.
//!
//! - [`scheduler::PlaybackScheduler`] - Owns the timeline cursor and the set of live sources
//! - [`timeline::OutputTimeline`] - Mixes scheduled sources into device blocks

pub mod scheduler;
pub mod timeline;

pub use scheduler::PlaybackScheduler;
pub use timeline::OutputTimeline;

use std::fmt;

/// Handle of one scheduled playback buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
