//! Audio data types and the PCM wire codec.
//!
//! # Data Types
//! - [`AudioSample`] - Trait for sample types converted to and from normalized `f32`
//! - [`frame::AudioFrame`] - One fixed-size tick of 16 kHz microphone audio
//! - [`frame::PlaybackBuffer`] - Decoded planar audio ready for the output timeline
//!
//! # Codec
//! - [`pcm`] - 16-bit little-endian PCM wrapped in base64 for the session channel
//!
//! # Capture helpers
//! - [`tap::FrameTap`] - Slices device blocks into fixed-size frames
//! - [`level`] - RMS level metering

pub mod frame;
pub mod level;
pub mod pcm;
pub mod sample;
pub mod tap;

pub use frame::{AudioFrame, CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE, PlaybackBuffer};
pub use level::calculate_rms_level;
pub use pcm::{EncodedChunk, decode_chunk, encode_frame, parse_pcm_rate};
pub use sample::AudioSample;
pub use tap::FrameTap;
