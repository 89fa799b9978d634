//! PCM wire codec.
//!
//! Converts between normalized float samples and the 16-bit little-endian
//! PCM carried as base64 text on the session channel.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::audio::AudioSample;
use crate::audio::frame::{AudioFrame, CAPTURE_SAMPLE_RATE, PlaybackBuffer};
use crate::error::SessionError;

const BYTES_PER_SAMPLE: usize = 2;

/// Base64 PCM payload plus the MIME tag naming its format and rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedChunk {
    pub data: String,
    pub mime_type: String,
}

/// MIME tag for outbound microphone audio.
pub fn capture_mime_type() -> String {
    format!("audio/pcm;rate={CAPTURE_SAMPLE_RATE}")
}

/// Quantize a capture frame to 16-bit PCM and wrap it for transport.
pub fn encode_frame(frame: &AudioFrame) -> EncodedChunk {
    let mut bytes = Vec::with_capacity(frame.len() * BYTES_PER_SAMPLE);
    for &sample in frame.samples() {
        bytes.extend_from_slice(&i16::from_f32_normalized(sample).to_le_bytes());
    }
    EncodedChunk {
        data: STANDARD.encode(&bytes),
        mime_type: capture_mime_type(),
    }
}

/// Unwrap a base64 PCM payload into a planar playback buffer.
///
/// Interleaved samples are split across `channel_count` channels. The byte
/// length must be a whole number of interleaved frames.
pub fn decode_chunk(
    data: &str,
    sample_rate: u32,
    channel_count: usize,
) -> Result<PlaybackBuffer, SessionError> {
    if channel_count == 0 {
        return Err(SessionError::MalformedAudioChunk(
            "channel count must be positive".to_string(),
        ));
    }

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| SessionError::MalformedAudioChunk(format!("invalid base64: {e}")))?;

    let stride = BYTES_PER_SAMPLE * channel_count;
    if bytes.len() % stride != 0 {
        return Err(SessionError::MalformedAudioChunk(format!(
            "{} bytes is not a multiple of {} ({} channel(s) of 16-bit PCM)",
            bytes.len(),
            stride,
            channel_count
        )));
    }

    let frame_count = bytes.len() / stride;
    let mut channels = vec![Vec::with_capacity(frame_count); channel_count];
    for (idx, pair) in bytes.chunks_exact(BYTES_PER_SAMPLE).enumerate() {
        let value = i16::from_le_bytes([pair[0], pair[1]]);
        channels[idx % channel_count].push(value.to_f32_normalized());
    }

    PlaybackBuffer::new(channels, sample_rate)
        .map_err(|e| SessionError::MalformedAudioChunk(e.to_string()))
}

/// Read the `rate=` parameter of a PCM MIME tag such as `audio/pcm;rate=24000`.
pub fn parse_pcm_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse().ok())
}
