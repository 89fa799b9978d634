//! Configuration for the voice session and its audio devices.

use std::fmt;

use cpal::DeviceId;

use crate::audio::PLAYBACK_SAMPLE_RATE;
use crate::error::SessionError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_VOICE: &str = "Kore";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a friendly technical mentor for GDG KJSSE \
TechSprint. Help students with technical questions about Google technologies. Keep your answers \
brief and encouraging. Speak naturally.";

/// Samples per capture frame (256 ms at 16 kHz).
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Parameters of the remote live session.
#[derive(Clone)]
pub struct LiveConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub voice: String,
    pub system_instruction: Option<String>,
    /// Ask the model for a text transcription of its speech.
    pub output_transcription: bool,
    /// Websocket endpoint override, e.g. a proxy.
    pub endpoint: Option<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            output_transcription: true,
            endpoint: None,
        }
    }
}

impl fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("system_instruction", &self.system_instruction)
            .field("output_transcription", &self.output_transcription)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Audio device selection and framing.
#[derive(Clone, Debug)]
pub struct AudioConfig {
    pub input_device_id: Option<DeviceId>,
    pub output_device_id: Option<DeviceId>,
    /// Samples per capture frame; must be a power of two.
    pub frame_size: usize,
    pub playback_sample_rate: u32,
    /// Channels in the received PCM stream.
    pub playback_channels: usize,
    /// Channels opened on the output device.
    pub output_channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device_id: None,
            output_device_id: None,
            frame_size: DEFAULT_FRAME_SIZE,
            playback_sample_rate: PLAYBACK_SAMPLE_RATE,
            playback_channels: 1,
            output_channels: 2,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct MentorConfig {
    pub live: LiveConfig,
    pub audio: AudioConfig,
}

impl MentorConfig {
    /// Defaults overlaid with `GEMINI_API_KEY` (or `API_KEY`), `LIVE_MODEL`,
    /// `LIVE_VOICE` and `LIVE_ENDPOINT` from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.live.api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Ok(model) = std::env::var("LIVE_MODEL") {
            config.live.model = model;
        }
        if let Ok(voice) = std::env::var("LIVE_VOICE") {
            config.live.voice = voice;
        }
        config.live.endpoint = std::env::var("LIVE_ENDPOINT").ok();
        config
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.live.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(SessionError::Config(
                "no API key set (GEMINI_API_KEY or API_KEY)".to_string(),
            ));
        }
        if self.live.model.trim().is_empty() {
            return Err(SessionError::Config("model name is empty".to_string()));
        }
        if !self.audio.frame_size.is_power_of_two() {
            return Err(SessionError::Config(format!(
                "frame size {} is not a power of two",
                self.audio.frame_size
            )));
        }
        if self.audio.playback_channels == 0 || self.audio.output_channels == 0 {
            return Err(SessionError::Config(
                "channel counts must be positive".to_string(),
            ));
        }
        if self.audio.playback_sample_rate == 0 {
            return Err(SessionError::Config(
                "playback sample rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
