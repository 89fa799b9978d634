//! Audio device I/O using cpal.
//!
//! Provides:
//! - [`CpalDevices`] opening the devices below for each session
//! - [`MicrophoneInput`] for mono microphone capture at the capture rate
//! - [`SpeakerOutput`] rendering an [`OutputTimeline`] at the playback rate

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, DeviceId, SampleFormat, StreamConfig};
use dasp_sample::{FromSample, Sample as DaspSample, ToSample};
use tracing::{debug, error, info, warn};

use crate::audio::{CAPTURE_SAMPLE_RATE, FrameTap, PlaybackBuffer};
use crate::playback::{OutputTimeline, SourceId};
use crate::session::AudioConfig;

use super::{AudioDevices, EndedCallback, MicrophoneStream, OutputDevice};

fn find_device_by_id<I: Iterator<Item = Device>>(
    devices: I,
    device_id: &DeviceId,
) -> Option<Device> {
    devices
        .filter_map(|d| d.id().ok().map(|id| (d, id)))
        .find(|(_, id)| id == device_id)
        .map(|(d, _)| d)
}

fn get_input_device(device_id: Option<&DeviceId>) -> Result<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => {
            let devices = host
                .input_devices()
                .context("Failed to enumerate input devices")?;
            find_device_by_id(devices, id).context("Input device not found")
        }
        None => host
            .default_input_device()
            .context("No default input device available"),
    }
}

fn get_output_device(device_id: Option<&DeviceId>) -> Result<Device> {
    let host = cpal::default_host();
    match device_id {
        Some(id) => {
            let devices = host
                .output_devices()
                .context("Failed to enumerate output devices")?;
            find_device_by_id(devices, id).context("Output device not found")
        }
        None => host
            .default_output_device()
            .context("No default output device available"),
    }
}

#[allow(deprecated)]
fn device_display_name(device: &Device) -> String {
    match device.description() {
        Ok(desc) => desc.name().to_string(),
        Err(_) => String::from("Unknown"),
    }
}

/// Default cpal host devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalDevices;

impl AudioDevices for CpalDevices {
    fn acquire_microphone(&self, config: &AudioConfig) -> Result<Box<dyn MicrophoneStream>> {
        Ok(Box::new(MicrophoneInput::open(config)?))
    }

    fn open_output(
        &self,
        config: &AudioConfig,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn OutputDevice>> {
        Ok(Box::new(SpeakerOutput::open(config, on_ended)?))
    }
}

type TapSlot = Arc<Mutex<Option<FrameTap>>>;

/// A microphone stream built at acquisition and paused until a tap is attached.
pub struct MicrophoneInput {
    stream: Option<cpal::Stream>,
    tap: TapSlot,
}

impl MicrophoneInput {
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let device = get_input_device(config.input_device_id.as_ref())?;
        let input_config = device
            .default_input_config()
            .context("Microphone unavailable or access denied")?;
        info!("Using input device: {}", device_display_name(&device));
        debug!("Input config: {input_config:#?}");

        const MIN_BUFFER_MS: u32 = 3;
        let min_buffer_size = CAPTURE_SAMPLE_RATE * MIN_BUFFER_MS / 1000;

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: CAPTURE_SAMPLE_RATE,
            buffer_size: match input_config.buffer_size() {
                cpal::SupportedBufferSize::Range { min, .. } => {
                    BufferSize::Fixed((*min).max(min_buffer_size))
                }
                cpal::SupportedBufferSize::Unknown => {
                    warn!("Supported buffer size range unknown, using default");
                    BufferSize::Default
                }
            },
        };

        let tap: TapSlot = Arc::new(Mutex::new(None));
        let stream = match input_config.sample_format() {
            SampleFormat::I16 => build_input_stream::<i16>(&device, &stream_config, tap.clone())?,
            SampleFormat::U16 => build_input_stream::<u16>(&device, &stream_config, tap.clone())?,
            SampleFormat::F32 => build_input_stream::<f32>(&device, &stream_config, tap.clone())?,
            format => anyhow::bail!("Unsupported input sample format: {format:?}"),
        };
        if let Err(e) = stream.pause() {
            debug!("Input stream could not be paused before attach: {}", e);
        }

        Ok(Self {
            stream: Some(stream),
            tap,
        })
    }
}

fn build_input_stream<T>(device: &Device, config: &StreamConfig, tap: TapSlot) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + ToSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            scratch.clear();
            scratch.extend(data.iter().map(|&s| s.to_sample::<f32>()));
            if let Ok(mut slot) = tap.lock() {
                if let Some(tap) = slot.as_mut() {
                    tap.push(&scratch);
                }
            }
        },
        |err| error!("An error occurred on the input audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}

impl MicrophoneStream for MicrophoneInput {
    fn attach(&mut self, tap: FrameTap) -> Result<()> {
        let stream = self.stream.as_ref().context("Microphone already released")?;
        if let Ok(mut slot) = self.tap.lock() {
            *slot = Some(tap);
        }
        stream.play().context("Failed to start microphone stream")?;
        info!("Microphone input enabled");
        Ok(())
    }

    fn detach(&mut self) {
        let had_tap = self.tap.lock().map(|mut slot| slot.take().is_some()).unwrap_or(false);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause input stream: {}", e);
            }
        }
        if had_tap {
            info!("Microphone input disabled");
        }
    }

    fn release(&mut self) {
        self.detach();
        if self.stream.take().is_some() {
            debug!("Microphone released");
        }
    }
}

impl Drop for MicrophoneInput {
    fn drop(&mut self) {
        self.release();
    }
}

/// Speaker output playing whatever is scheduled on its timeline.
pub struct SpeakerOutput {
    stream: Option<cpal::Stream>,
    timeline: Arc<Mutex<OutputTimeline>>,
    sample_rate: u32,
}

impl SpeakerOutput {
    pub fn open(config: &AudioConfig, on_ended: EndedCallback) -> Result<Self> {
        let device = get_output_device(config.output_device_id.as_ref())?;
        let output_config = device.default_output_config()?;
        info!("Using output device: {}", device_display_name(&device));
        debug!("Output config: {output_config:#?}");

        let stream_config = StreamConfig {
            channels: config.output_channels,
            sample_rate: config.playback_sample_rate,
            buffer_size: match output_config.buffer_size() {
                cpal::SupportedBufferSize::Range { min, max } => {
                    let target = 256u32;
                    let size = target.clamp(*min, *max);
                    debug!(
                        "Using output buffer size: {} (min={}, max={})",
                        size, min, max
                    );
                    BufferSize::Fixed(size)
                }
                cpal::SupportedBufferSize::Unknown => {
                    warn!("Supported buffer size range unknown, using default");
                    BufferSize::Default
                }
            },
        };

        let timeline = Arc::new(Mutex::new(OutputTimeline::new(
            config.playback_sample_rate,
            config.output_channels as usize,
            on_ended,
        )));

        debug!("Building output stream");
        let stream = match output_config.sample_format() {
            SampleFormat::I16 => {
                build_output_stream::<i16>(&device, &stream_config, timeline.clone())?
            }
            SampleFormat::U16 => {
                build_output_stream::<u16>(&device, &stream_config, timeline.clone())?
            }
            SampleFormat::F32 => {
                build_output_stream::<f32>(&device, &stream_config, timeline.clone())?
            }
            format => anyhow::bail!("Unsupported output sample format: {format:?}"),
        };
        stream.play().context("Failed to start output stream")?;
        info!(
            "Speaker output started ({} Hz, {} channels)",
            config.playback_sample_rate, config.output_channels
        );

        Ok(Self {
            stream: Some(stream),
            timeline,
            sample_rate: config.playback_sample_rate,
        })
    }
}

fn build_output_stream<T>(
    device: &Device,
    config: &StreamConfig,
    timeline: Arc<Mutex<OutputTimeline>>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            match timeline.lock() {
                Ok(mut timeline) => timeline.render(&mut scratch),
                Err(_) => scratch.fill(0.0),
            }
            for (slot, sample) in data.iter_mut().zip(&scratch) {
                *slot = T::from_sample(*sample);
            }
        },
        |err| error!("An error occurred on the output audio stream: {}", err),
        None,
    )?;
    Ok(stream)
}

impl OutputDevice for SpeakerOutput {
    fn current_time(&self) -> f64 {
        self.timeline
            .lock()
            .map(|timeline| timeline.current_time())
            .unwrap_or(0.0)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start_source(&mut self, id: SourceId, buffer: PlaybackBuffer, at: f64) -> f64 {
        if self.stream.is_none() {
            warn!("Dropping source {} scheduled on a closed output", id);
            return at;
        }
        match self.timeline.lock() {
            Ok(mut timeline) => timeline.start(id, buffer, at),
            Err(_) => at,
        }
    }

    fn stop_source(&mut self, id: SourceId) {
        if let Ok(mut timeline) = self.timeline.lock() {
            timeline.stop(id);
        }
    }

    fn close(&mut self) {
        if let Ok(mut timeline) = self.timeline.lock() {
            timeline.stop_all();
        }
        if self.stream.take().is_some() {
            info!("Speaker output closed");
        }
    }
}

impl Drop for SpeakerOutput {
    fn drop(&mut self) {
        self.close();
    }
}
