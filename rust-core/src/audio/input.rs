//! Audio input capture using cpal
//!
//! Feeds microphone or line-in audio straight into the engine's ring buffer.
//! The writer is moved into the stream callback, so the audio thread never
//! takes a lock.

use super::buffer::SampleWriter;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio input device found")]
    NoDevice,

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Unsupported sample format {0:?}, only f32 capture is supported")]
    UnsupportedFormat(SampleFormat),

    #[error("Device delivers {device} channels but the engine was configured for {engine}")]
    ChannelMismatch { device: u16, engine: usize },

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),
}

/// Audio input device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Audio input stream
pub struct AudioInput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioInput {
    /// Describe the default input device without opening a stream
    ///
    /// Use this to size the engine configuration (sample rate, channels)
    /// before creating the engine and its writer.
    pub fn probe_default_device() -> Result<AudioDeviceInfo, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice)?;
        describe(&device)
    }

    /// Create audio input from default device
    ///
    /// # Arguments
    /// * `writer` - Ring buffer writer; its channel count must match the device
    pub fn from_default_device(writer: SampleWriter) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice)?;

        Self::from_device(device, writer)
    }

    /// Create audio input from specific device
    pub fn from_device(device: Device, mut writer: SampleWriter) -> Result<Self, AudioError> {
        let config = device
            .default_input_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;

        if config.sample_format() != SampleFormat::F32 {
            return Err(AudioError::UnsupportedFormat(config.sample_format()));
        }

        let device_info = describe(&device)?;
        if device_info.channels as usize != writer.channels() {
            return Err(AudioError::ChannelMismatch {
                device: device_info.channels,
                engine: writer.channels(),
            });
        }

        let stream_config: StreamConfig = config.into();

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    writer.write_interleaved(data);
                },
                move |err| {
                    tracing::error!("Audio input error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        tracing::info!(
            "Capturing from {} ({} Hz, {} channels)",
            device_info.name,
            device_info.sample_rate,
            device_info.channels
        );

        Ok(Self {
            stream,
            device_info,
        })
    }

    /// Start capturing audio
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Pause audio capture
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Get device information
    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}

fn describe(device: &Device) -> Result<AudioDeviceInfo, AudioError> {
    let name = device
        .name()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    let config = device
        .default_input_config()
        .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;

    Ok(AudioDeviceInfo {
        name,
        sample_rate: config.sample_rate().0,
        channels: config.channels(),
    })
}

/// List available audio input devices
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .input_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    for device in device_iter {
        if let Ok(info) = describe(&device) {
            devices.push(info);
        }
    }

    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Just ensure it doesn't crash on hosts without audio hardware
        let _ = list_input_devices();
    }
}
