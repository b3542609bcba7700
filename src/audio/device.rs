use std::fmt;

use crate::error::{Error, Result};

/// Snapshot of one device as reported by the host's enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub index: usize,
    pub name: String,
    pub max_input_channels: usize,
    pub max_output_channels: usize,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device {}: {} (in: {}, out: {})",
            self.index, self.name, self.max_input_channels, self.max_output_channels
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    #[default]
    Float32,
}

/// What the caller asks for; the host may adjust it when the stream is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub sample_rate: usize,
    pub buffer_frames: usize,
}

impl Default for StreamRequest {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            buffer_frames: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub sample_rate: usize,
    pub channel_count: usize,
    pub buffer_frames: usize,
    pub sample_format: SampleFormat,
}

impl StreamConfig {
    /// Uses as many channels as both devices support.
    pub fn negotiate(input: &Device, output: &Device, request: StreamRequest) -> Result<Self> {
        let channel_count = input.max_input_channels.min(output.max_output_channels);
        if channel_count == 0 {
            return Err(Error::DeviceUnavailable {
                reason: format!(
                    "'{}' has {} input channel(s) and '{}' has {} output channel(s)",
                    input.name,
                    input.max_input_channels,
                    output.name,
                    output.max_output_channels
                ),
            });
        }

        if request.sample_rate == 0 {
            return Err(Error::invalid_value("sample rate", "must be above 0 Hz"));
        }
        if request.buffer_frames == 0 {
            return Err(Error::invalid_value("buffer frames", "must be above 0"));
        }

        Ok(Self {
            sample_rate: request.sample_rate,
            channel_count,
            buffer_frames: request.buffer_frames,
            sample_format: SampleFormat::Float32,
        })
    }

    /// Interleaved samples in one buffer.
    pub const fn buffer_len(&self) -> usize {
        self.buffer_frames * self.channel_count
    }

    /// Time available to process one buffer before the host needs it back.
    pub fn buffer_duration_secs(&self) -> f64 {
        self.buffer_frames as f64 / self.sample_rate as f64
    }
}

impl fmt::Display for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} channel(s), {} frames ({:.1} ms), {:?}",
            self.sample_rate,
            self.channel_count,
            self.buffer_frames,
            self.buffer_duration_secs() * 1000.0,
            self.sample_format
        )
    }
}
