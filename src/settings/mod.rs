use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::device::StreamRequest;
use crate::params::Parameters;

const APP_DIR: &str = "livefx";
const SETTINGS_FILENAME: &str = "settings.json";

impl std::fmt::Display for AudioSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Client Name: {}", self.client_name)?;
        writeln!(f, "Input Device: {}", self.input_device)?;
        writeln!(f, "Output Device: {}", self.output_device)?;
        writeln!(f, "Sample Rate: {}", self.sample_rate)?;
        writeln!(f, "Buffer Frames: {}", self.buffer_frames)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub client_name: String,
    /// Index into the device list printed by `--list-devices`.
    pub input_device: usize,
    pub output_device: usize,
    pub sample_rate: usize,
    pub buffer_frames: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        let request = StreamRequest::default();
        Self {
            client_name: "livefx".to_string(),
            input_device: 0,
            output_device: 0,
            sample_rate: request.sample_rate,
            buffer_frames: request.buffer_frames,
        }
    }
}

impl AudioSettings {
    pub const fn stream_request(&self) -> StreamRequest {
        StreamRequest {
            sample_rate: self.sample_rate,
            buffer_frames: self.buffer_frames,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    /// Initial effect parameters.
    pub parameters: Parameters,
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "------------------------------")?;

        writeln!(f, "Audio Settings:")?;
        writeln!(f, "{}", self.audio)?;

        writeln!(f, "Initial Parameters:")?;
        writeln!(f, "{}", self.parameters)?;
        Ok(())
    }
}

impl Settings {
    /// Loads from the default location, writing defaults there on first run.
    pub fn load() -> Result<Self> {
        let settings_path = Self::get_settings_path();

        if settings_path.exists() {
            Self::load_from(&settings_path)
        } else {
            info!("No settings file found, using defaults");
            let settings = Self::default();
            // Try to save defaults, but don't fail if we can't
            let _ = settings.save();
            Ok(settings)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&contents).context("Failed to parse settings")?;
        debug!("Loaded settings from {path:?}");
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_settings_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).context("Failed to write settings file")?;

        debug!("Saved settings to {path:?}");
        Ok(())
    }

    pub fn get_settings_path() -> PathBuf {
        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_dir)
                .join(APP_DIR)
                .join(SETTINGS_FILENAME)
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join(APP_DIR)
                .join(SETTINGS_FILENAME)
        } else {
            PathBuf::from(".").join(SETTINGS_FILENAME)
        }
    }

    /// PipeWire's JACK layer picks its period from the environment, so this must run before
    /// the JACK client is created.
    pub fn apply_to_environment(&self) {
        unsafe {
            std::env::set_var("PIPEWIRE_LATENCY", self.pipewire_latency());
            if std::env::var("JACK_PROMISCUOUS_SERVER").is_err() {
                std::env::set_var("JACK_PROMISCUOUS_SERVER", "pipewire");
            }
        }
    }

    fn pipewire_latency(&self) -> String {
        format!("{}/{}", self.audio.buffer_frames, self.audio.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_request_the_standard_stream() {
        let settings = Settings::default();
        let request = settings.audio.stream_request();

        assert_eq!(request.sample_rate, 48_000);
        assert_eq!(request.buffer_frames, 1024);
        assert_eq!(settings.parameters, Parameters::default());
        assert_eq!(settings.pipewire_latency(), "1024/48000");
    }

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILENAME);

        let mut settings = Settings::default();
        settings.audio.input_device = 2;
        settings.audio.sample_rate = 44_100;
        settings.parameters.gain = 10.0;
        settings.parameters.cabinet_enabled = true;

        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, r#"{ "parameters": { "gain": 3.0 } }"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();

        assert_eq!(settings.audio, AudioSettings::default());
        assert_eq!(settings.parameters.gain, 3.0);
        assert_eq!(settings.parameters.pre_eq_freq_hz, 2000.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        fs::write(&path, "not json").unwrap();

        assert!(Settings::load_from(&path).is_err());
    }
}
