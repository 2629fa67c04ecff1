//! User settings, stored as JSON.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sp_formats::ParseOptions;
use thiserror::Error;

const LOG_TARGET: &str = "sp::settings";

/// Error reading or writing a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings format: {0}")]
    Json(#[from] serde_json::Error),
}

/// Player settings.
///
/// Missing fields take their defaults, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tempo in BPM used instead of each pattern's own tempo
    pub default_tempo: Option<u32>,
    /// Output channel for the drum part (1-16)
    pub drum_channel: u8,
    /// Position snap grid in subdivisions (0 = off)
    pub snap: u32,
    /// Start playing as soon as a file is loaded
    pub autoplay: bool,
    /// Restart at the end of the pattern
    pub looping: bool,
    pub master_volume: u16,
    /// Upper bound for master and channel volumes (100 = unity)
    pub volume_max: u16,
    /// Drop control changes while loading
    pub suppress_control_changes: bool,
    /// Drop system exclusive messages while loading
    pub suppress_sysex: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_tempo: None,
            drum_channel: 10,
            snap: 8, // sixteenth note
            autoplay: false,
            looping: true,
            master_volume: 100,
            volume_max: 100,
            suppress_control_changes: false,
            suppress_sysex: false,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!(target: LOG_TARGET, "no settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write settings as pretty-printed JSON, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Parser switches derived from the suppression flags.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            keep_control_changes: !self.suppress_control_changes,
            keep_sysex: !self.suppress_sysex,
        }
    }

    /// The drum channel as a 0-based output channel.
    pub fn drum_channel_index(&self) -> u8 {
        self.drum_channel.clamp(1, 16) - 1
    }
}
