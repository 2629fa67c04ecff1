//! Headless controller for styleplayer.
//!
//! Provides a unified API for loading styles, choosing a pattern, playback
//! and export that a front end (the CLI today) can share. Playback runs on
//! a dedicated scheduler thread; see [`Player`].

mod player;
mod settings;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use sp_engine::PlaybackScheduler;
use thiserror::Error;

// Re-export common types so callers don't need the lower crates directly.
pub use player::{Command, Player};
pub use settings::{Settings, SettingsError};
pub use sp_device::{describe, DeviceError, MonitorOutput};
pub use sp_engine::{ChannelPlayState, DeviceSink};
pub use sp_formats::{ExportError, FormatError, ParseOptions};
pub use sp_ir::{Pattern, PatternNotFound, Style};

#[cfg(feature = "midir")]
pub use sp_device::{output_ports, MidiPortOutput};

const LOG_TARGET: &str = "sp::player";

/// Error type for controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    NotFound(#[from] PatternNotFound),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// An operation needs a loaded style
    #[error("no style loaded")]
    NoStyleLoaded,
    /// Channel outside 1-16
    #[error("channel {0} out of range (1-16)")]
    InvalidChannel(u8),
    /// The scheduler thread has exited
    #[error("player thread is not running")]
    PlayerStopped,
}

/// Headless style player: owns the loaded style and the scheduler thread.
///
/// Channel numbers in this API are 1-based, as shown to users.
pub struct Controller {
    settings: Settings,
    style: Option<Style>,
    /// Name of the selected pattern
    current: Option<String>,
    /// Tempo that replaces each pattern's own
    tempo_override: Option<u32>,
    player: Player,
}

impl Controller {
    /// Create a controller playing into `sink`.
    pub fn new(settings: Settings, sink: Box<dyn DeviceSink + Send>) -> Self {
        let mut scheduler = PlaybackScheduler::new();
        scheduler.set_volume_max(settings.volume_max);
        scheduler.set_master_volume(settings.master_volume);
        scheduler.set_drum_channel(settings.drum_channel_index());
        scheduler.set_looping(settings.looping);

        Self {
            tempo_override: settings.default_tempo,
            settings,
            style: None,
            current: None,
            player: Player::spawn(scheduler, sink),
        }
    }

    /// Create a controller whose output only goes to the log.
    pub fn with_monitor(settings: Settings) -> Self {
        Self::new(settings, Box::new(MonitorOutput::new()))
    }

    /// Create a controller playing to the MIDI output port at `port`.
    #[cfg(feature = "midir")]
    pub fn with_midi_port(settings: Settings, port: usize) -> Result<Self, ControllerError> {
        let output = MidiPortOutput::connect(port)?;
        Ok(Self::new(settings, Box::new(output)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // --- Style management ---

    pub fn style(&self) -> Option<&Style> {
        self.style.as_ref()
    }

    /// Read and load a style or MIDI file.
    ///
    /// On failure the previous style, selection and playback are untouched.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ControllerError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            log::error!(target: LOG_TARGET, "file open failed: {}: {}", path.display(), e);
            e
        })?;
        self.load_bytes(&data).map_err(|e| {
            log::error!(target: LOG_TARGET, "file open failed: {}: {}", path.display(), e);
            e
        })
    }

    /// Load a style from memory and select its first pattern.
    pub fn load_bytes(&mut self, data: &[u8]) -> Result<(), ControllerError> {
        let style = sp_formats::load_style_with(data, &self.settings.parse_options())?;

        self.player.send(Command::Stop)?;
        let first = style.patterns.first().map(|p| p.name.clone());
        self.style = Some(style);
        self.current = None;
        if let Some(name) = first {
            self.select_pattern(&name)?;
        }
        if self.settings.autoplay {
            self.play()?;
        }
        Ok(())
    }

    /// Switch playback to another pattern of the loaded style.
    pub fn select_pattern(&mut self, name: &str) -> Result<(), ControllerError> {
        let style = self.style.as_ref().ok_or(ControllerError::NoStyleLoaded)?;
        let pattern = style.get_pattern(name)?.clone();
        let streams = style.streams(name)?;

        self.player.send(Command::Load { pattern, streams })?;
        if let Some(bpm) = self.tempo_override {
            self.player.send(Command::SetTempo(bpm))?;
        }
        self.current = Some(name.to_owned());
        Ok(())
    }

    /// The selected pattern.
    pub fn current_pattern(&self) -> Option<&Pattern> {
        let name = self.current.as_deref()?;
        self.style.as_ref()?.get_pattern(name).ok()
    }

    // --- Transport ---

    pub fn play(&self) -> Result<(), ControllerError> {
        self.player.send(Command::Play)
    }

    pub fn stop(&self) -> Result<(), ControllerError> {
        self.player.send(Command::Stop)
    }

    pub fn rewind(&self) -> Result<(), ControllerError> {
        self.player.send(Command::Rewind)
    }

    /// Wait until the scheduler thread has applied every earlier call.
    pub fn sync(&self) -> Result<(), ControllerError> {
        self.player.sync()
    }

    pub fn is_playing(&self) -> bool {
        self.player.is_playing()
    }

    /// Subdivision about to play.
    pub fn position(&self) -> u32 {
        self.player.position()
    }

    /// Position rounded down to the snap grid from the settings.
    pub fn snapped_position(&self) -> u32 {
        sp_ir::snap(self.position(), self.settings.snap)
    }

    // --- Mixing ---

    /// Set the solo/mute state of a 1-based channel.
    pub fn set_channel_state(&self, channel: u8, state: ChannelPlayState) -> Result<(), ControllerError> {
        let index = channel_index(channel)?;
        self.player.send(Command::SetChannelState(index, state))
    }

    /// Put every channel back to Normal.
    pub fn clear_channel_states(&self) -> Result<(), ControllerError> {
        self.player.send(Command::ClearChannelStates)
    }

    /// Override the tempo for this and every later pattern.
    pub fn set_tempo(&mut self, bpm: u32) -> Result<(), ControllerError> {
        self.tempo_override = Some(bpm);
        self.player.send(Command::SetTempo(bpm))
    }

    pub fn set_master_volume(&self, volume: u16) -> Result<(), ControllerError> {
        self.player.send(Command::SetMasterVolume(volume))
    }

    /// Set the volume of a 1-based channel.
    pub fn set_channel_volume(&self, channel: u8, volume: u16) -> Result<(), ControllerError> {
        let index = channel_index(channel)?;
        self.player.send(Command::SetChannelVolume(index, volume))
    }

    /// Route the drum part to a 1-based channel.
    pub fn set_drum_channel(&self, channel: u8) -> Result<(), ControllerError> {
        let index = channel_index(channel)?;
        self.player.send(Command::SetDrumChannel(index))
    }

    pub fn set_looping(&self, looping: bool) -> Result<(), ControllerError> {
        self.player.send(Command::SetLooping(looping))
    }

    /// End playback early, in subdivisions. `None` plays the whole pattern.
    pub fn set_loop_end(&self, end: Option<u32>) -> Result<(), ControllerError> {
        self.player.send(Command::SetLoopEnd(end))
    }

    // --- Export ---

    /// Export a pattern of the loaded style as a MIDI file in memory.
    pub fn export_bytes(&self, name: &str) -> Result<Vec<u8>, ControllerError> {
        let style = self.style.as_ref().ok_or(ControllerError::NoStyleLoaded)?;
        let pattern = style.get_pattern(name)?;
        let streams = style.streams(name)?;
        Ok(sp_formats::export_midi(pattern, &streams, style.resolution())?)
    }

    /// Export a pattern of the loaded style to a MIDI file.
    pub fn export_pattern<P: AsRef<Path>>(&self, name: &str, path: P) -> Result<(), ControllerError> {
        let style = self.style.as_ref().ok_or(ControllerError::NoStyleLoaded)?;
        let pattern = style.get_pattern(name)?;
        let streams = style.streams(name)?;
        if streams.is_empty() {
            return Err(ExportError::Empty.into());
        }

        let mut out = BufWriter::new(File::create(path.as_ref())?);
        sp_formats::write_midi(&mut out, pattern, &streams, style.resolution())?;
        log::info!(
            target: LOG_TARGET,
            "exported \"{}\" to {}",
            name,
            path.as_ref().display()
        );
        Ok(())
    }
}

/// 0-based index of a 1-based channel number.
fn channel_index(channel: u8) -> Result<u8, ControllerError> {
    if (1..=16).contains(&channel) {
        Ok(channel - 1)
    } else {
        Err(ControllerError::InvalidChannel(channel))
    }
}
