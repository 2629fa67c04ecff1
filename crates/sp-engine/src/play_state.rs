//! Per-channel solo/mute state.

use sp_ir::CHANNEL_COUNT;

/// Playback state of one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelPlayState {
    #[default]
    Normal,
    Solo,
    Mute,
}

/// The play state of all sixteen channels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStates {
    states: [ChannelPlayState; CHANNEL_COUNT],
}

impl ChannelStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a 0-based channel. Out-of-range channels read as Normal.
    pub fn get(&self, channel: u8) -> ChannelPlayState {
        self.states
            .get(channel as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Set a channel's state, returning the previous one. Returns `None`
    /// and changes nothing for an out-of-range channel.
    pub fn set(&mut self, channel: u8, state: ChannelPlayState) -> Option<ChannelPlayState> {
        let slot = self.states.get_mut(channel as usize)?;
        Some(core::mem::replace(slot, state))
    }

    pub fn any_solo(&self) -> bool {
        self.states.contains(&ChannelPlayState::Solo)
    }

    /// Which channels may emit this tick.
    ///
    /// Solo channels always play. Normal channels play only while nothing
    /// is soloed. Muted channels never play.
    pub fn eligible(&self) -> [bool; CHANNEL_COUNT] {
        let any_solo = self.any_solo();
        self.states.map(|state| match state {
            ChannelPlayState::Solo => true,
            ChannelPlayState::Normal => !any_solo,
            ChannelPlayState::Mute => false,
        })
    }

    /// Put every channel back to Normal.
    pub fn reset(&mut self) {
        self.states = [ChannelPlayState::Normal; CHANNEL_COUNT];
    }
}
