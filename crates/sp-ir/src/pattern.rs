//! Pattern descriptors.

use alloc::string::String;
use arrayvec::ArrayString;
use core::fmt::Write;

use crate::event::{KeySignature, TimeSignature};

/// Number of MIDI channels a pattern can use.
pub const CHANNEL_COUNT: usize = 16;

/// Tempo used when a file carries no tempo meta-event.
pub const DEFAULT_TEMPO: u32 = 100;

/// 0-based channel that holds drum parts in the source data (channel 10).
pub const DEFAULT_DRUM_SLOT: u8 = 9;

/// Fixed-capacity text of a time or key signature. Holds the longest
/// rendering, "255/2147483648".
pub type SignatureText = ArrayString<16>;

/// Patch assignment for one channel of a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelSlot {
    /// Channel never used by the pattern
    #[default]
    Unused,
    /// Channel has events but no explicit patch change
    NoPatch,
    /// Channel set to this program (0-127)
    Patch(u8),
}

impl ChannelSlot {
    /// The assigned program, if any.
    pub const fn patch(self) -> Option<u8> {
        match self {
            ChannelSlot::Patch(p) => Some(p),
            _ => None,
        }
    }

    /// True unless the channel is unused.
    pub const fn is_used(self) -> bool {
        !matches!(self, ChannelSlot::Unused)
    }
}

/// A named section of a style file, or the implicit section of a plain
/// MIDI file (empty name).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// Section name from the marker meta-event
    pub name: String,
    /// Tempo in BPM
    pub tempo: u32,
    /// Time signature text, e.g. "4/4"
    pub time_signature: Option<SignatureText>,
    /// Key signature text, e.g. "Ebm"
    pub key_signature: Option<SignatureText>,
    /// Per-channel patch assignments
    pub channels: [ChannelSlot; CHANNEL_COUNT],
    /// Source channel carrying the drum part
    pub drum_slot: u8,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            name: String::new(),
            tempo: DEFAULT_TEMPO,
            time_signature: None,
            key_signature: None,
            channels: [ChannelSlot::Unused; CHANNEL_COUNT],
            drum_slot: DEFAULT_DRUM_SLOT,
        }
    }
}

impl Pattern {
    /// Create an unnamed pattern with default tempo and no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new section named `name` that inherits this pattern's tempo,
    /// signatures and patch table.
    pub fn successor(&self, name: &str) -> Self {
        Self {
            name: String::from(name),
            ..self.clone()
        }
    }

    /// Mark a channel as used without touching an existing patch.
    pub fn touch_channel(&mut self, channel: u8) {
        if let Some(slot) = self.channels.get_mut(channel as usize) {
            if *slot == ChannelSlot::Unused {
                *slot = ChannelSlot::NoPatch;
            }
        }
    }

    /// Assign a patch to a channel.
    pub fn set_patch(&mut self, channel: u8, program: u8) {
        if let Some(slot) = self.channels.get_mut(channel as usize) {
            *slot = ChannelSlot::Patch(program);
        }
    }

    pub fn set_time_signature(&mut self, ts: &TimeSignature) {
        self.time_signature = signature_text(ts);
    }

    pub fn set_key_signature(&mut self, ks: &KeySignature) {
        self.key_signature = signature_text(ks);
    }

    /// Iterate over channels with an explicit patch as `(channel, program)`.
    pub fn patches(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter_map(|(ch, slot)| slot.patch().map(|p| (ch as u8, p)))
    }

    /// Iterate over the 0-based channels this pattern uses.
    pub fn used_channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_used())
            .map(|(ch, _)| ch as u8)
    }
}

/// Render a signature, or `None` if it does not fit.
fn signature_text(value: &dyn core::fmt::Display) -> Option<SignatureText> {
    let mut text = SignatureText::new();
    write!(text, "{}", value).ok()?;
    Some(text)
}
