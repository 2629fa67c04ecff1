//! Decoded MIDI events.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// A decoded event from a track chunk.
///
/// Channel numbers are 0-based (0-15). The set of kinds is closed: anything
/// the decoder does not model becomes [`Event::Other`] and is dropped by the
/// parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Key pressed. `length` is the distance in subdivisions to the matching
    /// release, or 0 when no release was found.
    NoteOn {
        channel: u8,
        key: u8,
        velocity: u8,
        length: u32,
    },
    /// Key released.
    NoteOff { channel: u8, key: u8, velocity: u8 },
    /// Controller change.
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Program (patch) change.
    PatchChange { channel: u8, program: u8 },
    /// Pitch bend, 14-bit value centred on 0x2000.
    PitchBend { channel: u8, value: u16 },
    /// System exclusive payload, without the leading 0xF0.
    SysEx(Vec<u8>),
    /// Tempo in microseconds per quarter note.
    Tempo(u32),
    /// Time signature meta-event.
    TimeSignature(TimeSignature),
    /// Key signature meta-event.
    KeySignature(KeySignature),
    /// Any of the text-carrying meta-events.
    Text(TextKind, String),
    /// End of track meta-event.
    EndOfTrack,
    /// An event the decoder consumed but does not model.
    Other,
}

impl Event {
    /// Channel of a channel-voice event.
    pub fn channel(&self) -> Option<u8> {
        match *self {
            Event::NoteOn { channel, .. }
            | Event::NoteOff { channel, .. }
            | Event::ControlChange { channel, .. }
            | Event::PatchChange { channel, .. }
            | Event::PitchBend { channel, .. } => Some(channel),
            _ => None,
        }
    }

    /// True for note-on and note-off events.
    pub fn is_note(&self) -> bool {
        matches!(self, Event::NoteOn { .. } | Event::NoteOff { .. })
    }

    /// True for an explicit note-off or a zero-velocity note-on.
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            Event::NoteOff { .. } | Event::NoteOn { velocity: 0, .. }
        )
    }

    /// Copy of this event routed to another channel. Events without a
    /// channel are returned unchanged.
    pub fn with_channel(&self, new_channel: u8) -> Self {
        let mut event = self.clone();
        match &mut event {
            Event::NoteOn { channel, .. }
            | Event::NoteOff { channel, .. }
            | Event::ControlChange { channel, .. }
            | Event::PatchChange { channel, .. }
            | Event::PitchBend { channel, .. } => *channel = new_channel,
            _ => {}
        }
        event
    }

    /// Append the file/wire encoding of this event, without a delta-time.
    ///
    /// Returns false for [`Event::EndOfTrack`] and [`Event::Other`], which
    /// are never written.
    pub fn encode(&self, out: &mut Vec<u8>) -> bool {
        match self {
            Event::NoteOn { channel, key, velocity, .. } => {
                out.extend_from_slice(&[0x90 | (channel & 0x0F), key & 0x7F, velocity & 0x7F]);
            }
            Event::NoteOff { channel, key, velocity } => {
                out.extend_from_slice(&[0x80 | (channel & 0x0F), key & 0x7F, velocity & 0x7F]);
            }
            Event::ControlChange { channel, controller, value } => {
                out.extend_from_slice(&[0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]);
            }
            Event::PatchChange { channel, program } => {
                out.extend_from_slice(&[0xC0 | (channel & 0x0F), program & 0x7F]);
            }
            Event::PitchBend { channel, value } => {
                out.extend_from_slice(&[
                    0xE0 | (channel & 0x0F),
                    (value & 0x7F) as u8,
                    (value >> 7 & 0x7F) as u8,
                ]);
            }
            Event::SysEx(data) => {
                out.push(0xF0);
                encode_var_len(out, data.len() as u32);
                out.extend_from_slice(data);
            }
            Event::Tempo(micros) => {
                out.extend_from_slice(&[0xFF, 0x51, 0x03]);
                out.extend_from_slice(&micros.to_be_bytes()[1..]);
            }
            Event::TimeSignature(ts) => {
                out.extend_from_slice(&[
                    0xFF,
                    0x58,
                    0x04,
                    ts.numerator,
                    ts.denominator_pow,
                    ts.clocks_per_click,
                    ts.notated_32nds_per_beat,
                ]);
            }
            Event::KeySignature(ks) => {
                out.extend_from_slice(&[0xFF, 0x59, 0x02, ks.sharps as u8, ks.minor as u8]);
            }
            Event::Text(kind, text) => {
                out.extend_from_slice(&[0xFF, kind.meta_type()]);
                encode_var_len(out, text.len() as u32);
                out.extend_from_slice(text.as_bytes());
            }
            Event::EndOfTrack | Event::Other => return false,
        }
        true
    }
}

/// Append a variable-length quantity: 7 bits per byte, most significant
/// group first. Values are truncated to 28 bits.
pub fn encode_var_len(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 4];
    let mut n = 0;
    let mut v = value & 0x0FFF_FFFF;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
}

/// Which text meta-event a [`Event::Text`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextKind {
    Text,
    Copyright,
    TrackName,
    InstrumentName,
    Lyric,
    Marker,
    CuePoint,
}

impl TextKind {
    /// Map a meta-event type byte to a text kind.
    pub fn from_meta_type(meta: u8) -> Option<Self> {
        match meta {
            0x01 => Some(TextKind::Text),
            0x02 => Some(TextKind::Copyright),
            0x03 => Some(TextKind::TrackName),
            0x04 => Some(TextKind::InstrumentName),
            0x05 => Some(TextKind::Lyric),
            0x06 => Some(TextKind::Marker),
            0x07 => Some(TextKind::CuePoint),
            _ => None,
        }
    }

    /// The meta-event type byte for this kind.
    pub fn meta_type(self) -> u8 {
        match self {
            TextKind::Text => 0x01,
            TextKind::Copyright => 0x02,
            TextKind::TrackName => 0x03,
            TextKind::InstrumentName => 0x04,
            TextKind::Lyric => 0x05,
            TextKind::Marker => 0x06,
            TextKind::CuePoint => 0x07,
        }
    }
}

/// Time signature as stored in the meta-event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Denominator as a power of two (2 = quarter note)
    pub denominator_pow: u8,
    pub clocks_per_click: u8,
    pub notated_32nds_per_beat: u8,
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let denominator = 1u32.checked_shl(self.denominator_pow as u32).unwrap_or(0);
        write!(f, "{}/{}", self.numerator, denominator)
    }
}

/// Key signature as stored in the meta-event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeySignature {
    /// Negative = flats, positive = sharps
    pub sharps: i8,
    pub minor: bool,
}

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];
const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let idx = (self.sharps as i32 + 7).clamp(0, 14) as usize;
        if self.minor {
            write!(f, "{}m", MINOR_KEYS[idx])
        } else {
            f.write_str(MAJOR_KEYS[idx])
        }
    }
}
