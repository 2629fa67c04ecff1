//! Core event and pattern model for styleplayer.
//!
//! This crate defines the representation shared by the whole workspace:
//! the file parser fills a [`Style`], channel streams are derived from it
//! per pattern, and the playback engine and exporter consume those.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod event;
mod pattern;
mod stream;
mod style;
mod timing;

pub use event::{encode_var_len, Event, KeySignature, TextKind, TimeSignature};
pub use pattern::{
    ChannelSlot, Pattern, SignatureText, CHANNEL_COUNT, DEFAULT_DRUM_SLOT, DEFAULT_TEMPO,
};
pub use stream::{ChannelStream, PatternStreams, TimedEvent};
pub use style::{LoggedEvent, PatternNotFound, Style};
pub use timing::{
    bpm_to_micros, micros_to_bpm, pattern_length, snap, subdivision_period_micros, TickScale,
    BEATS_PER_BAR, SUBDIVISIONS_PER_BAR, SUBDIVISIONS_PER_BEAT,
};
