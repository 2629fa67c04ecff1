//! Playback engine for styleplayer.
//!
//! Steps a pattern's channel streams one subdivision at a time, applies
//! solo/mute arbitration, drum routing and volume scaling, and hands the
//! resulting events to a [`DeviceSink`].

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod play_state;
pub mod scheduler;
mod sink;

pub use play_state::{ChannelPlayState, ChannelStates};
pub use scheduler::{PlaybackScheduler, TickOutcome, Transport, UNITY_VOLUME};
pub use sink::{all_notes_off, DeviceSink, ALL_NOTES_OFF};
