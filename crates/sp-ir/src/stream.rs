//! Per-channel, time-indexed event streams.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::event::Event;
use crate::pattern::CHANNEL_COUNT;
use crate::timing::pattern_length;

/// An event placed on the subdivision grid.
///
/// The native tick is kept alongside so export can write the file's own
/// resolution back out without a second rescale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    /// Absolute position in subdivisions
    pub subdivision: u32,
    /// Absolute position in native ticks
    pub tick: u64,
    pub event: Event,
}

/// All events of one (pattern, channel) pair, keyed by subdivision.
///
/// Events sharing a subdivision keep file order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStream {
    events: BTreeMap<u32, Vec<TimedEvent>>,
    has_notes: bool,
    max_subdivision: u32,
}

impl ChannelStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event at its subdivision.
    pub fn insert(&mut self, event: TimedEvent) {
        if event.event.is_note() {
            self.has_notes = true;
        }
        self.max_subdivision = self.max_subdivision.max(event.subdivision);
        self.events.entry(event.subdivision).or_default().push(event);
    }

    /// Events scheduled at exactly `subdivision`; empty when there are none.
    pub fn at(&self, subdivision: u32) -> &[TimedEvent] {
        self.events
            .get(&subdivision)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All events in time order.
    pub fn iter(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.values().flatten()
    }

    /// True once any note event has been inserted.
    pub fn has_notes(&self) -> bool {
        self.has_notes
    }

    /// Latest subdivision holding an event.
    pub fn max_subdivision(&self) -> u32 {
        self.max_subdivision
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events in the stream.
    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// Clear the stream for reuse.
    pub fn reset(&mut self) {
        self.events.clear();
        self.has_notes = false;
        self.max_subdivision = 0;
    }
}

/// The sixteen channel streams of one pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternStreams {
    channels: [ChannelStream; CHANNEL_COUNT],
}

impl PatternStreams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream for a 0-based channel.
    pub fn channel(&self, channel: u8) -> Option<&ChannelStream> {
        self.channels.get(channel as usize)
    }

    pub fn channel_mut(&mut self, channel: u8) -> Option<&mut ChannelStream> {
        self.channels.get_mut(channel as usize)
    }

    /// Iterate over `(channel, stream)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &ChannelStream)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(ch, stream)| (ch as u8, stream))
    }

    /// Latest subdivision across all channels.
    pub fn max_subdivision(&self) -> u32 {
        self.channels
            .iter()
            .map(ChannelStream::max_subdivision)
            .max()
            .unwrap_or(0)
    }

    /// Length in subdivisions, rounded up to a whole bar.
    pub fn length(&self) -> u32 {
        pattern_length(self.max_subdivision())
    }

    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(ChannelStream::is_empty)
    }

    /// Clear every channel stream.
    pub fn reset(&mut self) {
        for stream in &mut self.channels {
            stream.reset();
        }
    }
}
