//! Parsed style/MIDI file container.

use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;
use thiserror::Error;

use crate::event::Event;
use crate::pattern::{Pattern, CHANNEL_COUNT};
use crate::stream::{ChannelStream, PatternStreams, TimedEvent};
use crate::timing::TickScale;

/// Requested pattern name does not exist in the loaded file.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("pattern \"{name}\" not found")]
pub struct PatternNotFound {
    pub name: String,
}

/// One recorded event, tagged with where it belongs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedEvent {
    /// Index into [`Style::patterns`]
    pub pattern: usize,
    /// 0-based channel (system exclusive events are filed under channel 0)
    pub channel: u8,
    /// Absolute tick, relative to the start of the pattern
    pub tick: u64,
    pub event: Event,
}

/// A loaded file: its patterns plus the flat log of every recorded event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Style {
    /// SMF format (0, 1 or 2)
    pub format: u16,
    /// Track count declared by the header
    pub track_count: u16,
    /// Native resolution converter
    pub scale: TickScale,
    /// Patterns in file order; never empty for a parsed file
    pub patterns: Vec<Pattern>,
    /// Recorded events in file order
    pub events: Vec<LoggedEvent>,
}

impl Style {
    /// Create an empty style holding one unnamed pattern.
    pub fn new(format: u16, track_count: u16, ticks_per_beat: u16) -> Self {
        Self {
            format,
            track_count,
            scale: TickScale::new(ticks_per_beat),
            patterns: alloc::vec![Pattern::new()],
            events: Vec::new(),
        }
    }

    /// Native resolution in ticks per quarter note.
    pub fn resolution(&self) -> u16 {
        self.scale.ticks_per_beat()
    }

    /// Look up a pattern by name. The first match wins.
    pub fn get_pattern(&self, name: &str) -> Result<&Pattern, PatternNotFound> {
        self.pattern_index(name).map(|idx| &self.patterns[idx])
    }

    fn pattern_index(&self, name: &str) -> Result<usize, PatternNotFound> {
        self.patterns
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| PatternNotFound { name: String::from(name) })
    }

    /// Names of all patterns, in file order.
    pub fn pattern_names(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|p| p.name.as_str())
    }

    /// Number of recorded events belonging to a pattern.
    pub fn event_count(&self, name: &str) -> Result<usize, PatternNotFound> {
        let idx = self.pattern_index(name)?;
        Ok(self.events.iter().filter(|e| e.pattern == idx).count())
    }

    /// Build the stream of one channel of a pattern.
    pub fn channel_stream(&self, name: &str, channel: u8) -> Result<ChannelStream, PatternNotFound> {
        let idx = self.pattern_index(name)?;
        let mut stream = ChannelStream::new();
        self.fill_stream(idx, channel, &mut stream);
        Ok(stream)
    }

    /// Build all sixteen channel streams of a pattern.
    pub fn streams(&self, name: &str) -> Result<PatternStreams, PatternNotFound> {
        let mut streams = PatternStreams::new();
        self.load_streams(name, &mut streams)?;
        Ok(streams)
    }

    /// Reset `streams` and refill it from another pattern.
    pub fn load_streams(&self, name: &str, streams: &mut PatternStreams) -> Result<(), PatternNotFound> {
        let idx = self.pattern_index(name)?;
        for ch in 0..CHANNEL_COUNT as u8 {
            if let Some(stream) = streams.channel_mut(ch) {
                self.fill_stream(idx, ch, stream);
            }
        }
        Ok(())
    }

    /// Refill `stream` with the events of (pattern `idx`, `channel`),
    /// rescaled to subdivisions and with note lengths paired.
    fn fill_stream(&self, idx: usize, channel: u8, stream: &mut ChannelStream) {
        stream.reset();

        let mut selected: Vec<&LoggedEvent> = self
            .events
            .iter()
            .filter(|e| e.pattern == idx && e.channel == channel)
            .collect();
        // Stable: equal ticks keep file order
        selected.sort_by_key(|e| e.tick);

        let mut timed: Vec<TimedEvent> = selected
            .into_iter()
            .map(|e| TimedEvent {
                subdivision: self.scale.to_subdivision(e.tick),
                tick: e.tick,
                event: e.event.clone(),
            })
            .collect();
        pair_note_lengths(&mut timed);

        for event in timed {
            stream.insert(event);
        }
    }
}

/// Fill in `length` on each sounding note-on from the next release of the
/// same key. Overlapping notes on one key are closed oldest-first; notes
/// that are never released keep a length of 0.
fn pair_note_lengths(events: &mut [TimedEvent]) {
    let mut open: Vec<VecDeque<usize>> = (0..128).map(|_| VecDeque::new()).collect();

    for i in 0..events.len() {
        let (key, is_release) = match events[i].event {
            Event::NoteOn { key, velocity, .. } => (key, velocity == 0),
            Event::NoteOff { key, .. } => (key, true),
            _ => continue,
        };
        let Some(pending) = open.get_mut(key as usize) else {
            continue;
        };

        if is_release {
            if let Some(on_idx) = pending.pop_front() {
                let span = events[i].subdivision - events[on_idx].subdivision;
                if let Event::NoteOn { length, .. } = &mut events[on_idx].event {
                    *length = span;
                }
            }
        } else {
            pending.push_back(i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ChannelSlot;
    use pretty_assertions::assert_eq;

    fn log(pattern: usize, channel: u8, tick: u64, event: Event) -> LoggedEvent {
        LoggedEvent { pattern, channel, tick, event }
    }

    fn note_on(channel: u8, key: u8, velocity: u8) -> Event {
        Event::NoteOn { channel, key, velocity, length: 0 }
    }

    fn two_pattern_style() -> Style {
        // 96 ppq: 3 ticks per subdivision
        let mut style = Style::new(0, 1, 96);
        style.patterns[0].name = String::from("Intro A");
        style.patterns[0].set_patch(0, 0);
        let next = style.patterns[0].successor("Main A");
        style.patterns.push(next);

        style.events.push(log(0, 0, 0, note_on(0, 60, 100)));
        style.events.push(log(0, 0, 96, Event::NoteOff { channel: 0, key: 60, velocity: 0 }));
        style.events.push(log(1, 9, 0, note_on(9, 36, 100)));
        style.events.push(log(1, 0, 48, note_on(0, 64, 90)));
        style.events.push(log(1, 0, 72, note_on(0, 64, 0)));
        style
    }

    #[test]
    fn get_pattern_reports_missing_name() {
        let style = two_pattern_style();
        assert_eq!(style.get_pattern("Main A").unwrap().name, "Main A");
        assert_eq!(
            style.get_pattern("Fill In AA"),
            Err(PatternNotFound { name: String::from("Fill In AA") })
        );
        assert_eq!(style.pattern_names().collect::<Vec<_>>(), ["Intro A", "Main A"]);
    }

    #[test]
    fn stream_filters_by_pattern_and_channel() {
        let style = two_pattern_style();
        let intro = style.channel_stream("Intro A", 0).unwrap();
        assert_eq!(intro.len(), 2);
        assert_eq!(intro.at(32).len(), 1);

        let main_drums = style.channel_stream("Main A", 9).unwrap();
        assert_eq!(main_drums.len(), 1);
        assert!(style.channel_stream("Intro A", 9).unwrap().is_empty());
        assert_eq!(style.event_count("Main A").unwrap(), 3);
    }

    #[test]
    fn note_length_paired_with_release() {
        let style = two_pattern_style();
        let intro = style.channel_stream("Intro A", 0).unwrap();
        assert_eq!(
            intro.at(0)[0].event,
            Event::NoteOn { channel: 0, key: 60, velocity: 100, length: 32 }
        );

        // Zero-velocity note-on closes a note too
        let main = style.channel_stream("Main A", 0).unwrap();
        assert_eq!(
            main.at(16)[0].event,
            Event::NoteOn { channel: 0, key: 64, velocity: 90, length: 8 }
        );
    }

    #[test]
    fn unpaired_note_defaults_to_zero_length() {
        let style = two_pattern_style();
        let drums = style.channel_stream("Main A", 9).unwrap();
        assert_eq!(
            drums.at(0)[0].event,
            Event::NoteOn { channel: 9, key: 36, velocity: 100, length: 0 }
        );
    }

    #[test]
    fn overlapping_notes_close_oldest_first() {
        let mut style = Style::new(0, 1, 32);
        style.events.push(log(0, 2, 0, note_on(2, 50, 80)));
        style.events.push(log(0, 2, 4, note_on(2, 50, 80)));
        style.events.push(log(0, 2, 10, Event::NoteOff { channel: 2, key: 50, velocity: 0 }));
        style.events.push(log(0, 2, 20, Event::NoteOff { channel: 2, key: 50, velocity: 0 }));

        let stream = style.channel_stream("", 2).unwrap();
        let lengths: Vec<u32> = stream
            .iter()
            .filter_map(|e| match e.event {
                Event::NoteOn { length, .. } => Some(length),
                _ => None,
            })
            .collect();
        assert_eq!(lengths, [10, 16]);
    }

    #[test]
    fn equal_ticks_keep_file_order() {
        let mut style = Style::new(0, 1, 32);
        style.events.push(log(0, 0, 8, Event::ControlChange { channel: 0, controller: 0, value: 0 }));
        style.events.push(log(0, 0, 0, Event::PatchChange { channel: 0, program: 1 }));
        style.events.push(log(0, 0, 8, Event::PatchChange { channel: 0, program: 2 }));

        let stream = style.channel_stream("", 0).unwrap();
        let at8: Vec<&Event> = stream.at(8).iter().map(|e| &e.event).collect();
        assert_eq!(
            at8,
            [
                &Event::ControlChange { channel: 0, controller: 0, value: 0 },
                &Event::PatchChange { channel: 0, program: 2 },
            ]
        );
    }

    #[test]
    fn load_streams_replaces_previous_pattern() {
        let style = two_pattern_style();
        let mut streams = style.streams("Intro A").unwrap();
        assert_eq!(streams.channel(0).unwrap().len(), 2);
        assert_eq!(style.patterns[1].channels[0], ChannelSlot::Patch(0));

        style.load_streams("Main A", &mut streams).unwrap();
        assert_eq!(streams.channel(0).unwrap().len(), 2);
        assert_eq!(streams.channel(9).unwrap().len(), 1);
        assert!(streams.channel(0).unwrap().at(0).is_empty());
    }
}
