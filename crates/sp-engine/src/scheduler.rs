//! Subdivision-stepped pattern playback.
//!
//! The scheduler owns the streams of one pattern and a position on its
//! timeline. The host calls [`PlaybackScheduler::tick`] once per timer
//! period; each call emits the events at the current subdivision and
//! advances by one. The scheduler never sleeps or spawns: pacing belongs
//! to whoever drives it, using the period returned by
//! [`PlaybackScheduler::play`].

use core::time::Duration;

use sp_ir::{
    subdivision_period_micros, Event, Pattern, PatternStreams, CHANNEL_COUNT, DEFAULT_DRUM_SLOT,
    DEFAULT_TEMPO,
};

use crate::play_state::{ChannelPlayState, ChannelStates};
use crate::sink::{all_notes_off, DeviceSink};

/// Volume value that leaves velocities unchanged.
pub const UNITY_VOLUME: u16 = 100;

const LOG_TARGET: &str = "sp::player";

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transport {
    #[default]
    Stopped,
    Playing,
}

/// What a call to [`PlaybackScheduler::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing; nothing was emitted.
    Idle,
    /// Emitted and advanced.
    Advanced,
    /// Reached the end and wrapped back to the start.
    Looped,
    /// Reached the end with looping off; now stopped at the start.
    Finished,
}

/// Plays one pattern's channel streams against a [`DeviceSink`].
#[derive(Clone, Debug)]
pub struct PlaybackScheduler {
    streams: PatternStreams,
    /// Pattern length in subdivisions, a whole number of bars
    length: u32,
    /// Optional earlier end point
    loop_end: Option<u32>,
    /// Next subdivision to emit
    position: u32,
    transport: Transport,
    states: ChannelStates,
    /// Tempo in BPM
    tempo: u32,
    master_volume: u16,
    channel_volumes: [u16; CHANNEL_COUNT],
    volume_max: u16,
    /// Source channel holding the drum part
    drum_slot: u8,
    /// Output channel the drum part is sent to
    drum_channel: u8,
    looping: bool,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackScheduler {
    /// Create a stopped scheduler with no pattern loaded.
    pub fn new() -> Self {
        let streams = PatternStreams::new();
        Self {
            length: streams.length(),
            streams,
            loop_end: None,
            position: 0,
            transport: Transport::Stopped,
            states: ChannelStates::new(),
            tempo: DEFAULT_TEMPO,
            master_volume: UNITY_VOLUME,
            channel_volumes: [UNITY_VOLUME; CHANNEL_COUNT],
            volume_max: UNITY_VOLUME,
            drum_slot: DEFAULT_DRUM_SLOT,
            drum_channel: DEFAULT_DRUM_SLOT,
            looping: false,
        }
    }

    /// Replace the current pattern.
    ///
    /// Takes the pattern's tempo and drum slot and rewinds to the start.
    /// When playing, sounding notes are silenced first and playback
    /// continues with the new pattern; the returned period replaces the
    /// running timer. Returns `None` while stopped.
    pub fn load_pattern(
        &mut self,
        pattern: &Pattern,
        streams: PatternStreams,
        sink: &mut dyn DeviceSink,
    ) -> Option<Duration> {
        if self.is_playing() {
            self.silence_all(sink);
        }
        self.length = streams.length();
        self.streams = streams;
        self.tempo = pattern.tempo.max(1);
        self.drum_slot = pattern.drum_slot;
        self.position = 0;
        log::debug!(
            target: LOG_TARGET,
            "loaded pattern \"{}\": {} subdivisions at {} bpm",
            pattern.name, self.length, self.tempo
        );
        self.is_playing().then(|| self.period())
    }

    /// Start playback and return the timer period to tick at.
    ///
    /// Playing while already playing restarts from the beginning.
    pub fn play(&mut self, sink: &mut dyn DeviceSink) -> Duration {
        if self.is_playing() {
            self.silence_all(sink);
            self.position = 0;
        }
        self.transport = Transport::Playing;
        self.period()
    }

    /// Stop playback, keeping the position. Silences every channel if
    /// playback was running.
    pub fn stop(&mut self, sink: &mut dyn DeviceSink) {
        if self.is_playing() {
            self.transport = Transport::Stopped;
            self.silence_all(sink);
        }
    }

    /// Stop and return to the start. Silences every channel in either
    /// transport state.
    pub fn rewind(&mut self, sink: &mut dyn DeviceSink) {
        self.transport = Transport::Stopped;
        self.position = 0;
        self.silence_all(sink);
    }

    /// Emit the events at the current subdivision, then advance.
    pub fn tick(&mut self, sink: &mut dyn DeviceSink) -> TickOutcome {
        if !self.is_playing() {
            return TickOutcome::Idle;
        }

        let eligible = self.states.eligible();
        for (channel, stream) in self.streams.iter() {
            if !eligible[channel as usize] {
                continue;
            }
            for timed in stream.at(self.position) {
                self.emit(channel, &timed.event, sink);
            }
        }

        self.position += 1;
        if self.position < self.end() {
            return TickOutcome::Advanced;
        }

        self.position = 0;
        if self.looping {
            log::trace!(target: LOG_TARGET, "loop");
            TickOutcome::Looped
        } else {
            self.transport = Transport::Stopped;
            self.silence_all(sink);
            TickOutcome::Finished
        }
    }

    /// Change a channel's solo/mute state.
    ///
    /// While playing, soloing a channel silences every output channel no
    /// soloed source plays on, and muting a channel silences its output.
    pub fn set_channel_state(
        &mut self,
        channel: u8,
        state: ChannelPlayState,
        sink: &mut dyn DeviceSink,
    ) {
        if self.states.set(channel, state).is_none() || !self.is_playing() {
            return;
        }
        match state {
            ChannelPlayState::Solo => {
                // Output channels still fed by a soloed source keep sounding
                let mut audible = [false; CHANNEL_COUNT];
                for source in 0..CHANNEL_COUNT as u8 {
                    if self.states.get(source) == ChannelPlayState::Solo {
                        audible[self.route(source) as usize] = true;
                    }
                }
                for (output, _) in audible.iter().enumerate().filter(|(_, on)| !**on) {
                    sink.send(&all_notes_off(output as u8));
                }
            }
            ChannelPlayState::Mute => sink.send(&all_notes_off(self.route(channel))),
            ChannelPlayState::Normal => {}
        }
    }

    /// Put every channel back to Normal.
    pub fn clear_channel_states(&mut self) {
        self.states.reset();
    }

    pub fn channel_state(&self, channel: u8) -> ChannelPlayState {
        self.states.get(channel)
    }

    /// Set the tempo in BPM.
    ///
    /// Returns the new timer period when playing; the driver must restart
    /// its timer with it.
    pub fn set_tempo(&mut self, bpm: u32) -> Option<Duration> {
        self.tempo = bpm.max(1);
        self.is_playing().then(|| self.period())
    }

    /// Highest accepted volume; current volumes are clamped to it.
    pub fn set_volume_max(&mut self, max: u16) {
        self.volume_max = max;
        self.master_volume = self.master_volume.min(max);
        for volume in &mut self.channel_volumes {
            *volume = (*volume).min(max);
        }
    }

    pub fn set_master_volume(&mut self, volume: u16) {
        self.master_volume = volume.min(self.volume_max);
    }

    pub fn set_channel_volume(&mut self, channel: u8, volume: u16) {
        let max = self.volume_max;
        if let Some(slot) = self.channel_volumes.get_mut(channel as usize) {
            *slot = volume.min(max);
        }
    }

    /// Set the 0-based output channel for the drum part.
    pub fn set_drum_channel(&mut self, channel: u8) {
        self.drum_channel = channel & 0x0F;
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// End playback at `end` subdivisions instead of the pattern length.
    /// Clamped to the pattern length; `None` restores the full length.
    pub fn set_loop_end(&mut self, end: Option<u32>) {
        self.loop_end = end;
        if self.position >= self.end() {
            self.position = 0;
        }
    }

    /// Next subdivision to be emitted.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Pattern length in subdivisions.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Subdivision at which playback wraps or stops.
    pub fn end(&self) -> u32 {
        self.loop_end.map_or(self.length, |end| end.clamp(1, self.length))
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    /// Time between two ticks at the current tempo.
    pub fn period(&self) -> Duration {
        Duration::from_micros(subdivision_period_micros(self.tempo))
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    pub fn drum_channel(&self) -> u8 {
        self.drum_channel
    }

    pub fn streams(&self) -> &PatternStreams {
        &self.streams
    }

    /// Output channel for a source channel.
    fn route(&self, source: u8) -> u8 {
        if source == self.drum_slot {
            self.drum_channel
        } else {
            source
        }
    }

    /// Send "all notes off" on every output channel.
    fn silence_all(&self, sink: &mut dyn DeviceSink) {
        for channel in 0..CHANNEL_COUNT as u8 {
            sink.send(&all_notes_off(channel));
        }
    }

    /// Scale a velocity by the master and channel volumes.
    fn scale_velocity(&self, source: u8, velocity: u8) -> u8 {
        let channel_volume = self
            .channel_volumes
            .get(source as usize)
            .copied()
            .unwrap_or(UNITY_VOLUME);
        let unity = UNITY_VOLUME as u32 * UNITY_VOLUME as u32;
        let scaled = velocity as u32 * self.master_volume as u32 * channel_volume as u32 / unity;
        scaled.min(127) as u8
    }

    fn emit(&self, source: u8, event: &Event, sink: &mut dyn DeviceSink) {
        let target = self.route(source);
        match *event {
            // Drum channels do not take zero-velocity note-ons as releases
            Event::NoteOn { velocity: 0, .. } if target == self.drum_channel => {}
            Event::NoteOn { key, velocity, length, .. } => sink.send(&Event::NoteOn {
                channel: target,
                key,
                velocity: self.scale_velocity(source, velocity),
                length,
            }),
            Event::NoteOff { .. } if target == self.drum_channel => {}
            _ => sink.send(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ALL_NOTES_OFF;
    use alloc::vec::Vec;
    use pretty_assertions::assert_eq;
    use sp_ir::TimedEvent;

    fn note_on(channel: u8, key: u8, velocity: u8) -> Event {
        Event::NoteOn { channel, key, velocity, length: 0 }
    }

    fn note_off(channel: u8, key: u8) -> Event {
        Event::NoteOff { channel, key, velocity: 0 }
    }

    fn streams_with(events: &[(u32, Event)]) -> PatternStreams {
        let mut streams = PatternStreams::new();
        for (subdivision, event) in events {
            let channel = event.channel().unwrap_or(0);
            streams.channel_mut(channel).unwrap().insert(TimedEvent {
                subdivision: *subdivision,
                tick: *subdivision as u64,
                event: event.clone(),
            });
        }
        streams
    }

    fn scheduler_with(events: &[(u32, Event)]) -> PlaybackScheduler {
        let mut pattern = Pattern::new();
        for (_, event) in events {
            if let Some(channel) = event.channel() {
                pattern.touch_channel(channel);
            }
        }
        let mut sched = PlaybackScheduler::new();
        sched.load_pattern(&pattern, streams_with(events), &mut Vec::<Event>::new());
        sched
    }

    fn notes(out: &[Event]) -> Vec<&Event> {
        out.iter().filter(|e| e.is_note()).collect()
    }

    fn is_all_notes_off(event: &Event) -> bool {
        matches!(event, Event::ControlChange { controller: ALL_NOTES_OFF, value: 0, .. })
    }

    #[test]
    fn unpaired_drum_note_plays_once_at_tick_zero() {
        let mut pattern = Pattern::new();
        pattern.set_patch(0, 0);
        pattern.touch_channel(9);
        let mut sched = PlaybackScheduler::new();
        sched.load_pattern(&pattern, streams_with(&[(0, note_on(9, 36, 100))]), &mut Vec::<Event>::new());

        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        assert_eq!(sched.tick(&mut out), TickOutcome::Advanced);
        assert_eq!(out, [note_on(9, 36, 100)]);

        let mut outcome = TickOutcome::Advanced;
        while outcome == TickOutcome::Advanced {
            outcome = sched.tick(&mut out);
        }
        assert_eq!(outcome, TickOutcome::Finished);
        assert_eq!(notes(&out), [&note_on(9, 36, 100)]);
    }

    #[test]
    fn solo_and_mute_arbitration() {
        let events = [
            (0, note_on(0, 60, 100)),
            (0, note_on(1, 62, 100)),
            (0, note_on(2, 64, 100)),
        ];
        let mut sched = scheduler_with(&events);
        let mut out: Vec<Event> = Vec::new();
        sched.set_channel_state(0, ChannelPlayState::Solo, &mut out);
        sched.set_channel_state(2, ChannelPlayState::Mute, &mut out);
        // Not playing: state changes send nothing
        assert!(out.is_empty());

        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(notes(&out), [&note_on(0, 60, 100)]);

        // A second solo channel joins; mute and plain normal stay out
        sched.set_channel_state(1, ChannelPlayState::Solo, &mut out);
        out.clear();
        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(notes(&out), [&note_on(0, 60, 100), &note_on(1, 62, 100)]);
    }

    #[test]
    fn zero_velocity_note_on_suppressed_only_on_drum_channel() {
        let mut sched = scheduler_with(&[(0, note_on(9, 36, 0)), (0, note_on(3, 48, 0))]);
        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(out, [note_on(3, 48, 0)]);
    }

    #[test]
    fn note_off_suppressed_on_drum_channel() {
        let mut sched = scheduler_with(&[(0, note_off(9, 36)), (0, note_off(3, 48))]);
        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(out, [note_off(3, 48)]);
    }

    #[test]
    fn drum_part_follows_configured_channel() {
        let events = [
            (0, note_on(9, 36, 100)),
            (0, note_on(9, 38, 0)),
            (0, note_off(15, 50)),
            (0, Event::ControlChange { channel: 9, controller: 7, value: 90 }),
        ];
        let mut sched = scheduler_with(&events);
        sched.set_drum_channel(15);

        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        sched.tick(&mut out);
        // Suppression is decided on the output channel, so a release on
        // channel 16 is dropped even though it is not the drum part
        assert_eq!(
            out,
            [
                note_on(15, 36, 100),
                Event::ControlChange { channel: 9, controller: 7, value: 90 },
            ]
        );
    }

    #[test]
    fn velocity_scaled_by_master_and_channel_volume() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100)), (0, note_on(1, 60, 100))]);
        sched.set_master_volume(50);
        sched.set_channel_volume(1, 50);

        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(out, [note_on(0, 60, 50), note_on(1, 60, 25)]);
    }

    #[test]
    fn boosted_velocity_is_clamped() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100))]);
        sched.set_volume_max(200);
        sched.set_master_volume(250);
        sched.set_channel_volume(0, 200);

        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(out, [note_on(0, 60, 127)]);

        // Lowering the maximum clamps volumes already set
        sched.set_volume_max(50);
        sched.rewind(&mut out);
        out.clear();
        sched.play(&mut out);
        sched.tick(&mut out);
        assert_eq!(out, [note_on(0, 60, 25)]);
    }

    #[test]
    fn looping_wraps_to_zero_and_keeps_playing() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100))]);
        sched.set_looping(true);
        assert_eq!(sched.length(), 128);

        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        for _ in 0..127 {
            assert_eq!(sched.tick(&mut out), TickOutcome::Advanced);
        }
        assert_eq!(sched.position(), 127);
        assert_eq!(sched.tick(&mut out), TickOutcome::Looped);
        assert_eq!(sched.position(), 0);
        assert!(sched.is_playing());

        sched.tick(&mut out);
        assert_eq!(notes(&out).len(), 2);
    }

    #[test]
    fn end_without_looping_stops_silences_and_rewinds() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100))]);
        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        for _ in 0..127 {
            sched.tick(&mut out);
        }
        out.clear();
        assert_eq!(sched.tick(&mut out), TickOutcome::Finished);
        assert_eq!(sched.transport(), Transport::Stopped);
        assert_eq!(sched.position(), 0);
        assert_eq!(out.len(), 16);
        assert!(out.iter().all(is_all_notes_off));

        assert_eq!(sched.tick(&mut out), TickOutcome::Idle);
    }

    #[test]
    fn loop_end_shortens_the_pattern() {
        let mut sched = scheduler_with(&[(200, note_on(0, 60, 100))]);
        assert_eq!(sched.length(), 256);
        sched.set_looping(true);
        sched.set_loop_end(Some(32));
        assert_eq!(sched.end(), 32);

        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        let outcomes: Vec<TickOutcome> = (0..32).map(|_| sched.tick(&mut out)).collect();
        assert_eq!(outcomes.last(), Some(&TickOutcome::Looped));
        assert!(notes(&out).is_empty());

        sched.set_loop_end(Some(10_000));
        assert_eq!(sched.end(), 256);
        sched.set_loop_end(None);
        assert_eq!(sched.end(), 256);
    }

    #[test]
    fn stop_silences_every_channel_once() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100))]);
        let mut out: Vec<Event> = Vec::new();
        sched.stop(&mut out);
        assert!(out.is_empty());

        sched.play(&mut out);
        sched.tick(&mut out);
        sched.tick(&mut out);
        out.clear();
        sched.stop(&mut out);

        let channels: Vec<u8> = out.iter().filter_map(Event::channel).collect();
        assert_eq!(channels, (0..16).collect::<Vec<u8>>());
        assert!(out.iter().all(is_all_notes_off));
        // Stop keeps the position, rewind clears it
        assert_eq!(sched.position(), 2);
        out.clear();
        sched.rewind(&mut out);
        assert_eq!(sched.position(), 0);

        // Rewind silences even when already stopped
        let channels: Vec<u8> = out.iter().filter_map(Event::channel).collect();
        assert_eq!(channels, (0..16).collect::<Vec<u8>>());
        assert!(out.iter().all(is_all_notes_off));
        assert!(!sched.is_playing());
    }

    #[test]
    fn play_while_playing_restarts() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100))]);
        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        for _ in 0..10 {
            sched.tick(&mut out);
        }
        out.clear();
        sched.play(&mut out);
        assert_eq!(sched.position(), 0);
        assert!(sched.is_playing());
        assert_eq!(out.len(), 16);
    }

    #[test]
    fn solo_while_playing_silences_other_channels() {
        let mut sched = scheduler_with(&[(0, note_on(0, 60, 100))]);
        let mut out: Vec<Event> = Vec::new();
        sched.set_channel_state(2, ChannelPlayState::Solo, &mut out);
        sched.play(&mut out);

        sched.set_channel_state(5, ChannelPlayState::Solo, &mut out);
        let silenced: Vec<u8> = out.iter().filter_map(Event::channel).collect();
        assert_eq!(silenced.len(), 14);
        assert!(!silenced.contains(&2) && !silenced.contains(&5));

        out.clear();
        sched.set_channel_state(7, ChannelPlayState::Mute, &mut out);
        assert_eq!(out, [crate::all_notes_off(7)]);

        out.clear();
        sched.set_channel_state(7, ChannelPlayState::Normal, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn solo_silences_output_channels_not_sources() {
        let mut sched = scheduler_with(&[(0, note_on(9, 36, 100))]);
        sched.set_drum_channel(15);
        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        out.clear();

        sched.set_channel_state(15, ChannelPlayState::Solo, &mut out);
        let silenced: Vec<u8> = out.iter().filter_map(Event::channel).collect();
        assert_eq!(silenced, (0..15).collect::<Vec<u8>>());

        // Soloing the drum part keeps its routed output sounding
        let mut sched = scheduler_with(&[(0, note_on(9, 36, 100))]);
        sched.set_drum_channel(3);
        sched.play(&mut out);
        out.clear();
        sched.set_channel_state(9, ChannelPlayState::Solo, &mut out);
        let silenced: Vec<u8> = out.iter().filter_map(Event::channel).collect();
        assert_eq!(silenced.len(), 15);
        assert!(!silenced.contains(&3));
        assert!(silenced.contains(&9));
    }

    #[test]
    fn tempo_change_reports_new_period_only_while_playing() {
        let mut sched = PlaybackScheduler::new();
        assert_eq!(sched.period(), Duration::from_micros(18_750));
        assert_eq!(sched.set_tempo(120), None);

        let period = sched.play(&mut Vec::<Event>::new());
        assert_eq!(period, Duration::from_micros(15_625));
        assert_eq!(sched.set_tempo(60), Some(Duration::from_micros(31_250)));
    }

    #[test]
    fn load_pattern_takes_tempo_and_drum_slot() {
        let mut pattern = Pattern::new();
        pattern.tempo = 132;
        pattern.drum_slot = 3;
        let mut sched = PlaybackScheduler::new();
        let mut out: Vec<Event> = Vec::new();
        sched.play(&mut out);
        out.clear();

        let period = sched.load_pattern(&pattern, streams_with(&[(0, note_on(3, 36, 0))]), &mut out);
        assert_eq!(period, Some(Duration::from_micros(14_204)));
        assert_eq!(out.len(), 16);
        assert_eq!(sched.tempo(), 132);
        assert!(sched.is_playing());

        out.clear();
        sched.tick(&mut out);
        // Slot 3 now routes to the drum channel, so the zero-velocity note is dropped
        assert!(out.is_empty());
    }
}
