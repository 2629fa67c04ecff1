//! Style and standard MIDI file parser.
//!
//! Walks the chunk sequence: MThd first, then any mix of MTrk chunks and
//! the known vendor chunks, stopping quietly at the first tag it does not
//! recognise. Marker meta-events split the event stream into patterns.

use sp_ir::{micros_to_bpm, Event, LoggedEvent, Pattern, Style, TextKind};

use crate::decoder::EventDecoder;
use crate::reader::{tag_name, ChunkReader};
use crate::{FormatError, FormatErrorKind};

const LOG_TARGET: &str = "sp::parse";

/// Vendor chunks that are skipped by their declared length.
const VENDOR_CHUNKS: [&[u8; 4]; 7] = [
    b"CASM", b"CSEG", b"Sdec", b"Ctab", b"Cntt", b"OTSc", b"FNRc",
];

/// Which high-volume event kinds to record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseOptions {
    pub keep_control_changes: bool,
    pub keep_sysex: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            keep_control_changes: true,
            keep_sysex: true,
        }
    }
}

impl ParseOptions {
    /// Drop control changes and system exclusive messages.
    pub fn quiet() -> Self {
        Self {
            keep_control_changes: false,
            keep_sysex: false,
        }
    }
}

/// Load a style or MIDI file from bytes, recording every event kind.
pub fn load_style(data: &[u8]) -> Result<Style, FormatError> {
    load_style_with(data, &ParseOptions::default())
}

/// Load a style or MIDI file from bytes.
///
/// On error nothing is returned; a partially built pattern table is
/// discarded.
pub fn load_style_with(data: &[u8], options: &ParseOptions) -> Result<Style, FormatError> {
    let mut r = ChunkReader::new(data);

    r.mark();
    if r.read_tag().as_ref() != Some(b"MThd") {
        return Err(r.error(FormatErrorKind::MissingHeader));
    }
    let style = parse_header(&mut r)?;
    log::debug!(
        target: LOG_TARGET,
        "MThd: format {} with {} tracks at {} ppq",
        style.format, style.track_count, style.resolution()
    );

    let mut ctx = ParseContext::new(style, options);
    loop {
        r.mark();
        let Some(tag) = r.read_tag() else {
            break;
        };
        if &tag == b"MTrk" {
            parse_track(&mut r, &mut ctx)?;
        } else if VENDOR_CHUNKS.contains(&&tag) {
            skip_chunk(&mut r, &tag)?;
        } else {
            log::debug!(
                target: LOG_TARGET,
                "stopping at chunk \"{}\" (offset {})",
                tag_name(&tag),
                r.last_position()
            );
            break;
        }
    }

    let style = ctx.finish();
    log::debug!(
        target: LOG_TARGET,
        "parsed {} patterns, {} events",
        style.patterns.len(),
        style.events.len()
    );
    Ok(style)
}

// ---------------------------------------------------------------------------
// Chunks
// ---------------------------------------------------------------------------

fn parse_header(r: &mut ChunkReader) -> Result<Style, FormatError> {
    let len = r.read_fixed(4)?;
    if len != 6 {
        return Err(r.error(FormatErrorKind::HeaderLength(len)));
    }
    let format = r.read_fixed(2)? as u16;
    let tracks = r.read_fixed(2)? as u16;
    let division = r.read_fixed(2)? as u16;
    // Negative division means SMPTE timing
    if division == 0 || division & 0x8000 != 0 {
        return Err(r.error(FormatErrorKind::InvalidResolution(division)));
    }
    Ok(Style::new(format, tracks, division))
}

fn skip_chunk(r: &mut ChunkReader, tag: &[u8; 4]) -> Result<(), FormatError> {
    let len = r.read_fixed(4)? as usize;
    log::trace!(target: LOG_TARGET, "skipping {} ({} bytes)", tag_name(tag), len);
    r.skip(len)
}

fn parse_track(r: &mut ChunkReader, ctx: &mut ParseContext) -> Result<(), FormatError> {
    let declared = r.read_fixed(4)?;
    let start = r.position();
    let end = start.saturating_add(declared as usize);
    let mut decoder = EventDecoder::new();
    ctx.time = 0;

    while r.position() < end {
        r.mark();
        let ev = decoder.read_event(r)?;
        ctx.time += ev.delta as u64;
        if ev.event == Event::EndOfTrack {
            break;
        }
        ctx.handle(ev.event);
    }

    let consumed = r.position() - start;
    if consumed != declared as usize {
        return Err(r.error(FormatErrorKind::ChunkLength {
            tag: String::from("MTrk"),
            declared,
            consumed,
        }));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parser state
// ---------------------------------------------------------------------------

/// Mutable state threaded through the chunk loop.
struct ParseContext<'o> {
    style: Style,
    options: &'o ParseOptions,
    /// Index of the pattern receiving events
    current: usize,
    /// Absolute ticks since track start or the last pattern boundary
    time: u64,
}

impl<'o> ParseContext<'o> {
    fn new(style: Style, options: &'o ParseOptions) -> Self {
        Self {
            style,
            options,
            current: 0,
            time: 0,
        }
    }

    fn pattern_mut(&mut self) -> &mut Pattern {
        &mut self.style.patterns[self.current]
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::NoteOn { channel, .. }
            | Event::NoteOff { channel, .. }
            | Event::PitchBend { channel, .. } => self.record(channel, event),
            Event::ControlChange { channel, .. } => {
                if self.options.keep_control_changes {
                    self.record(channel, event);
                }
            }
            Event::PatchChange { channel, program } => {
                self.pattern_mut().set_patch(channel, program);
                self.record(channel, event);
            }
            Event::SysEx(_) => {
                if self.options.keep_sysex {
                    self.record(0, event);
                }
            }
            Event::Tempo(micros) => {
                let bpm = micros_to_bpm(micros);
                if bpm > 0 {
                    self.pattern_mut().tempo = bpm;
                }
            }
            Event::TimeSignature(ts) => self.pattern_mut().set_time_signature(&ts),
            Event::KeySignature(ks) => self.pattern_mut().set_key_signature(&ks),
            Event::Text(TextKind::Marker, name) => self.marker(&name),
            Event::Text(..) | Event::EndOfTrack | Event::Other => {}
        }
    }

    fn record(&mut self, channel: u8, event: Event) {
        if event.channel().is_some() {
            self.pattern_mut().touch_channel(channel);
        }
        self.style.events.push(LoggedEvent {
            pattern: self.current,
            channel,
            tick: self.time,
            event,
        });
    }

    /// A marker names the implicit first pattern, or opens a new one that
    /// inherits the current pattern's settings and restarts the clock.
    fn marker(&mut self, name: &str) {
        if self.pattern_mut().name.is_empty() {
            self.pattern_mut().name = String::from(name);
            log::debug!(target: LOG_TARGET, "pattern \"{}\"", name);
            return;
        }
        let next = self.style.patterns[self.current].successor(name);
        self.style.patterns.push(next);
        self.current = self.style.patterns.len() - 1;
        self.time = 0;
        log::debug!(target: LOG_TARGET, "pattern \"{}\" (#{})", name, self.current);
    }

    fn finish(self) -> Style {
        self.style
    }
}
