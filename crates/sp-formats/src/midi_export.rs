//! Single-track MIDI export of one pattern.

use std::io::Write;

use sp_ir::{bpm_to_micros, encode_var_len, Event, Pattern, PatternStreams, TimedEvent};

use crate::ExportError;

/// Free text written after the tempo event of every export.
pub const EXPORT_INFO_TEXT: &str = "Exported by styleplayer";

const LOG_TARGET: &str = "sp::export";

/// Largest value a variable-length quantity can carry.
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Write `pattern` as a format 1, single-track MIDI file at `resolution`
/// ticks per quarter note.
///
/// Track layout: tempo, info text, one program change per assigned patch,
/// then every channel's events merged by tick (ties keep channel order),
/// closed by end-of-track at the last event's tick.
pub fn write_midi(
    w: &mut impl Write,
    pattern: &Pattern,
    streams: &PatternStreams,
    resolution: u16,
) -> Result<(), ExportError> {
    let body = merged_body(streams);
    let Some(last_tick) = body.last().map(|e| e.tick) else {
        return Err(ExportError::Empty);
    };

    let mut track = Vec::new();
    write_preamble(&mut track, pattern);

    let mut prev_tick = 0u64;
    let mut written = 0usize;
    for timed in &body {
        if is_preamble_patch(pattern, timed) {
            continue;
        }
        let mut encoded = Vec::new();
        if !timed.event.encode(&mut encoded) {
            continue;
        }
        encode_var_len(&mut track, delta(prev_tick, timed.tick)?);
        track.extend_from_slice(&encoded);
        prev_tick = timed.tick;
        written += 1;
    }
    encode_var_len(&mut track, delta(prev_tick, last_tick)?);
    track.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    write_header(w, resolution)?;
    w.write_all(b"MTrk")?;
    w.write_all(&(track.len() as u32).to_be_bytes())?;
    w.write_all(&track)?;

    log::info!(
        target: LOG_TARGET,
        "exported pattern \"{}\": {} events, {} ticks",
        pattern.name, written, last_tick
    );
    Ok(())
}

/// Export into a fresh byte buffer.
pub fn export_midi(
    pattern: &Pattern,
    streams: &PatternStreams,
    resolution: u16,
) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_midi(&mut buf, pattern, streams, resolution)?;
    Ok(buf)
}

fn delta(prev_tick: u64, tick: u64) -> Result<u32, ExportError> {
    let delta = tick - prev_tick;
    if delta > MAX_DELTA {
        return Err(ExportError::DeltaTooLarge { tick, delta });
    }
    Ok(delta as u32)
}

fn write_header(w: &mut impl Write, resolution: u16) -> std::io::Result<()> {
    w.write_all(b"MThd")?;
    w.write_all(&6u32.to_be_bytes())?;
    w.write_all(&1u16.to_be_bytes())?;
    w.write_all(&1u16.to_be_bytes())?;
    w.write_all(&resolution.to_be_bytes())
}

fn write_preamble(track: &mut Vec<u8>, pattern: &Pattern) {
    let micros = bpm_to_micros(pattern.tempo);
    track.push(0x00);
    track.extend_from_slice(&[0xFF, 0x51, 0x03]);
    track.extend_from_slice(&micros.to_be_bytes()[1..]);

    track.push(0x00);
    write_meta_text(track, 0x01, EXPORT_INFO_TEXT.as_bytes());

    for (channel, program) in pattern.patches() {
        track.extend_from_slice(&[0x00, 0xC0 | channel, program & 0x7F]);
    }
}

/// Every channel's events, flattened and stably sorted by tick.
fn merged_body(streams: &PatternStreams) -> Vec<&TimedEvent> {
    let mut body: Vec<&TimedEvent> = streams
        .iter()
        .flat_map(|(_, stream)| stream.iter())
        .collect();
    body.sort_by_key(|e| e.tick);
    body
}

/// A tick-0 program change the preamble already wrote.
fn is_preamble_patch(pattern: &Pattern, timed: &TimedEvent) -> bool {
    match timed.event {
        Event::PatchChange { channel, program } => {
            timed.tick == 0
                && pattern
                    .channels
                    .get(channel as usize)
                    .and_then(|slot| slot.patch())
                    == Some(program)
        }
        _ => false,
    }
}

fn write_meta_text(out: &mut Vec<u8>, meta_type: u8, text: &[u8]) {
    out.extend_from_slice(&[0xFF, meta_type]);
    encode_var_len(out, text.len() as u32);
    out.extend_from_slice(text);
}
