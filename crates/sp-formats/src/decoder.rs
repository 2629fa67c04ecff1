//! Track event decoding.

use sp_ir::{Event, KeySignature, TextKind, TimeSignature};

use crate::reader::{be_value, ChunkReader};
use crate::{FormatError, FormatErrorKind};

/// An event with the delta-time that preceded it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackEvent {
    /// Ticks since the previous event of the track
    pub delta: u32,
    pub event: Event,
}

/// Decodes the events of one track chunk.
///
/// Holds the running status between calls, so use one decoder per track.
#[derive(Clone, Debug, Default)]
pub struct EventDecoder {
    running_status: Option<u8>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next event.
    pub fn read_event(&mut self, r: &mut ChunkReader) -> Result<TrackEvent, FormatError> {
        let delta = r.read_var_len()?;
        let first = r.read_u8()?;

        let event = if first & 0x80 == 0 {
            // Running status: `first` is already the first data byte
            let status = self
                .running_status
                .ok_or_else(|| r.error(FormatErrorKind::MissingRunningStatus(first)))?;
            read_channel_message(r, status, first)?
        } else {
            match first {
                0x80..=0xEF => {
                    self.running_status = Some(first);
                    let data1 = r.read_u8()?;
                    read_channel_message(r, first, data1)?
                }
                0xF0 | 0xF7 => {
                    self.running_status = None;
                    let len = r.read_var_len()? as usize;
                    let data = r.read_bytes(len)?;
                    if first == 0xF0 {
                        Event::SysEx(data.to_vec())
                    } else {
                        Event::Other
                    }
                }
                0xFF => read_meta(r)?,
                // System common/real-time bytes carry no payload in a file
                _ => Event::Other,
            }
        };

        Ok(TrackEvent { delta, event })
    }
}

fn read_channel_message(r: &mut ChunkReader, status: u8, data1: u8) -> Result<Event, FormatError> {
    let channel = status & 0x0F;
    let data1 = data1 & 0x7F;

    let event = match status & 0xF0 {
        0x80 => Event::NoteOff {
            channel,
            key: data1,
            velocity: r.read_u8()? & 0x7F,
        },
        0x90 => Event::NoteOn {
            channel,
            key: data1,
            velocity: r.read_u8()? & 0x7F,
            length: 0,
        },
        0xA0 => {
            r.skip(1)?;
            Event::Other
        }
        0xB0 => Event::ControlChange {
            channel,
            controller: data1,
            value: r.read_u8()? & 0x7F,
        },
        0xC0 => Event::PatchChange { channel, program: data1 },
        0xD0 => Event::Other,
        _ => {
            let msb = r.read_u8()? & 0x7F;
            Event::PitchBend {
                channel,
                value: (msb as u16) << 7 | data1 as u16,
            }
        }
    };
    Ok(event)
}

fn read_meta(r: &mut ChunkReader) -> Result<Event, FormatError> {
    let meta_type = r.read_u8()?;
    let len = r.read_var_len()? as usize;
    let data = r.read_bytes(len)?;

    let event = match meta_type {
        0x2F => Event::EndOfTrack,
        0x51 if len >= 3 => Event::Tempo(be_value(&data[..3])),
        0x58 if len >= 4 => Event::TimeSignature(TimeSignature {
            numerator: data[0],
            denominator_pow: data[1],
            clocks_per_click: data[2],
            notated_32nds_per_beat: data[3],
        }),
        0x59 if len >= 2 => Event::KeySignature(KeySignature {
            sharps: data[0] as i8,
            minor: data[1] == 1,
        }),
        _ => match TextKind::from_meta_type(meta_type) {
            Some(kind) => Event::Text(kind, String::from_utf8_lossy(data).into_owned()),
            None => Event::Other,
        },
    };
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<TrackEvent> {
        let mut r = ChunkReader::new(bytes);
        let mut decoder = EventDecoder::new();
        let mut out = Vec::new();
        while r.remaining() > 0 {
            out.push(decoder.read_event(&mut r).unwrap());
        }
        out
    }

    #[test]
    fn channel_messages() {
        let events = decode_all(&[
            0x00, 0x93, 60, 100, // note on ch 3
            0x60, 0x83, 60, 64, // note off after 96 ticks
            0x00, 0xB9, 7, 110, // cc 7 on ch 9
            0x00, 0xC0, 24, // program change
            0x00, 0xE1, 0x00, 0x40, // pitch bend centre
        ]);
        let kinds: Vec<Event> = events.iter().map(|e| e.event.clone()).collect();
        assert_eq!(
            kinds,
            [
                Event::NoteOn { channel: 3, key: 60, velocity: 100, length: 0 },
                Event::NoteOff { channel: 3, key: 60, velocity: 64 },
                Event::ControlChange { channel: 9, controller: 7, value: 110 },
                Event::PatchChange { channel: 0, program: 24 },
                Event::PitchBend { channel: 1, value: 0x2000 },
            ]
        );
        assert_eq!(events[1].delta, 0x60);
    }

    #[test]
    fn running_status_reuses_previous_status() {
        let events = decode_all(&[
            0x00, 0x99, 36, 100, //
            0x10, 42, 80, // running status: note on ch 9
            0x10, 36, 0, // running status: zero-velocity note on
        ]);
        assert_eq!(
            events[1].event,
            Event::NoteOn { channel: 9, key: 42, velocity: 80, length: 0 }
        );
        assert!(events[2].event.is_release());
        assert_eq!(events[2].delta, 0x10);
    }

    #[test]
    fn data_byte_without_status_fails() {
        let mut r = ChunkReader::new(&[0x00, 0x3C, 0x40]);
        let err = EventDecoder::new().read_event(&mut r).unwrap_err();
        assert_eq!(err.kind, FormatErrorKind::MissingRunningStatus(0x3C));
    }

    #[test]
    fn meta_events() {
        let events = decode_all(&[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 500000 us
            0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, // 4/4
            0x00, 0xFF, 0x59, 0x02, 0xFD, 0x01, // 3 flats, minor
            0x00, 0xFF, 0x06, 0x06, b'M', b'a', b'i', b'n', b' ', b'A', // marker
            0x00, 0xFF, 0x7F, 0x02, 0x43, 0x00, // sequencer specific
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        assert_eq!(events[0].event, Event::Tempo(500_000));
        assert!(matches!(events[1].event, Event::TimeSignature(ts) if ts.to_string() == "4/4"));
        assert_eq!(
            events[2].event,
            Event::KeySignature(KeySignature { sharps: -3, minor: true })
        );
        assert_eq!(events[3].event, Event::Text(TextKind::Marker, "Main A".into()));
        assert_eq!(events[4].event, Event::Other);
        assert_eq!(events[5].event, Event::EndOfTrack);
    }

    #[test]
    fn sysex_clears_running_status() {
        let mut r = ChunkReader::new(&[
            0x00, 0x90, 60, 100, //
            0x00, 0xF0, 0x03, 0x7E, 0x09, 0xF7, //
            0x00, 60, 0,
        ]);
        let mut decoder = EventDecoder::new();
        decoder.read_event(&mut r).unwrap();
        assert_eq!(
            decoder.read_event(&mut r).unwrap().event,
            Event::SysEx(vec![0x7E, 0x09, 0xF7])
        );
        assert!(decoder.read_event(&mut r).is_err());
    }

    #[test]
    fn aftertouch_is_consumed_but_unmodelled() {
        let events = decode_all(&[0x00, 0xA0, 60, 10, 0x00, 0xD0, 5, 0x00, 0x90, 60, 1]);
        assert_eq!(events[0].event, Event::Other);
        assert_eq!(events[1].event, Event::Other);
        assert!(matches!(events[2].event, Event::NoteOn { .. }));
    }
}
