//! A sink that logs what it would play.

use sp_engine::DeviceSink;
use sp_ir::Event;

const LOG_TARGET: &str = "sp::device";

/// Logs every event at debug level and counts what passed through.
///
/// Useful without a synthesizer attached, and as the fallback output of
/// the command-line player.
#[derive(Debug, Default)]
pub struct MonitorOutput {
    sent: usize,
    notes: usize,
}

impl MonitorOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Sounding note-ons received so far.
    pub fn notes(&self) -> usize {
        self.notes
    }
}

impl DeviceSink for MonitorOutput {
    fn send(&mut self, event: &Event) {
        self.sent += 1;
        if matches!(event, Event::NoteOn { velocity, .. } if *velocity > 0) {
            self.notes += 1;
        }
        log::debug!(target: LOG_TARGET, "{}", describe(event));
    }
}

/// One-line text for an event, with 1-based channel numbers.
pub fn describe(event: &Event) -> String {
    match event {
        Event::NoteOn { channel, key, velocity, length } => format!(
            "ch{:<2} note on   {:>3} vel {:>3} len {}",
            channel + 1,
            key,
            velocity,
            length
        ),
        Event::NoteOff { channel, key, velocity } => {
            format!("ch{:<2} note off  {:>3} vel {:>3}", channel + 1, key, velocity)
        }
        Event::ControlChange { channel, controller, value } => {
            format!("ch{:<2} control   {:>3} = {}", channel + 1, controller, value)
        }
        Event::PatchChange { channel, program } => {
            format!("ch{:<2} program   {:>3}", channel + 1, program)
        }
        Event::PitchBend { channel, value } => {
            format!("ch{:<2} bend      {:+}", channel + 1, *value as i32 - 0x2000)
        }
        Event::SysEx(data) => format!("sysex ({} bytes)", data.len()),
        other => format!("{:?}", other),
    }
}
