//! Output side of the scheduler.

use alloc::boxed::Box;
use alloc::vec::Vec;
use sp_ir::Event;

/// Controller number of the "all notes off" channel mode message.
pub const ALL_NOTES_OFF: u8 = 123;

/// Receives scheduled events one at a time.
///
/// Implementations must not block: `send` is called from the tick loop.
pub trait DeviceSink {
    /// Deliver one event to the synthesizer.
    fn send(&mut self, event: &Event);
}

/// Collects events in memory.
impl DeviceSink for Vec<Event> {
    fn send(&mut self, event: &Event) {
        self.push(event.clone());
    }
}

impl<S: DeviceSink + ?Sized> DeviceSink for Box<S> {
    fn send(&mut self, event: &Event) {
        (**self).send(event);
    }
}

/// The "all notes off" message for a 0-based channel.
pub fn all_notes_off(channel: u8) -> Event {
    Event::ControlChange {
        channel,
        controller: ALL_NOTES_OFF,
        value: 0,
    }
}
