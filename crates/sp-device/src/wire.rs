//! Live (wire) encoding of outgoing events.

use sp_ir::Event;

/// Append the bytes to put on the wire for `event`.
///
/// Only channel messages and system exclusive go out; meta-events exist in
/// files only. Returns false when nothing was written.
pub fn wire_bytes(event: &Event, out: &mut Vec<u8>) -> bool {
    match event {
        // Stored payload already carries its terminating 0xF7
        Event::SysEx(data) => {
            out.push(0xF0);
            out.extend_from_slice(data);
            true
        }
        _ if event.channel().is_some() => event.encode(out),
        _ => false,
    }
}
