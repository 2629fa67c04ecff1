//! Hardware/virtual MIDI output through midir.

use midir::{MidiOutput, MidiOutputConnection};
use sp_engine::DeviceSink;
use sp_ir::Event;

use crate::wire::wire_bytes;
use crate::DeviceError;

const CLIENT_NAME: &str = "styleplayer";
const LOG_TARGET: &str = "sp::device";

/// Names of the available output ports, in index order.
pub fn output_ports() -> Result<Vec<String>, DeviceError> {
    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))?;
    let names = midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(idx, port)| {
            midi_out
                .port_name(port)
                .unwrap_or_else(|_| format!("MIDI Output {}", idx))
        })
        .collect();
    Ok(names)
}

/// An open MIDI output port.
pub struct MidiPortOutput {
    connection: MidiOutputConnection,
    name: String,
    buf: Vec<u8>,
    failures: usize,
}

impl MidiPortOutput {
    /// Connect to the output port at `index` (see [`output_ports`]).
    pub fn connect(index: usize) -> Result<Self, DeviceError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))?;
        let ports = midi_out.ports();
        let port = ports.get(index).ok_or(DeviceError::PortIndex {
            index,
            count: ports.len(),
        })?;
        let name = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("MIDI Output {}", index));

        let connection = midi_out
            .connect(port, CLIENT_NAME)
            .map_err(|e| DeviceError::Connect(e.to_string()))?;
        log::info!(target: LOG_TARGET, "connected to MIDI output: {}", name);

        Ok(Self {
            connection,
            name,
            buf: Vec::with_capacity(16),
            failures: 0,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.name
    }

    /// Number of messages the backend refused.
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Close the port.
    pub fn close(self) {
        log::info!(target: LOG_TARGET, "disconnected from MIDI output: {}", self.name);
        self.connection.close();
    }
}

impl DeviceSink for MidiPortOutput {
    fn send(&mut self, event: &Event) {
        self.buf.clear();
        if !wire_bytes(event, &mut self.buf) {
            return;
        }
        if let Err(e) = self.connection.send(&self.buf) {
            // Warn once per connection
            if self.failures == 0 {
                log::warn!(target: LOG_TARGET, "MIDI send failed on {}: {}", self.name, e);
            }
            self.failures += 1;
        }
    }
}
