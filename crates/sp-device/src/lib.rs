//! Device sinks for styleplayer.
//!
//! Everything here implements [`sp_engine::DeviceSink`]. The hardware
//! output is behind the `midir` feature; the monitor sink needs no device.

#[cfg(feature = "midir")]
mod midi_port;
mod monitor;
mod wire;

#[cfg(feature = "midir")]
pub use midi_port::{output_ports, MidiPortOutput};
pub use monitor::{describe, MonitorOutput};
pub use wire::wire_bytes;

use thiserror::Error;

/// Error type for device operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Failed to open the MIDI backend
    #[error("MIDI backend init failed: {0}")]
    Init(String),
    /// No output port with this index
    #[error("no MIDI output port {index} ({count} available)")]
    PortIndex { index: usize, count: usize },
    /// Port exists but could not be opened
    #[error("MIDI connect failed: {0}")]
    Connect(String),
}
