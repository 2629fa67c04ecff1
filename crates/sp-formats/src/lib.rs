//! Format parsers for styleplayer.
//!
//! Reads standard MIDI files and the style family (MIDI chunks followed by
//! vendor chunks) into the IR, and writes a pattern back out as a
//! single-track MIDI file.

mod decoder;
mod midi_export;
mod reader;
mod style_format;

pub use decoder::{EventDecoder, TrackEvent};
pub use midi_export::{export_midi, write_midi, EXPORT_INFO_TEXT};
pub use reader::ChunkReader;
pub use style_format::{load_style, load_style_with, ParseOptions};

use thiserror::Error;

/// Error type for format parsing.
///
/// Carries the cursor position at failure and the start of the last chunk
/// or event that was being read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} (at byte {position}, item started at {last_position})")]
pub struct FormatError {
    pub position: usize,
    pub last_position: usize,
    pub kind: FormatErrorKind,
}

/// What went wrong while parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// First chunk is not MThd
    #[error("file does not start with an MThd chunk")]
    MissingHeader,
    /// MThd length other than 6
    #[error("MThd chunk declares length {0}, expected 6")]
    HeaderLength(u32),
    /// SMPTE or zero time division
    #[error("unsupported time division 0x{0:04X}")]
    InvalidResolution(u16),
    /// Declared chunk length disagrees with what the chunk contained
    #[error("{tag} chunk declares {declared} bytes but {consumed} were consumed")]
    ChunkLength {
        tag: String,
        declared: u32,
        consumed: usize,
    },
    /// Fixed-width read of an unsupported size
    #[error("unsupported read width {0}")]
    UnsupportedWidth(u8),
    /// Variable-length quantity longer than four bytes
    #[error("variable-length quantity exceeds four bytes")]
    InvalidVarLen,
    /// Data byte with no running status to apply it to
    #[error("data byte 0x{0:02X} without running status")]
    MissingRunningStatus(u8),
    /// Unexpected end of file
    #[error("unexpected end of data")]
    UnexpectedEof,
}

/// Error type for MIDI export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The pattern has no events to write
    #[error("nothing to export: pattern has no events")]
    Empty,
    /// Gap between two events does not fit a variable-length quantity
    #[error("delta of {delta} ticks before tick {tick} exceeds the 28-bit limit")]
    DeltaTooLarge { tick: u64, delta: u64 },
    /// Writing the output failed
    #[error("export write failed: {0}")]
    Io(#[from] std::io::Error),
}
