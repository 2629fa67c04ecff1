//! Big-endian cursor over a chunked byte buffer.

use crate::{FormatError, FormatErrorKind};

/// Cursor over a byte slice.
///
/// Besides the read position it remembers where the current item (chunk or
/// event) started, so failures can point at both.
pub struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    last_pos: usize,
}

impl<'a> ChunkReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, last_pos: 0 }
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Start of the item most recently marked.
    pub fn last_position(&self) -> usize {
        self.last_pos
    }

    /// Remember the current position as the start of a new item.
    pub fn mark(&mut self) {
        self.last_pos = self.pos;
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Build an error located at the current position.
    pub fn error(&self, kind: FormatErrorKind) -> FormatError {
        FormatError {
            position: self.pos,
            last_position: self.last_pos,
            kind,
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        let Some(&v) = self.data.get(self.pos) else {
            return Err(self.error(FormatErrorKind::UnexpectedEof));
        };
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(self.error(FormatErrorKind::UnexpectedEof));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), FormatError> {
        self.read_bytes(n).map(|_| ())
    }

    /// Read an unsigned big-endian integer of 1 to 4 bytes.
    pub fn read_fixed(&mut self, width: u8) -> Result<u32, FormatError> {
        if !(1..=4).contains(&width) {
            return Err(self.error(FormatErrorKind::UnsupportedWidth(width)));
        }
        let bytes = self.read_bytes(width as usize)?;
        Ok(be_value(bytes))
    }

    /// Read a variable-length quantity: 7 bits per byte, most significant
    /// group first, high bit set on every byte but the last.
    pub fn read_var_len(&mut self) -> Result<u32, FormatError> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = self.read_u8()?;
            value = (value << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.error(FormatErrorKind::InvalidVarLen))
    }

    /// Read a four-byte chunk tag. `None` when fewer than four bytes remain.
    pub fn read_tag(&mut self) -> Option<[u8; 4]> {
        let bytes = self.read_bytes(4).ok()?;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(bytes);
        Some(tag)
    }
}

/// Assemble a big-endian unsigned value, most significant byte first.
pub(crate) fn be_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Printable form of a chunk tag.
pub(crate) fn tag_name(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}
