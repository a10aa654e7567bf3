//! In-memory staging buffer for a single packet body.

use bytes::{Bytes, BytesMut};

use crate::common::error::ProtocolError;

/// A growable byte buffer with a read cursor.
///
/// Writes always append at the end; reads consume from the cursor. A buffer
/// holds exactly one packet body and is dropped after dispatch.
#[derive(Debug, Default, Clone)]
pub struct PacketBuffer {
    bytes: BytesMut,
    cursor: usize,
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Append raw bytes to the end of the buffer.
    pub fn send(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Read exactly `length` bytes from the cursor.
    pub fn read(&mut self, length: usize) -> Result<&[u8], ProtocolError> {
        let remaining = self.remaining();
        if length > remaining {
            return Err(ProtocolError::UnexpectedEof {
                needed: length,
                remaining,
            });
        }
        let start = self.cursor;
        self.cursor += length;
        Ok(&self.bytes[start..self.cursor])
    }

    /// Read everything between the cursor and the end of the buffer.
    pub fn read_remaining(&mut self) -> Bytes {
        let data = Bytes::copy_from_slice(&self.bytes[self.cursor..]);
        self.cursor = self.bytes.len();
        data
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read(1)?[0])
    }

    /// Read a fixed-size big-endian array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    /// True once every written byte has been read.
    pub fn is_eof(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    /// Discard all contents.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
    }

    /// Every byte written so far, regardless of the cursor.
    pub fn get_writable(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn freeze(self) -> Bytes {
        self.bytes.freeze()
    }
}

impl From<Bytes> for PacketBuffer {
    fn from(bytes: Bytes) -> Self {
        Self {
            bytes: BytesMut::from(&bytes[..]),
            cursor: 0,
        }
    }
}

impl From<&[u8]> for PacketBuffer {
    fn from(bytes: &[u8]) -> Self {
        Self {
            bytes: BytesMut::from(bytes),
            cursor: 0,
        }
    }
}
