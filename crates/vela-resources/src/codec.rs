//! Binary encoding and decoding primitives for the index format.
//!
//! All integers are little-endian. Strings and byte buffers are
//! length-prefixed with a `u32`.

use thiserror::Error;

/// Errors that can occur while decoding index bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of data
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),
}

/// Buffer writer for the index format.
pub struct ResourceWriter {
    pub(crate) buffer: Vec<u8>,
}

impl ResourceWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Current offset (length of encoded data).
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the writer and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit raw bytes with no length prefix.
    pub fn emit_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a `u32` length prefix followed by the bytes.
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.emit_u32(bytes.len() as u32);
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a length-prefixed UTF-8 string.
    pub fn emit_str(&mut self, s: &str) {
        self.emit_bytes(s.as_bytes());
    }

    /// Overwrite a previously emitted `u32` at the given offset.
    ///
    /// Used to patch the checksum slot after the payload is written.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for ResourceWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor reader over index bytes.
pub struct ResourceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ResourceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read offset.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The slice from the current offset to the end of the data.
    pub fn tail(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEnd(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read exactly `len` bytes, advancing the cursor.
    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEnd(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a `u32` length prefix followed by that many bytes.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u32()? as usize;
        self.read_exact(len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_roundtrip() {
        let mut writer = ResourceWriter::new();
        writer.emit_u8(0xAB);
        writer.emit_u32(0xDEAD_BEEF);
        let bytes = writer.into_bytes();

        let mut reader = ResourceReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 0xAB);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut writer = ResourceWriter::new();
        writer.emit_str("foo.bar");
        writer.emit_bytes(b"payload");
        let bytes = writer.into_bytes();

        let mut reader = ResourceReader::new(&bytes);
        assert_eq!(reader.read_string().unwrap(), "foo.bar");
        assert_eq!(reader.read_bytes().unwrap(), b"payload");
    }

    #[test]
    fn test_unexpected_end() {
        let mut reader = ResourceReader::new(&[0x01, 0x02]);
        let err = reader.read_u32().unwrap_err();
        match err {
            DecodeError::UnexpectedEnd(offset) => assert_eq!(offset, 0),
            other => panic!("expected UnexpectedEnd, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_length_prefix() {
        // Length prefix claims 100 bytes, only 2 present.
        let mut writer = ResourceWriter::new();
        writer.emit_u32(100);
        writer.emit_raw(&[0x01, 0x02]);
        let bytes = writer.into_bytes();

        let mut reader = ResourceReader::new(&bytes);
        assert!(matches!(
            reader.read_bytes(),
            Err(DecodeError::UnexpectedEnd(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_reports_offset() {
        let mut writer = ResourceWriter::new();
        writer.emit_u8(7);
        writer.emit_bytes(&[0xFF, 0xFE]);
        let bytes = writer.into_bytes();

        let mut reader = ResourceReader::new(&bytes);
        reader.read_u8().unwrap();
        match reader.read_string() {
            Err(DecodeError::InvalidUtf8(offset)) => assert_eq!(offset, 1),
            other => panic!("expected InvalidUtf8, got {other:?}"),
        }
    }

    #[test]
    fn test_patch_u32() {
        let mut writer = ResourceWriter::new();
        let slot = writer.offset();
        writer.emit_u32(0);
        writer.emit_str("rest");
        writer.patch_u32(slot, 42);

        let bytes = writer.into_bytes();
        let mut reader = ResourceReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 42);
    }
}
