//! Random-access byte source and little-endian primitive cursor
//!
//! This module intentionally knows nothing about SquashFS structure. It is the
//! free-standing replacement for the inherited "Mixin" helper that the format's
//! reference implementation uses: a pure function set over a byte buffer plus a
//! small trait abstracting over "somewhere I can read bytes from at an offset".

use crate::error::SquashfsError;

/// A random-access source of bytes, typically a memory-mapped file.
///
/// Implementations must support concurrent reads from multiple threads; no
/// interior mutation of image contents is ever performed through this trait.
pub trait ByteSource: Send + Sync {
    /// Total length of the backing image, in bytes.
    fn len(&self) -> u64;

    /// Read `buf.len()` bytes starting at `offset`.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SquashfsError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: AsRef<[u8]> + ?Sized + Send + Sync> ByteSource for T {
    fn len(&self) -> u64 {
        self.as_ref().len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), SquashfsError> {
        let data = self.as_ref();
        let start = usize::try_from(offset).map_err(|_| SquashfsError::CorruptImage("offset overflows usize"))?;
        let end = start
            .checked_add(buf.len())
            .ok_or(SquashfsError::CorruptImage("read past end of image"))?;
        let slice = data
            .get(start..end)
            .ok_or(SquashfsError::CorruptImage("read past end of image"))?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

/// Cursor over an already-materialised byte buffer (a decompressed metadata
/// table, or a single metadata block's payload), decoding little-endian
/// primitives and advancing as it goes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], SquashfsError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(SquashfsError::CorruptImage("cursor offset overflow"))?;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or(SquashfsError::CorruptImage("truncated read"))?;
        self.pos = end;
        Ok(slice)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, SquashfsError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_i16(&mut self) -> Result<i16, SquashfsError> {
        Ok(self.read_u16()? as i16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, SquashfsError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, SquashfsError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], SquashfsError> {
        self.take(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip() {
        let mut buf = vec![];
        buf.extend_from_slice(&1234u16.to_le_bytes());
        buf.extend_from_slice(&(-7i16).to_le_bytes());
        buf.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        buf.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        buf.extend_from_slice(b"hi");

        let mut c = Cursor::new(&buf);
        assert_eq!(c.read_u16().unwrap(), 1234);
        assert_eq!(c.read_i16().unwrap(), -7);
        assert_eq!(c.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(c.read_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(c.read_bytes(2).unwrap(), b"hi");
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn truncated_read_is_corrupt() {
        let buf = [0u8; 1];
        let mut c = Cursor::new(&buf);
        assert!(matches!(
            c.read_u16(),
            Err(SquashfsError::CorruptImage(_))
        ));
    }

    #[test]
    fn byte_source_rejects_out_of_range_read() {
        let data: &[u8] = b"hello world";
        let mut buf = [0u8; 4];
        assert!(ByteSource::read_at(&data, 100, &mut buf).is_err());
        ByteSource::read_at(&data, 6, &mut buf).unwrap();
        assert_eq!(&buf, b"worl");
    }
}
