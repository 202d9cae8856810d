//! Little-endian byte cursor.
//!
//! Every multi-byte scalar on the wire is little-endian no matter the host,
//! so there is exactly one read path and one write path per width. Reads are
//! bounds-checked and fail with [`CodecError::UnexpectedEof`] instead of
//! panicking; owned copies use fallible allocation.

use crate::error::{CodecError, CodecResult};
use crate::frame::TypeTag;
use bytes::{Buf, BufMut};

/// Largest length a u16 prefix can describe.
pub const MAX_BLOB_LEN: usize = u16::MAX as usize;

/// Copies `src` into a freshly allocated vector.
///
/// # Errors
///
/// Returns [`CodecError::AllocationFailed`] if the buffer cannot be reserved.
pub fn copy_owned(src: &[u8], what: &'static str) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(src.len())
        .map_err(|_| CodecError::AllocationFailed {
            what,
            len: src.len(),
        })?;
    out.extend_from_slice(src);
    Ok(out)
}

/// Allocates a zero-filled buffer of `len` bytes.
///
/// # Errors
///
/// Returns [`CodecError::AllocationFailed`] if the buffer cannot be reserved.
pub fn zeroed(len: usize, what: &'static str) -> CodecResult<Vec<u8>> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| CodecError::AllocationFailed { what, len })?;
    out.resize(len, 0);
    Ok(out)
}

/// Reads little-endian fields from a borrowed payload.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            buf: data,
            total: data.len(),
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.total - self.buf.len()
    }

    /// Returns true once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    #[inline]
    fn ensure(&self, needed: usize) -> CodecResult<()> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        self.ensure(2)?;
        Ok(self.buf.get_u16_le())
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    /// Reads a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Borrows the next `len` bytes.
    pub fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Copies the next `len` bytes into an owned buffer.
    pub fn read_bytes(&mut self, len: usize, what: &'static str) -> CodecResult<Vec<u8>> {
        let slice = self.read_slice(len)?;
        copy_owned(slice, what)
    }

    /// Reads a u16-length-prefixed byte blob.
    pub fn read_blob(&mut self, what: &'static str) -> CodecResult<Vec<u8>> {
        let len = usize::from(self.read_u16()?);
        self.read_bytes(len, what)
    }

    /// Consumes the reader, failing if any bytes were left unread.
    pub fn finish(self, tag: TypeTag) -> CodecResult<()> {
        if self.buf.has_remaining() {
            return Err(CodecError::TrailingBytes {
                tag,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }
}

/// Writes little-endian fields into an owned buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a writer with exactly `capacity` bytes reserved.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::AllocationFailed`] if the buffer cannot be reserved.
    pub fn with_capacity(capacity: usize, what: &'static str) -> CodecResult<Self> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| CodecError::AllocationFailed {
                what,
                len: capacity,
            })?;
        Ok(Self { buf })
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes one byte.
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Writes a little-endian u16.
    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    /// Writes a little-endian u32.
    pub fn put_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Writes raw bytes.
    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Writes a u16 element count.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldTooLong`] if `count` does not fit in a u16.
    pub fn put_count(&mut self, count: usize, what: &'static str) -> CodecResult<()> {
        let count = u16::try_from(count).map_err(|_| CodecError::FieldTooLong {
            what,
            len: count,
            max: MAX_BLOB_LEN,
        })?;
        self.put_u16(count);
        Ok(())
    }

    /// Writes a u16-length-prefixed byte blob.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldTooLong`] if `bytes` exceeds [`MAX_BLOB_LEN`].
    pub fn put_blob(&mut self, bytes: &[u8], what: &'static str) -> CodecResult<()> {
        self.put_count(bytes.len(), what)?;
        self.put_slice(bytes);
        Ok(())
    }

    /// Borrows the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer and returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_little_endian() {
        let mut w = ByteWriter::new();
        w.put_u8(0xab);
        w.put_u16(0x0102);
        w.put_u32(0x0304_0506);
        assert_eq!(w.as_bytes(), &[0xab, 0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);

        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u8().unwrap(), 0xab);
        assert_eq!(r.read_u16().unwrap(), 0x0102);
        assert_eq!(r.read_u32().unwrap(), 0x0304_0506);
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_reports_eof() {
        let mut r = ByteReader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(
            r.read_u32(),
            Err(CodecError::UnexpectedEof {
                needed: 4,
                available: 3
            })
        );
        // A failed read consumes nothing.
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn blob_with_zero_length() {
        let mut w = ByteWriter::new();
        w.put_blob(&[], "empty").unwrap();
        assert_eq!(w.as_bytes(), &[0x00, 0x00]);

        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert!(r.read_blob("empty").unwrap().is_empty());
    }

    #[test]
    fn blob_too_long_rejected() {
        let big = vec![0u8; MAX_BLOB_LEN + 1];
        let mut w = ByteWriter::new();
        assert!(matches!(
            w.put_blob(&big, "password"),
            Err(CodecError::FieldTooLong { what: "password", .. })
        ));
    }

    #[test]
    fn trailing_bytes_detected() {
        let mut r = ByteReader::new(&[1, 2]);
        r.read_u8().unwrap();
        assert_eq!(
            r.finish(TypeTag::new(*b"ASS")),
            Err(CodecError::TrailingBytes {
                tag: TypeTag::new(*b"ASS"),
                remaining: 1
            })
        );
    }

    #[test]
    fn read_array_and_slice() {
        let data = *b"TITLrest";
        let mut r = ByteReader::new(&data);
        assert_eq!(&r.read_array::<4>().unwrap(), b"TITL");
        assert_eq!(r.read_slice(4).unwrap(), b"rest");
        assert!(r.read_slice(1).is_err());
    }
}
