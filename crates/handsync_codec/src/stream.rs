//! Framed reads and writes over a byte stream.

use crate::control::{ControlKind, CONTROL_LEN};
use crate::cursor::{copy_owned, zeroed};
use crate::error::{CodecError, TransportError, WireResult};
use crate::frame::{Frame, TypeTag, CHECKSUM_LEN, HEADER_LEN, PREFIX_LEN, TAG_LEN};
use std::io::{ErrorKind, Read, Write};

/// What arrived next on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// One of the three control frames.
    Control(ControlKind),
    /// A general message, content not yet decoded.
    Message(Frame),
}

impl Incoming {
    /// Short description for logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Control(kind) => kind.to_string(),
            Self::Message(frame) => frame.tag().to_string(),
        }
    }
}

/// Fills `buf` completely, tolerating short reads.
///
/// `consumed` is how many bytes of the current frame were read before this
/// call; it decides whether end-of-stream is a clean close or a truncation.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], consumed: usize) -> Result<(), TransportError> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => {
                return Err(if consumed + got == 0 {
                    TransportError::CleanClose
                } else {
                    TransportError::MidMessageClose {
                        consumed: consumed + got,
                        expected: consumed + buf.len(),
                    }
                });
            }
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransportError::io("recv", e)),
        }
    }
    Ok(())
}

/// Reads the next control frame or general message.
///
/// Exactly seven bytes are read first. If they form a control frame nothing
/// further is consumed. Otherwise they are the start of a general header: the
/// rest of the 15-byte prefix is read, then `body_size + 2` bytes of tag,
/// content and checksum.
///
/// # Errors
///
/// - [`TransportError::CleanClose`] if the peer closed before the first byte.
/// - [`TransportError::MidMessageClose`] if it closed part way through.
/// - [`CodecError::BodyTooShort`] if `body_size` cannot hold a type tag.
pub fn read_incoming<R: Read>(reader: &mut R) -> WireResult<Incoming> {
    let mut prefix = [0u8; PREFIX_LEN];
    fill(reader, &mut prefix[..CONTROL_LEN], 0)?;

    let mut head = [0u8; CONTROL_LEN];
    head.copy_from_slice(&prefix[..CONTROL_LEN]);
    if let Some(kind) = ControlKind::recognize(&head) {
        return Ok(Incoming::Control(kind));
    }

    fill(reader, &mut prefix[CONTROL_LEN..], CONTROL_LEN)?;
    let body_size = u16::from_le_bytes([prefix[HEADER_LEN], prefix[HEADER_LEN + 1]]);
    if usize::from(body_size) < TAG_LEN {
        return Err(CodecError::BodyTooShort(body_size).into());
    }

    let rest_len = usize::from(body_size) + CHECKSUM_LEN;
    let mut rest = zeroed(rest_len, "message body")?;
    fill(reader, &mut rest, PREFIX_LEN)?;

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&prefix[..HEADER_LEN]);
    let tag = TypeTag::new([rest[0], rest[1], rest[2]]);
    let content = copy_owned(&rest[TAG_LEN..rest_len - CHECKSUM_LEN], "message content")?;
    let checksum = u16::from_le_bytes([rest[rest_len - 2], rest[rest_len - 1]]);

    Ok(Incoming::Message(Frame::received(
        header, tag, content, checksum,
    )))
}

/// Writes a complete frame and flushes.
///
/// # Errors
///
/// Returns a codec error if the frame cannot be serialized, or a transport
/// error if the write fails.
pub fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> WireResult<()> {
    let bytes = frame.to_bytes()?;
    writer
        .write_all(&bytes)
        .map_err(|e| TransportError::io("send", e))?;
    writer.flush().map_err(|e| TransportError::io("send", e))?;
    Ok(())
}

/// Writes a control frame and flushes.
///
/// # Errors
///
/// Returns a transport error if the write fails.
pub fn write_control<W: Write>(writer: &mut W, kind: ControlKind) -> Result<(), TransportError> {
    writer
        .write_all(&kind.frame())
        .map_err(|e| TransportError::io("send", e))?;
    writer.flush().map_err(|e| TransportError::io("send", e))
}
