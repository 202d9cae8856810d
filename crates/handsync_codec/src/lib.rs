//! # handsync codec
//!
//! Byte-level framing for the handheld sync protocol.
//!
//! This crate provides:
//! - A little-endian cursor ([`ByteReader`], [`ByteWriter`])
//! - The three control frames ([`ControlKind`])
//! - General message framing with header templates and checksum ([`Frame`])
//! - Framed reads and writes over any `Read`/`Write` stream
//!
//! ## Wire format
//!
//! ```text
//! control:  00 00 00 00 00 96 <06|05|18>
//! general:  header(13) | body_size(2) | tag(3) | content | checksum(2)
//! ```
//!
//! All scalars are little-endian. The checksum is carried but never enforced
//! on receipt.
//!
//! ## Usage
//!
//! ```
//! use handsync_codec::{read_incoming, write_frame, Frame, Incoming, Origin, TypeTag};
//!
//! let mut frame = Frame::new(TypeTag::new(*b"RSS"), Origin::Desktop);
//! frame.fill(vec![0x06]).unwrap();
//!
//! let mut wire = Vec::new();
//! write_frame(&mut wire, &frame).unwrap();
//!
//! let incoming = read_incoming(&mut wire.as_slice()).unwrap();
//! assert_eq!(incoming, Incoming::Message(frame));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod control;
mod cursor;
mod error;
mod frame;
mod stream;

pub use control::{ControlKind, CONTROL_LEN, CONTROL_PREFIX};
pub use cursor::{copy_owned, zeroed, ByteReader, ByteWriter, MAX_BLOB_LEN};
pub use error::{CodecError, CodecResult, TransportError, WireError, WireResult};
pub use frame::{
    checksum, Frame, Origin, TypeTag, CHECKSUM_LEN, DESKTOP_HEADER, DEVICE_HEADER, HEADER_LEN,
    MAX_CONTENT_LEN, PREFIX_LEN, TAG_LEN,
};
pub use stream::{read_incoming, write_control, write_frame, Incoming};
