//! Error types for the codec crate.

use crate::frame::TypeTag;
use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for framed stream operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while encoding or decoding frame content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload ended before a field could be read.
    #[error("unexpected end of payload: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        /// Bytes the field required.
        needed: usize,
        /// Bytes left in the payload.
        available: usize,
    },

    /// The type tag is not part of the message registry.
    #[error("unknown message type: {tag}")]
    UnknownType {
        /// The offending tag.
        tag: TypeTag,
    },

    /// A polymorphic payload carried an unrecognized discriminant.
    #[error("unknown {tag} variant: {discriminant:#04x}")]
    UnknownVariant {
        /// Tag of the polymorphic message.
        tag: TypeTag,
        /// The discriminant byte that was read.
        discriminant: u8,
    },

    /// An owned buffer could not be allocated.
    #[error("allocation of {len} bytes for {what} failed")]
    AllocationFailed {
        /// What the buffer was for.
        what: &'static str,
        /// Requested size in bytes.
        len: usize,
    },

    /// The frame content was filled a second time.
    #[error("frame content already encoded")]
    AlreadyEncoded,

    /// The body size on the wire cannot even hold the type tag.
    #[error("body size {0} is smaller than the type tag")]
    BodyTooShort(u16),

    /// A variable-length field does not fit its length prefix.
    #[error("{what} too long for the wire: {len} bytes (max {max})")]
    FieldTooLong {
        /// The field being written.
        what: &'static str,
        /// Actual length.
        len: usize,
        /// Largest length the prefix can express.
        max: usize,
    },

    /// A fixed-layout payload was followed by unread bytes.
    #[error("{remaining} trailing bytes after {tag} payload")]
    TrailingBytes {
        /// Tag of the decoded message.
        tag: TypeTag,
        /// Number of unread bytes.
        remaining: usize,
    },

    /// A device clock value was not 14 ASCII digits.
    #[error("invalid device time")]
    InvalidTime,
}

/// Errors raised by the socket layer underneath the codec.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Binding the desktop listener failed.
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Dialing the peer failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialed.
        addr: String,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Accepting the peer's connection failed.
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    /// A send or receive failed.
    #[error("I/O error during {op}: {source}")]
    Io {
        /// The operation that failed.
        op: &'static str,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The peer shut down between messages.
    #[error("peer closed the connection")]
    CleanClose,

    /// The peer shut down part way through a frame.
    #[error("peer closed the connection after {consumed} of {expected} bytes")]
    MidMessageClose {
        /// Bytes of the frame received before the close.
        consumed: usize,
        /// Bytes the current read needed.
        expected: usize,
    },
}

impl TransportError {
    /// Wraps an I/O error from the given operation.
    pub fn io(op: &'static str, source: io::Error) -> Self {
        Self::Io { op, source }
    }

    /// Returns true if the peer went away, cleanly or not.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, Self::CleanClose | Self::MidMessageClose { .. })
    }
}

/// Failure while reading or writing a frame on a stream.
#[derive(Error, Debug)]
pub enum WireError {
    /// The stream itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The bytes could not be framed or unframed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
