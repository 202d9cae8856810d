//! Control frames.
//!
//! Exchanges are bracketed by three fixed 7-byte frames. They share a five
//! byte zero prefix and the `0x96` marker and differ only in the final byte.

use std::fmt;

/// Length of a control frame on the wire.
pub const CONTROL_LEN: usize = 7;

/// Prefix shared by every control frame (and by general headers).
pub const CONTROL_PREFIX: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x96];

/// The three control frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// The peer accepted the last message.
    Acknowledge,
    /// The peer is ready for the next message.
    Request,
    /// The peer refused the exchange.
    Abort,
}

impl ControlKind {
    /// Final byte distinguishing this kind.
    #[must_use]
    pub const fn marker(self) -> u8 {
        match self {
            Self::Acknowledge => 0x06,
            Self::Request => 0x05,
            Self::Abort => 0x18,
        }
    }

    /// The full 7-byte frame.
    #[must_use]
    pub const fn frame(self) -> [u8; CONTROL_LEN] {
        let p = CONTROL_PREFIX;
        [p[0], p[1], p[2], p[3], p[4], p[5], self.marker()]
    }

    /// Classifies the first seven bytes read from a stream.
    ///
    /// Returns `None` when the bytes are the start of a general message.
    pub fn recognize(bytes: &[u8; CONTROL_LEN]) -> Option<Self> {
        if bytes[..CONTROL_PREFIX.len()] != CONTROL_PREFIX {
            return None;
        }
        match bytes[CONTROL_LEN - 1] {
            0x06 => Some(Self::Acknowledge),
            0x05 => Some(Self::Request),
            0x18 => Some(Self::Abort),
            _ => None,
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Acknowledge => "ACK",
            Self::Request => "REQ",
            Self::Abort => "ABORT",
        };
        f.write_str(name)
    }
}
