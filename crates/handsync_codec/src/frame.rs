//! General message framing.
//!
//! Wire layout:
//!
//! ```text
//! header(13) | body_size(2, LE) | type_tag(3) | content | checksum(2, LE)
//! ```
//!
//! `body_size` counts the type tag plus the content. The checksum is the
//! wrapping 16-bit sum of the tag bytes followed by the content bytes.

use crate::cursor::{copy_owned, ByteReader};
use crate::error::{CodecError, CodecResult};
use std::fmt;

/// Length of the fixed header.
pub const HEADER_LEN: usize = 13;

/// Length of the type tag.
pub const TAG_LEN: usize = 3;

/// Length of the trailing checksum.
pub const CHECKSUM_LEN: usize = 2;

/// Header plus the body size field.
pub const PREFIX_LEN: usize = HEADER_LEN + 2;

/// Largest content that `body_size` can describe.
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize - TAG_LEN;

/// Header template for device-originated messages.
pub const DEVICE_HEADER: [u8; HEADER_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x96, 0x01, 0x01, 0x0c, 0x00, 0x00, 0x00, 0x00,
];

/// Header template for desktop-originated messages.
///
/// Bytes `9..11` are replaced with the content length.
pub const DESKTOP_HEADER: [u8; HEADER_LEN] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x96, 0x01, 0x01, 0x0b, 0x00, 0x00, 0xff, 0xff,
];

const DESKTOP_LENGTH_OFFSET: usize = 9;
const ORIGIN_OFFSET: usize = 8;

/// Which side of the link produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Sent by the handheld.
    Device,
    /// Sent by the desktop client.
    Desktop,
}

impl Origin {
    /// The header template for this origin.
    #[must_use]
    pub const fn header_template(self) -> [u8; HEADER_LEN] {
        match self {
            Self::Device => DEVICE_HEADER,
            Self::Desktop => DESKTOP_HEADER,
        }
    }

    fn from_header(header: &[u8; HEADER_LEN]) -> Self {
        if header[ORIGIN_OFFSET] == DESKTOP_HEADER[ORIGIN_OFFSET] {
            Self::Desktop
        } else {
            Self::Device
        }
    }
}

/// A 3-byte ASCII message type tag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag([u8; TAG_LEN]);

impl TypeTag {
    /// Creates a tag from its three bytes.
    #[must_use]
    pub const fn new(bytes: [u8; TAG_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw tag bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({self})")
    }
}

/// Computes the frame checksum over the tag and content.
#[must_use]
pub fn checksum(tag: &TypeTag, content: &[u8]) -> u16 {
    tag.as_bytes()
        .iter()
        .chain(content)
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// A general message with its framing fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    header: [u8; HEADER_LEN],
    origin: Origin,
    tag: TypeTag,
    content: Option<Vec<u8>>,
    checksum: u16,
}

impl Frame {
    /// Creates an unfilled frame for an outgoing message.
    pub fn new(tag: TypeTag, origin: Origin) -> Self {
        Self {
            header: origin.header_template(),
            origin,
            tag,
            content: None,
            checksum: 0,
        }
    }

    /// Builds a frame from fields read off the wire.
    ///
    /// The checksum is stored as received; it is not checked here.
    pub fn received(header: [u8; HEADER_LEN], tag: TypeTag, content: Vec<u8>, checksum: u16) -> Self {
        Self {
            origin: Origin::from_header(&header),
            header,
            tag,
            content: Some(content),
            checksum,
        }
    }

    /// Sets the content and derives the header length field and checksum.
    ///
    /// # Errors
    ///
    /// - [`CodecError::AlreadyEncoded`] if content was already set.
    /// - [`CodecError::FieldTooLong`] if the content exceeds [`MAX_CONTENT_LEN`].
    pub fn fill(&mut self, content: Vec<u8>) -> CodecResult<()> {
        if self.content.is_some() {
            return Err(CodecError::AlreadyEncoded);
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(CodecError::FieldTooLong {
                what: "message content",
                len: content.len(),
                max: MAX_CONTENT_LEN,
            });
        }
        if self.origin == Origin::Desktop {
            // Checked against MAX_CONTENT_LEN above.
            let len = content.len() as u16;
            self.header[DESKTOP_LENGTH_OFFSET..DESKTOP_LENGTH_OFFSET + 2]
                .copy_from_slice(&len.to_le_bytes());
        }
        self.checksum = checksum(&self.tag, &content);
        self.content = Some(content);
        Ok(())
    }

    /// Returns true once content has been set.
    pub fn is_filled(&self) -> bool {
        self.content.is_some()
    }

    /// The 13-byte header.
    pub fn header(&self) -> &[u8; HEADER_LEN] {
        &self.header
    }

    /// Which side produced this frame.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// The type tag.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// The raw content, empty if not yet filled.
    pub fn content(&self) -> &[u8] {
        self.content.as_deref().unwrap_or(&[])
    }

    /// Content length only.
    pub fn cont_size(&self) -> usize {
        self.content().len()
    }

    /// Tag length plus content length.
    #[allow(clippy::cast_possible_truncation)]
    pub fn body_size(&self) -> u16 {
        // Content length is bounded by MAX_CONTENT_LEN in fill() and by the
        // u16 wire field on receipt.
        (TAG_LEN + self.cont_size()) as u16
    }

    /// The checksum carried by (or computed for) this frame.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Recomputes the checksum from the tag and content.
    pub fn computed_checksum(&self) -> u16 {
        checksum(&self.tag, self.content())
    }

    /// Returns true if the carried checksum matches the content.
    pub fn checksum_matches(&self) -> bool {
        self.checksum == self.computed_checksum()
    }

    /// Total bytes this frame occupies on the wire.
    pub fn wire_len(&self) -> usize {
        PREFIX_LEN + TAG_LEN + self.cont_size() + CHECKSUM_LEN
    }

    /// Serializes the frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::AllocationFailed`] if the output buffer cannot be
    /// reserved.
    pub fn to_bytes(&self) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.wire_len())
            .map_err(|_| CodecError::AllocationFailed {
                what: "frame",
                len: self.wire_len(),
            })?;
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.body_size().to_le_bytes());
        out.extend_from_slice(self.tag.as_bytes());
        out.extend_from_slice(self.content());
        out.extend_from_slice(&self.checksum.to_le_bytes());
        Ok(out)
    }

    /// Splits a complete serialized frame back into its fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is shorter than its declared body.
    pub fn parse(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let header = reader.read_array::<HEADER_LEN>()?;
        let body_size = reader.read_u16()?;
        if usize::from(body_size) < TAG_LEN {
            return Err(CodecError::BodyTooShort(body_size));
        }
        let tag = TypeTag::new(reader.read_array::<TAG_LEN>()?);
        let content = reader.read_slice(usize::from(body_size) - TAG_LEN)?;
        let content = copy_owned(content, "message content")?;
        let checksum = reader.read_u16()?;
        Ok(Self::received(header, tag, content, checksum))
    }
}
