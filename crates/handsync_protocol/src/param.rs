//! Parameter formats and raw parameter values.
//!
//! The device describes each category as an ordered list of
//! [`ParamFormatEntry`] values. Item data then arrives as an equally long list
//! of [`ParamValue`] byte strings, matched to the format by position.

use crate::payload::WireRecord;
use handsync_codec::{ByteReader, ByteWriter, CodecResult};
use std::fmt;

/// Wire type of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Single byte boolean.
    Bit,
    /// Unsigned byte.
    Byte,
    /// Unsigned 16-bit word.
    Word,
    /// Unsigned 32-bit value.
    Long,
    /// Seconds since the Unix epoch, as a u32.
    Time,
    /// Opaque bytes.
    ByteArray,
    /// UTF-8 text.
    Utf8,
    /// A type id this client does not know.
    Unknown(u8),
}

impl ParamType {
    /// Wire id of this type.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Bit => 0x01,
            Self::Byte => 0x02,
            Self::Word => 0x03,
            Self::Long => 0x04,
            Self::Time => 0x05,
            Self::ByteArray => 0x06,
            Self::Utf8 => 0x07,
            Self::Unknown(code) => code,
        }
    }

    /// Parses a wire id. Unrecognized ids are kept as [`ParamType::Unknown`].
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::Bit,
            0x02 => Self::Byte,
            0x03 => Self::Word,
            0x04 => Self::Long,
            0x05 => Self::Time,
            0x06 => Self::ByteArray,
            0x07 => Self::Utf8,
            other => Self::Unknown(other),
        }
    }

    /// Exact value width for fixed-size types.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Bit | Self::Byte => Some(1),
            Self::Word => Some(2),
            Self::Long | Self::Time => Some(4),
            Self::ByteArray | Self::Utf8 | Self::Unknown(_) => None,
        }
    }
}

/// A 4-byte ASCII field tag such as `SYID`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldTag([u8; 4]);

impl FieldTag {
    /// Creates a tag from its four bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// The raw tag bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for FieldTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldTag({self})")
    }
}

/// One entry of a category's parameter format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamFormatEntry {
    /// Field tag.
    pub tag: FieldTag,
    /// Value type.
    pub param_type: ParamType,
    /// Human-readable description supplied by the device.
    pub description: Vec<u8>,
}

impl ParamFormatEntry {
    /// Creates an entry with an empty description.
    pub fn new(tag: [u8; 4], param_type: ParamType) -> Self {
        Self {
            tag: FieldTag::new(tag),
            param_type,
            description: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<Vec<u8>>) -> Self {
        self.description = description.into();
        self
    }
}

impl WireRecord for ParamFormatEntry {
    fn encoded_len(&self) -> usize {
        4 + 1 + 2 + self.description.len()
    }

    fn encode(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_slice(self.tag.as_bytes());
        w.put_u8(self.param_type.code());
        w.put_blob(&self.description, "parameter description")
    }

    fn decode(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        let tag = FieldTag::new(r.read_array::<4>()?);
        let param_type = ParamType::from_code(r.read_u8()?);
        let description = r.read_blob("parameter description")?;
        Ok(Self {
            tag,
            param_type,
            description,
        })
    }
}

/// A raw parameter value as carried in item data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamValue {
    /// Value bytes.
    pub data: Vec<u8>,
}

impl ParamValue {
    /// Wraps value bytes.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    /// Value length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length value.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl WireRecord for ParamValue {
    fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }

    fn encode(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_blob(&self.data, "parameter value")
    }

    fn decode(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            data: r.read_blob("parameter value")?,
        })
    }
}
