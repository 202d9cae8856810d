//! The message registry.
//!
//! Every message type is identified by a 3-byte tag and has a fixed origin.
//! [`REGISTRY`] lists them all; [`Message`] carries the decoded payload and
//! knows how to encode itself into a [`Frame`].

use crate::kind::{ItemKind, SyncStateFlags};
use crate::param::{ParamFormatEntry, ParamValue};
use crate::payload::{
    fixed_list_len, put_fixed_list, put_record_list, read_fixed_list, read_record_list,
    record_list_len, DeviceTime, SyncIdLists, WireRecord,
};
use handsync_codec::{
    ByteReader, ByteWriter, CodecError, CodecResult, Frame, Origin, TypeTag,
};

/// Message type tags.
pub mod tags {
    use handsync_codec::TypeTag;

    /// Desktop announces it is ready.
    pub const READY: TypeTag = TypeTag::new(*b"RAY");
    /// Desktop asks for device information.
    pub const DEVICE_INFO_REQUEST: TypeTag = TypeTag::new(*b"RIG");
    /// Desktop sends the password.
    pub const AUTH_REQUEST: TypeTag = TypeTag::new(*b"RRL");
    /// Desktop asks for the device clock.
    pub const TIME_REQUEST: TypeTag = TypeTag::new(*b"RTG");
    /// Desktop sets the device clock.
    pub const SET_TIME: TypeTag = TypeTag::new(*b"RTS");
    /// Desktop asks for the storage path.
    pub const STORAGE_PATH_REQUEST: TypeTag = TypeTag::new(*b"RMG");
    /// Desktop asks for sync-state flags.
    pub const SYNC_STATE_REQUEST: TypeTag = TypeTag::new(*b"RSS");
    /// Desktop overwrites sync-state flags.
    pub const SET_SYNC_STATE: TypeTag = TypeTag::new(*b"RMS");
    /// Desktop asks for a parameter format.
    pub const PARAM_FORMAT_REQUEST: TypeTag = TypeTag::new(*b"RDI");
    /// Desktop asks for sync-id lists.
    pub const SYNC_IDS_REQUEST: TypeTag = TypeTag::new(*b"RSY");
    /// Desktop asks for one item.
    pub const ITEM_REQUEST: TypeTag = TypeTag::new(*b"RDR");
    /// Desktop deletes items.
    pub const DELETE_ITEMS: TypeTag = TypeTag::new(*b"RDD");
    /// Desktop writes an item.
    pub const ITEM_WRITE: TypeTag = TypeTag::new(*b"RDW");
    /// Desktop finishes a category.
    pub const SYNC_DONE: TypeTag = TypeTag::new(*b"RDS");
    /// Desktop ends the session.
    pub const TERMINATE: TypeTag = TypeTag::new(*b"RQT");

    /// Device completed an exchange with no payload.
    pub const EXCHANGE_COMPLETE: TypeTag = TypeTag::new(*b"AEX");
    /// Device announces it is ready.
    pub const DEVICE_READY: TypeTag = TypeTag::new(*b"AAY");
    /// Device information.
    pub const DEVICE_INFO: TypeTag = TypeTag::new(*b"AIG");
    /// No password needed.
    pub const AUTH_NOT_REQUIRED: TypeTag = TypeTag::new(*b"ANL");
    /// Password refused.
    pub const AUTH_DENIED: TypeTag = TypeTag::new(*b"ANG");
    /// Device clock.
    pub const DEVICE_TIME: TypeTag = TypeTag::new(*b"ATG");
    /// Storage path.
    pub const STORAGE_PATH: TypeTag = TypeTag::new(*b"AMG");
    /// Sync-state flags.
    pub const SYNC_STATE: TypeTag = TypeTag::new(*b"ASS");
    /// Parameter format.
    pub const PARAM_FORMAT: TypeTag = TypeTag::new(*b"ADI");
    /// Sync-id lists.
    pub const SYNC_IDS: TypeTag = TypeTag::new(*b"ASY");
    /// Item parameter values.
    pub const ITEM_DATA: TypeTag = TypeTag::new(*b"ADR");
    /// Item stored, with its sync id.
    pub const ITEM_WRITTEN: TypeTag = TypeTag::new(*b"ADW");
}

/// Static description of one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpec {
    /// Type tag.
    pub tag: TypeTag,
    /// Side that sends it.
    pub origin: Origin,
    /// Short name for logs.
    pub name: &'static str,
}

const fn spec(tag: TypeTag, origin: Origin, name: &'static str) -> MessageSpec {
    MessageSpec { tag, origin, name }
}

/// Every known message type.
pub const REGISTRY: &[MessageSpec] = &[
    spec(tags::READY, Origin::Desktop, "ready"),
    spec(tags::DEVICE_INFO_REQUEST, Origin::Desktop, "device info request"),
    spec(tags::AUTH_REQUEST, Origin::Desktop, "auth request"),
    spec(tags::TIME_REQUEST, Origin::Desktop, "time request"),
    spec(tags::SET_TIME, Origin::Desktop, "set time"),
    spec(tags::STORAGE_PATH_REQUEST, Origin::Desktop, "storage path request"),
    spec(tags::SYNC_STATE_REQUEST, Origin::Desktop, "sync state request"),
    spec(tags::SET_SYNC_STATE, Origin::Desktop, "set sync state"),
    spec(tags::PARAM_FORMAT_REQUEST, Origin::Desktop, "param format request"),
    spec(tags::SYNC_IDS_REQUEST, Origin::Desktop, "sync ids request"),
    spec(tags::ITEM_REQUEST, Origin::Desktop, "item request"),
    spec(tags::DELETE_ITEMS, Origin::Desktop, "delete items"),
    spec(tags::ITEM_WRITE, Origin::Desktop, "item write"),
    spec(tags::SYNC_DONE, Origin::Desktop, "sync done"),
    spec(tags::TERMINATE, Origin::Desktop, "terminate"),
    spec(tags::EXCHANGE_COMPLETE, Origin::Device, "exchange complete"),
    spec(tags::DEVICE_READY, Origin::Device, "device ready"),
    spec(tags::DEVICE_INFO, Origin::Device, "device info"),
    spec(tags::AUTH_NOT_REQUIRED, Origin::Device, "auth not required"),
    spec(tags::AUTH_DENIED, Origin::Device, "auth denied"),
    spec(tags::DEVICE_TIME, Origin::Device, "device time"),
    spec(tags::STORAGE_PATH, Origin::Device, "storage path"),
    spec(tags::SYNC_STATE, Origin::Device, "sync state"),
    spec(tags::PARAM_FORMAT, Origin::Device, "param format"),
    spec(tags::SYNC_IDS, Origin::Device, "sync ids"),
    spec(tags::ITEM_DATA, Origin::Device, "item data"),
    spec(tags::ITEM_WRITTEN, Origin::Device, "item written"),
];

/// Looks up a message type by tag.
pub fn lookup(tag: TypeTag) -> Option<&'static MessageSpec> {
    REGISTRY.iter().find(|spec| spec.tag == tag)
}

/// Identity and capabilities reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Model name bytes.
    pub model: Vec<u8>,
    /// Two-letter language code.
    pub language: [u8; 2],
    /// Non-zero when a password is required.
    pub auth_state: u8,
}

impl DeviceInfo {
    /// Model name, decoded lossily.
    pub fn model_name(&self) -> String {
        String::from_utf8_lossy(&self.model).into_owned()
    }

    /// Language code, decoded lossily.
    pub fn language_code(&self) -> String {
        String::from_utf8_lossy(&self.language).into_owned()
    }

    /// Returns true if the device wants a password.
    pub fn requires_auth(&self) -> bool {
        self.auth_state != 0
    }
}

/// Payload of an item write, polymorphic on its first byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemWrite {
    /// Create a new item; the device assigns the sync id.
    Insert {
        /// Target category.
        kind: ItemKind,
        /// Values in parameter-format order.
        values: Vec<ParamValue>,
    },
    /// Replace an existing item.
    Update {
        /// Target category.
        kind: ItemKind,
        /// Item to replace.
        sync_id: u32,
        /// Values in parameter-format order.
        values: Vec<ParamValue>,
    },
    /// Replace an existing item and set its record flags.
    FlaggedUpdate {
        /// Target category.
        kind: ItemKind,
        /// Item to replace.
        sync_id: u32,
        /// Record flags.
        flags: u16,
        /// Values in parameter-format order.
        values: Vec<ParamValue>,
    },
}

impl ItemWrite {
    const INSERT: u8 = 0x01;
    const UPDATE: u8 = 0x02;
    const FLAGGED_UPDATE: u8 = 0x03;

    /// Discriminant byte on the wire.
    pub fn discriminant(&self) -> u8 {
        match self {
            Self::Insert { .. } => Self::INSERT,
            Self::Update { .. } => Self::UPDATE,
            Self::FlaggedUpdate { .. } => Self::FLAGGED_UPDATE,
        }
    }

    /// Target category.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Insert { kind, .. }
            | Self::Update { kind, .. }
            | Self::FlaggedUpdate { kind, .. } => *kind,
        }
    }

    /// Values being written.
    pub fn values(&self) -> &[ParamValue] {
        match self {
            Self::Insert { values, .. }
            | Self::Update { values, .. }
            | Self::FlaggedUpdate { values, .. } => values,
        }
    }

    fn encoded_len(&self) -> usize {
        let head = match self {
            Self::Insert { .. } => 2,
            Self::Update { .. } => 6,
            Self::FlaggedUpdate { .. } => 8,
        };
        head + record_list_len(self.values())
    }

    fn encode(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_u8(self.discriminant());
        w.put_u8(self.kind().code());
        match self {
            Self::Insert { .. } => {}
            Self::Update { sync_id, .. } => w.put_u32(*sync_id),
            Self::FlaggedUpdate { sync_id, flags, .. } => {
                w.put_u32(*sync_id);
                w.put_u16(*flags);
            }
        }
        put_record_list(w, self.values(), "item values")
    }

    fn decode(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        let discriminant = r.read_u8()?;
        if !(Self::INSERT..=Self::FLAGGED_UPDATE).contains(&discriminant) {
            return Err(CodecError::UnknownVariant {
                tag: tags::ITEM_WRITE,
                discriminant,
            });
        }
        let kind = read_kind(r, tags::ITEM_WRITE)?;
        Ok(match discriminant {
            Self::INSERT => Self::Insert {
                kind,
                values: read_record_list(r, "item values")?,
            },
            Self::UPDATE => Self::Update {
                kind,
                sync_id: r.read_u32()?,
                values: read_record_list(r, "item values")?,
            },
            _ => Self::FlaggedUpdate {
                kind,
                sync_id: r.read_u32()?,
                flags: r.read_u16()?,
                values: read_record_list(r, "item values")?,
            },
        })
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// `RAY`
    Ready,
    /// `RIG`
    DeviceInfoRequest,
    /// `RRL`
    AuthRequest {
        /// Password bytes.
        password: Vec<u8>,
    },
    /// `RTG`
    TimeRequest,
    /// `RTS`
    SetTime {
        /// New device clock.
        time: DeviceTime,
    },
    /// `RMG`
    StoragePathRequest,
    /// `RSS`
    SyncStateRequest {
        /// Category whose state is requested.
        kind: ItemKind,
    },
    /// `RMS`
    SetSyncState {
        /// Flags to store on the device.
        flags: SyncStateFlags,
    },
    /// `RDI`
    ParamFormatRequest {
        /// Category whose format is requested.
        kind: ItemKind,
    },
    /// `RSY`
    SyncIdsRequest {
        /// Category to enumerate.
        kind: ItemKind,
    },
    /// `RDR`
    ItemRequest {
        /// Category of the item.
        kind: ItemKind,
        /// Item to fetch.
        sync_id: u32,
    },
    /// `RDD`
    DeleteItems {
        /// Category of the items.
        kind: ItemKind,
        /// Items to delete.
        ids: Vec<u32>,
    },
    /// `RDW`
    ItemWrite(ItemWrite),
    /// `RDS`
    SyncDone {
        /// Finished category.
        kind: ItemKind,
    },
    /// `RQT`
    Terminate,

    /// `AEX`
    ExchangeComplete,
    /// `AAY`
    DeviceReady,
    /// `AIG`
    DeviceInfo(DeviceInfo),
    /// `ANL`
    AuthNotRequired,
    /// `ANG`
    AuthDenied,
    /// `ATG`
    DeviceTime {
        /// Current device clock.
        time: DeviceTime,
    },
    /// `AMG`
    StoragePath {
        /// Path bytes.
        path: Vec<u8>,
    },
    /// `ASS`
    SyncState {
        /// Current flags.
        flags: SyncStateFlags,
    },
    /// `ADI`
    ParamFormat {
        /// Format entries in value order.
        entries: Vec<ParamFormatEntry>,
    },
    /// `ASY`
    SyncIds(SyncIdLists),
    /// `ADR`
    ItemData {
        /// Values in parameter-format order.
        values: Vec<ParamValue>,
    },
    /// `ADW`
    ItemWritten {
        /// Sync id of the stored item.
        sync_id: u32,
    },
}

fn read_kind(r: &mut ByteReader<'_>, tag: TypeTag) -> CodecResult<ItemKind> {
    let code = r.read_u8()?;
    ItemKind::from_code(code).ok_or(CodecError::UnknownVariant {
        tag,
        discriminant: code,
    })
}

impl Message {
    /// Type tag of this message.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Ready => tags::READY,
            Self::DeviceInfoRequest => tags::DEVICE_INFO_REQUEST,
            Self::AuthRequest { .. } => tags::AUTH_REQUEST,
            Self::TimeRequest => tags::TIME_REQUEST,
            Self::SetTime { .. } => tags::SET_TIME,
            Self::StoragePathRequest => tags::STORAGE_PATH_REQUEST,
            Self::SyncStateRequest { .. } => tags::SYNC_STATE_REQUEST,
            Self::SetSyncState { .. } => tags::SET_SYNC_STATE,
            Self::ParamFormatRequest { .. } => tags::PARAM_FORMAT_REQUEST,
            Self::SyncIdsRequest { .. } => tags::SYNC_IDS_REQUEST,
            Self::ItemRequest { .. } => tags::ITEM_REQUEST,
            Self::DeleteItems { .. } => tags::DELETE_ITEMS,
            Self::ItemWrite(_) => tags::ITEM_WRITE,
            Self::SyncDone { .. } => tags::SYNC_DONE,
            Self::Terminate => tags::TERMINATE,
            Self::ExchangeComplete => tags::EXCHANGE_COMPLETE,
            Self::DeviceReady => tags::DEVICE_READY,
            Self::DeviceInfo(_) => tags::DEVICE_INFO,
            Self::AuthNotRequired => tags::AUTH_NOT_REQUIRED,
            Self::AuthDenied => tags::AUTH_DENIED,
            Self::DeviceTime { .. } => tags::DEVICE_TIME,
            Self::StoragePath { .. } => tags::STORAGE_PATH,
            Self::SyncState { .. } => tags::SYNC_STATE,
            Self::ParamFormat { .. } => tags::PARAM_FORMAT,
            Self::SyncIds(_) => tags::SYNC_IDS,
            Self::ItemData { .. } => tags::ITEM_DATA,
            Self::ItemWritten { .. } => tags::ITEM_WRITTEN,
        }
    }

    /// Side that sends this message.
    pub fn origin(&self) -> Origin {
        match self {
            Self::Ready
            | Self::DeviceInfoRequest
            | Self::AuthRequest { .. }
            | Self::TimeRequest
            | Self::SetTime { .. }
            | Self::StoragePathRequest
            | Self::SyncStateRequest { .. }
            | Self::SetSyncState { .. }
            | Self::ParamFormatRequest { .. }
            | Self::SyncIdsRequest { .. }
            | Self::ItemRequest { .. }
            | Self::DeleteItems { .. }
            | Self::ItemWrite(_)
            | Self::SyncDone { .. }
            | Self::Terminate => Origin::Desktop,
            _ => Origin::Device,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        lookup(self.tag()).map_or("unregistered", |spec| spec.name)
    }

    /// Size of the encoded content in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Ready
            | Self::DeviceInfoRequest
            | Self::TimeRequest
            | Self::StoragePathRequest
            | Self::Terminate
            | Self::ExchangeComplete
            | Self::DeviceReady
            | Self::AuthNotRequired
            | Self::AuthDenied => 0,
            Self::AuthRequest { password } => 2 + password.len(),
            Self::SetTime { .. } | Self::DeviceTime { .. } => DeviceTime::LEN,
            Self::SyncStateRequest { .. }
            | Self::SetSyncState { .. }
            | Self::ParamFormatRequest { .. }
            | Self::SyncIdsRequest { .. }
            | Self::SyncDone { .. }
            | Self::SyncState { .. } => 1,
            Self::ItemRequest { .. } => 5,
            Self::DeleteItems { ids, .. } => 1 + fixed_list_len(ids),
            Self::ItemWrite(write) => write.encoded_len(),
            Self::DeviceInfo(info) => 2 + info.model.len() + 2 + 1,
            Self::StoragePath { path } => 2 + path.len(),
            Self::ParamFormat { entries } => record_list_len(entries),
            Self::SyncIds(lists) => lists.encoded_len(),
            Self::ItemData { values } => record_list_len(values),
            Self::ItemWritten { .. } => 4,
        }
    }

    /// Appends the encoded content.
    pub fn encode(&self, w: &mut ByteWriter) -> CodecResult<()> {
        match self {
            Self::Ready
            | Self::DeviceInfoRequest
            | Self::TimeRequest
            | Self::StoragePathRequest
            | Self::Terminate
            | Self::ExchangeComplete
            | Self::DeviceReady
            | Self::AuthNotRequired
            | Self::AuthDenied => {}
            Self::AuthRequest { password } => w.put_blob(password, "password")?,
            Self::SetTime { time } | Self::DeviceTime { time } => w.put_slice(time.as_bytes()),
            Self::SyncStateRequest { kind }
            | Self::ParamFormatRequest { kind }
            | Self::SyncIdsRequest { kind }
            | Self::SyncDone { kind } => w.put_u8(kind.code()),
            Self::SetSyncState { flags } | Self::SyncState { flags } => w.put_u8(flags.bits()),
            Self::ItemRequest { kind, sync_id } => {
                w.put_u8(kind.code());
                w.put_u32(*sync_id);
            }
            Self::DeleteItems { kind, ids } => {
                w.put_u8(kind.code());
                put_fixed_list(w, ids, "deleted ids")?;
            }
            Self::ItemWrite(write) => write.encode(w)?,
            Self::DeviceInfo(info) => {
                w.put_blob(&info.model, "device model")?;
                w.put_slice(&info.language);
                w.put_u8(info.auth_state);
            }
            Self::StoragePath { path } => w.put_blob(path, "storage path")?,
            Self::ParamFormat { entries } => put_record_list(w, entries, "parameter format")?,
            Self::SyncIds(lists) => lists.encode(w)?,
            Self::ItemData { values } => put_record_list(w, values, "item values")?,
            Self::ItemWritten { sync_id } => w.put_u32(*sync_id),
        }
        Ok(())
    }

    /// Decodes message content for a given tag.
    ///
    /// # Errors
    ///
    /// - [`CodecError::UnknownType`] if the tag is not registered.
    /// - [`CodecError::UnknownVariant`] for an unknown category or item-write
    ///   discriminant.
    /// - [`CodecError::TrailingBytes`] if the content is longer than its
    ///   layout.
    pub fn decode(tag: TypeTag, content: &[u8]) -> CodecResult<Self> {
        let mut r = ByteReader::new(content);
        let message = match tag {
            tags::READY => Self::Ready,
            tags::DEVICE_INFO_REQUEST => Self::DeviceInfoRequest,
            tags::AUTH_REQUEST => Self::AuthRequest {
                password: r.read_blob("password")?,
            },
            tags::TIME_REQUEST => Self::TimeRequest,
            tags::SET_TIME => Self::SetTime {
                time: DeviceTime::from_bytes(r.read_array()?)?,
            },
            tags::STORAGE_PATH_REQUEST => Self::StoragePathRequest,
            tags::SYNC_STATE_REQUEST => Self::SyncStateRequest {
                kind: read_kind(&mut r, tag)?,
            },
            tags::SET_SYNC_STATE => Self::SetSyncState {
                flags: SyncStateFlags::from_bits(r.read_u8()?),
            },
            tags::PARAM_FORMAT_REQUEST => Self::ParamFormatRequest {
                kind: read_kind(&mut r, tag)?,
            },
            tags::SYNC_IDS_REQUEST => Self::SyncIdsRequest {
                kind: read_kind(&mut r, tag)?,
            },
            tags::ITEM_REQUEST => Self::ItemRequest {
                kind: read_kind(&mut r, tag)?,
                sync_id: r.read_u32()?,
            },
            tags::DELETE_ITEMS => Self::DeleteItems {
                kind: read_kind(&mut r, tag)?,
                ids: read_fixed_list(&mut r, "deleted ids")?,
            },
            tags::ITEM_WRITE => Self::ItemWrite(ItemWrite::decode(&mut r)?),
            tags::SYNC_DONE => Self::SyncDone {
                kind: read_kind(&mut r, tag)?,
            },
            tags::TERMINATE => Self::Terminate,
            tags::EXCHANGE_COMPLETE => Self::ExchangeComplete,
            tags::DEVICE_READY => Self::DeviceReady,
            tags::DEVICE_INFO => Self::DeviceInfo(DeviceInfo {
                model: r.read_blob("device model")?,
                language: r.read_array()?,
                auth_state: r.read_u8()?,
            }),
            tags::AUTH_NOT_REQUIRED => Self::AuthNotRequired,
            tags::AUTH_DENIED => Self::AuthDenied,
            tags::DEVICE_TIME => Self::DeviceTime {
                time: DeviceTime::from_bytes(r.read_array()?)?,
            },
            tags::STORAGE_PATH => Self::StoragePath {
                path: r.read_blob("storage path")?,
            },
            tags::SYNC_STATE => Self::SyncState {
                flags: SyncStateFlags::from_bits(r.read_u8()?),
            },
            tags::PARAM_FORMAT => Self::ParamFormat {
                entries: read_record_list(&mut r, "parameter format")?,
            },
            tags::SYNC_IDS => Self::SyncIds(SyncIdLists::decode(&mut r)?),
            tags::ITEM_DATA => Self::ItemData {
                values: read_record_list(&mut r, "item values")?,
            },
            tags::ITEM_WRITTEN => Self::ItemWritten {
                sync_id: r.read_u32()?,
            },
            _ => return Err(CodecError::UnknownType { tag }),
        };
        r.finish(tag)?;
        Ok(message)
    }

    /// Encodes this message into an unfilled frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::AlreadyEncoded`] if the frame already has
    /// content.
    pub fn encode_into(&self, frame: &mut Frame) -> CodecResult<()> {
        if frame.is_filled() {
            return Err(CodecError::AlreadyEncoded);
        }
        let mut w = ByteWriter::with_capacity(self.encoded_len(), "message content")?;
        self.encode(&mut w)?;
        frame.fill(w.into_bytes())
    }

    /// Builds a filled frame for this message.
    pub fn to_frame(&self) -> CodecResult<Frame> {
        let mut frame = Frame::new(self.tag(), self.origin());
        self.encode_into(&mut frame)?;
        Ok(frame)
    }

    /// Decodes a received frame.
    pub fn from_frame(frame: &Frame) -> CodecResult<Self> {
        Self::decode(frame.tag(), frame.content())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ParamType;
    use proptest::prelude::*;

    fn sample_messages() -> Vec<Message> {
        vec![
            Message::Ready,
            Message::DeviceInfoRequest,
            Message::AuthRequest {
                password: b"secret".to_vec(),
            },
            Message::TimeRequest,
            Message::SetTime {
                time: DeviceTime::parse("20240101120000").unwrap(),
            },
            Message::StoragePathRequest,
            Message::SyncStateRequest {
                kind: ItemKind::Todo,
            },
            Message::SetSyncState {
                flags: SyncStateFlags::from_bits(0x03),
            },
            Message::ParamFormatRequest {
                kind: ItemKind::Calendar,
            },
            Message::SyncIdsRequest {
                kind: ItemKind::Address,
            },
            Message::ItemRequest {
                kind: ItemKind::Todo,
                sync_id: 7,
            },
            Message::DeleteItems {
                kind: ItemKind::Todo,
                ids: vec![1, 2, 3],
            },
            Message::ItemWrite(ItemWrite::FlaggedUpdate {
                kind: ItemKind::Calendar,
                sync_id: 9,
                flags: 0x0102,
                values: vec![ParamValue::new(vec![1]), ParamValue::default()],
            }),
            Message::SyncDone {
                kind: ItemKind::Todo,
            },
            Message::Terminate,
            Message::ExchangeComplete,
            Message::DeviceReady,
            Message::DeviceInfo(DeviceInfo {
                model: b"HX-200".to_vec(),
                language: *b"en",
                auth_state: 1,
            }),
            Message::AuthNotRequired,
            Message::AuthDenied,
            Message::DeviceTime {
                time: DeviceTime::parse("19991231235959").unwrap(),
            },
            Message::StoragePath {
                path: b"/flash/pim".to_vec(),
            },
            Message::SyncState {
                flags: SyncStateFlags::from_bits(0x05),
            },
            Message::ParamFormat {
                entries: vec![
                    ParamFormatEntry::new(*b"SYID", ParamType::Long),
                    ParamFormatEntry::new(*b"TITL", ParamType::Utf8).with_description("title"),
                ],
            },
            Message::SyncIds(SyncIdLists::new(vec![1], vec![], vec![4, 5])),
            Message::ItemData {
                values: vec![ParamValue::new(vec![7, 0, 0, 0])],
            },
            Message::ItemWritten { sync_id: 42 },
        ]
    }

    #[test]
    fn registry_covers_every_message() {
        let messages = sample_messages();
        assert_eq!(messages.len(), REGISTRY.len());
        for message in &messages {
            let spec = lookup(message.tag()).expect("registered");
            assert_eq!(spec.origin, message.origin());
        }
    }

    #[test]
    fn registry_tags_are_unique() {
        for (i, a) in REGISTRY.iter().enumerate() {
            for b in &REGISTRY[i + 1..] {
                assert_ne!(a.tag, b.tag);
            }
        }
    }

    #[test]
    fn every_message_survives_a_frame() {
        for message in sample_messages() {
            let frame = message.to_frame().unwrap();
            assert_eq!(frame.cont_size(), message.encoded_len(), "{}", message.name());
            let parsed = Frame::parse(&frame.to_bytes().unwrap()).unwrap();
            assert_eq!(Message::from_frame(&parsed).unwrap(), message);
        }
    }

    #[test]
    fn origins_follow_tag_prefix() {
        for spec in REGISTRY {
            let expected = match spec.tag.as_bytes()[0] {
                b'R' => Origin::Desktop,
                _ => Origin::Device,
            };
            assert_eq!(spec.origin, expected, "{}", spec.name);
        }
    }

    #[test]
    fn item_request_layout() {
        let mut w = ByteWriter::new();
        Message::ItemRequest {
            kind: ItemKind::Todo,
            sync_id: 7,
        }
        .encode(&mut w)
        .unwrap();
        assert_eq!(w.as_bytes(), &[0x06, 0x07, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = Message::decode(TypeTag::new(*b"ZZZ"), &[]).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownType {
                tag: TypeTag::new(*b"ZZZ")
            }
        );
    }

    #[test]
    fn unknown_item_write_discriminant() {
        let err = Message::decode(tags::ITEM_WRITE, &[0x09, 0x06, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownVariant {
                tag: tags::ITEM_WRITE,
                discriminant: 0x09
            }
        );
    }

    #[test]
    fn unknown_kind_code() {
        let err = Message::decode(tags::SYNC_STATE_REQUEST, &[0x02]).unwrap_err();
        assert!(matches!(err, CodecError::UnknownVariant { discriminant: 0x02, .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let err = Message::decode(tags::EXCHANGE_COMPLETE, &[0x00]).unwrap_err();
        assert_eq!(
            err,
            CodecError::TrailingBytes {
                tag: tags::EXCHANGE_COMPLETE,
                remaining: 1
            }
        );
    }

    #[test]
    fn encode_into_filled_frame_fails() {
        let message = Message::SyncDone {
            kind: ItemKind::Todo,
        };
        let mut frame = message.to_frame().unwrap();
        assert_eq!(
            message.encode_into(&mut frame),
            Err(CodecError::AlreadyEncoded)
        );
    }

    #[test]
    fn device_info_helpers() {
        let info = DeviceInfo {
            model: b"HX-200".to_vec(),
            language: *b"de",
            auth_state: 0,
        };
        assert_eq!(info.model_name(), "HX-200");
        assert_eq!(info.language_code(), "de");
        assert!(!info.requires_auth());
    }

    proptest! {
        #[test]
        fn item_write_round_trip(
            sync_id in any::<u32>(),
            flags in any::<u16>(),
            values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..16), 0..8),
        ) {
            let values: Vec<ParamValue> = values.into_iter().map(ParamValue::new).collect();
            for write in [
                ItemWrite::Insert { kind: ItemKind::Todo, values: values.clone() },
                ItemWrite::Update { kind: ItemKind::Address, sync_id, values: values.clone() },
                ItemWrite::FlaggedUpdate { kind: ItemKind::Calendar, sync_id, flags, values: values.clone() },
            ] {
                let message = Message::ItemWrite(write);
                let frame = message.to_frame().unwrap();
                prop_assert_eq!(Message::from_frame(&frame).unwrap(), message);
            }
        }
    }
}
