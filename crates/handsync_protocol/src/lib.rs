//! # handsync protocol
//!
//! Message registry and item model for the handheld sync protocol.
//!
//! This crate provides:
//! - [`Message`], one variant per registered 3-byte tag
//! - Sync categories and sync-state flags ([`ItemKind`], [`SyncStateFlags`])
//! - Parameter formats and values ([`ParamFormatEntry`], [`ParamValue`])
//! - Typed item records and schema-driven decoding ([`decode_item`])
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ```
//! use handsync_protocol::{decode_item, Item, ItemKind, ParamFormatEntry, ParamType, ParamValue};
//!
//! let format = vec![
//!     ParamFormatEntry::new(*b"SYID", ParamType::Long),
//!     ParamFormatEntry::new(*b"TITL", ParamType::Utf8),
//! ];
//! let values = vec![
//!     ParamValue::new(7u32.to_le_bytes().to_vec()),
//!     ParamValue::new(b"Buy milk".to_vec()),
//! ];
//!
//! let item = decode_item(&format, &values, ItemKind::Todo).unwrap();
//! assert_eq!(item.sync_id(), Some(7));
//! assert_eq!(item.title(), Some("Buy milk"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod item;
mod kind;
mod param;
mod payload;
mod schema;

pub mod message;

pub use error::{SchemaError, SchemaResult};
pub use item::{
    AddressItem, CalendarItem, FieldRef, FieldSlot, FieldSpec, Item, ItemRecord, TodoItem,
};
pub use kind::{ItemKind, SyncStateFlags, UnknownKind};
pub use message::{tags, DeviceInfo, ItemWrite, Message, MessageSpec, REGISTRY};
pub use param::{FieldTag, ParamFormatEntry, ParamType, ParamValue};
pub use payload::{
    fixed_list_len, put_fixed_list, put_record_list, read_fixed_list, read_record_list,
    record_list_len, DeviceTime, FixedRecord, IdList, SyncIdLists, WireRecord, LIST_DELETED,
    LIST_MODIFIED, LIST_NEW,
};
pub use schema::{decode_item, decode_record, default_format, encode_item, encode_record};
