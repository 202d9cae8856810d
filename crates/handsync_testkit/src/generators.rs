//! Property-based test generators using proptest.
//!
//! Strategies produce values that are valid on the wire: registered
//! categories, digit-only clocks and messages whose origin matches their tag.

use handsync_protocol::{
    DeviceInfo, DeviceTime, ItemKind, ItemWrite, Message, ParamFormatEntry, ParamType,
    ParamValue, SyncIdLists, SyncStateFlags, TodoItem,
};
use proptest::prelude::*;

/// Strategy for sync categories.
pub fn item_kind_strategy() -> impl Strategy<Value = ItemKind> {
    prop::sample::select(ItemKind::ALL.to_vec())
}

/// Strategy for sync-state flags, including unused high bits.
pub fn sync_flags_strategy() -> impl Strategy<Value = SyncStateFlags> {
    any::<u8>().prop_map(SyncStateFlags::from_bits)
}

/// Strategy for the parameter types the schema decoder understands.
pub fn param_type_strategy() -> impl Strategy<Value = ParamType> {
    prop::sample::select(vec![
        ParamType::Bit,
        ParamType::Byte,
        ParamType::Word,
        ParamType::Long,
        ParamType::Time,
        ParamType::ByteArray,
        ParamType::Utf8,
    ])
}

/// Strategy for four-letter field tags.
pub fn field_tag_strategy() -> impl Strategy<Value = [u8; 4]> {
    prop::array::uniform4(b'A'..=b'Z')
}

/// Strategy for raw parameter values.
pub fn param_value_strategy() -> impl Strategy<Value = ParamValue> {
    prop::collection::vec(any::<u8>(), 0..48).prop_map(ParamValue::new)
}

/// Strategy for parameter format entries.
pub fn format_entry_strategy() -> impl Strategy<Value = ParamFormatEntry> {
    (
        field_tag_strategy(),
        param_type_strategy(),
        prop::string::string_regex("[a-z ]{0,16}").expect("Invalid regex"),
    )
        .prop_map(|(tag, param_type, description)| {
            ParamFormatEntry::new(tag, param_type).with_description(description)
        })
}

/// Strategy for a format and a matching value list of the same length.
pub fn format_with_values_strategy(
    max_fields: usize,
) -> impl Strategy<Value = (Vec<ParamFormatEntry>, Vec<ParamValue>)> {
    prop::collection::vec((format_entry_strategy(), param_value_strategy()), 0..max_fields)
        .prop_map(|pairs| {
            let (format, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
            (format, values)
        })
}

/// Strategy for device clocks.
pub fn device_time_strategy() -> impl Strategy<Value = DeviceTime> {
    (1990u16..2100, 1u8..=12, 1u8..=28, 0u8..24, 0u8..60, 0u8..60).prop_map(
        |(year, month, day, hour, minute, second)| {
            DeviceTime::from_parts(year, month, day, hour, minute, second)
                .expect("parts fit their digits")
        },
    )
}

fn sync_id_vec() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(any::<u32>(), 0..16)
}

/// Strategy for enumeration results.
pub fn sync_id_lists_strategy() -> impl Strategy<Value = SyncIdLists> {
    (sync_id_vec(), sync_id_vec(), sync_id_vec())
        .prop_map(|(new, modified, deleted)| SyncIdLists::new(new, modified, deleted))
}

/// Strategy for device identities.
pub fn device_info_strategy() -> impl Strategy<Value = DeviceInfo> {
    (
        prop::collection::vec(any::<u8>(), 0..32),
        prop::array::uniform2(b'a'..=b'z'),
        any::<u8>(),
    )
        .prop_map(|(model, language, auth_state)| DeviceInfo {
            model,
            language,
            auth_state,
        })
}

/// Strategy for item writes of every shape.
pub fn item_write_strategy() -> impl Strategy<Value = ItemWrite> {
    let values = || prop::collection::vec(param_value_strategy(), 0..8);
    prop_oneof![
        (item_kind_strategy(), values()).prop_map(|(kind, values)| ItemWrite::Insert {
            kind,
            values
        }),
        (item_kind_strategy(), any::<u32>(), values()).prop_map(|(kind, sync_id, values)| {
            ItemWrite::Update {
                kind,
                sync_id,
                values,
            }
        }),
        (item_kind_strategy(), any::<u32>(), any::<u16>(), values()).prop_map(
            |(kind, sync_id, flags, values)| ItemWrite::FlaggedUpdate {
                kind,
                sync_id,
                flags,
                values,
            }
        ),
    ]
}

/// Strategy for messages the desktop sends.
pub fn desktop_message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        Just(Message::Ready),
        Just(Message::DeviceInfoRequest),
        prop::collection::vec(any::<u8>(), 0..24)
            .prop_map(|password| Message::AuthRequest { password }),
        Just(Message::TimeRequest),
        device_time_strategy().prop_map(|time| Message::SetTime { time }),
        Just(Message::StoragePathRequest),
        item_kind_strategy().prop_map(|kind| Message::SyncStateRequest { kind }),
        sync_flags_strategy().prop_map(|flags| Message::SetSyncState { flags }),
        item_kind_strategy().prop_map(|kind| Message::ParamFormatRequest { kind }),
        item_kind_strategy().prop_map(|kind| Message::SyncIdsRequest { kind }),
        (item_kind_strategy(), any::<u32>())
            .prop_map(|(kind, sync_id)| Message::ItemRequest { kind, sync_id }),
        (item_kind_strategy(), sync_id_vec())
            .prop_map(|(kind, ids)| Message::DeleteItems { kind, ids }),
        item_write_strategy().prop_map(Message::ItemWrite),
        item_kind_strategy().prop_map(|kind| Message::SyncDone { kind }),
        Just(Message::Terminate),
    ]
}

/// Strategy for messages the device sends.
pub fn device_message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        Just(Message::ExchangeComplete),
        Just(Message::DeviceReady),
        device_info_strategy().prop_map(Message::DeviceInfo),
        Just(Message::AuthNotRequired),
        Just(Message::AuthDenied),
        device_time_strategy().prop_map(|time| Message::DeviceTime { time }),
        prop::collection::vec(any::<u8>(), 0..64).prop_map(|path| Message::StoragePath { path }),
        sync_flags_strategy().prop_map(|flags| Message::SyncState { flags }),
        prop::collection::vec(format_entry_strategy(), 0..12)
            .prop_map(|entries| Message::ParamFormat { entries }),
        sync_id_lists_strategy().prop_map(Message::SyncIds),
        prop::collection::vec(param_value_strategy(), 0..12)
            .prop_map(|values| Message::ItemData { values }),
        any::<u32>().prop_map(|sync_id| Message::ItemWritten { sync_id }),
    ]
}

/// Strategy for any registered message.
pub fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![desktop_message_strategy(), device_message_strategy()]
}

/// Strategy for todo records with a random subset of fields set.
///
/// Text fields are never empty; an empty value reads back as absent.
pub fn todo_item_strategy() -> impl Strategy<Value = TodoItem> {
    let text = || {
        prop::option::of(prop::string::string_regex("[ -~]{1,32}").expect("Invalid regex"))
    };
    (
        prop::option::of(any::<u32>()),
        prop::option::of(any::<u32>()),
        prop::option::of(prop::collection::vec(any::<u8>(), 1..16)),
        text(),
        text(),
        prop::option::of(any::<u8>()),
        prop::option::of(0u8..=100),
        prop::option::of(any::<u32>()),
        prop::option::of(0u8..=1),
    )
        .prop_map(
            |(sync_id, created, category, description, notes, priority, progress, due_date, completed)| {
                TodoItem {
                    sync_id,
                    created,
                    category,
                    description,
                    notes,
                    priority,
                    progress,
                    due_date,
                    completed,
                    ..TodoItem::default()
                }
            },
        )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Fewer cases, for strategies that open sockets or build large frames.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
