//! Sample devices, formats and records.
//!
//! The todo fixtures describe a small device with three changes pending:
//! item 7 is new, item 9 was modified and item 3 was deleted.

use crate::device::DeviceData;
use handsync_protocol::{
    default_format, encode_record, DeviceInfo, DeviceTime, ItemKind, ItemRecord,
    ParamFormatEntry, ParamType, ParamValue, SyncStateFlags, TodoItem,
};

/// Sync id of the new todo item.
pub const NEW_TODO_ID: u32 = 7;
/// Sync id of the modified todo item.
pub const MODIFIED_TODO_ID: u32 = 9;
/// Sync id of the deleted todo item.
pub const DELETED_TODO_ID: u32 = 3;

/// A device that needs no password.
pub fn sample_device_info() -> DeviceInfo {
    DeviceInfo {
        model: b"Zaurus SL-C3200".to_vec(),
        language: *b"en",
        auth_state: 0,
    }
}

/// 2024-03-15 09:30:00.
pub fn sample_time() -> DeviceTime {
    DeviceTime::from_bytes(*b"20240315093000").expect("fixture time is valid")
}

/// The todo format as a device advertises it, with one field this crate
/// does not model.
pub fn todo_format() -> Vec<ParamFormatEntry> {
    let mut format = default_format::<TodoItem>();
    format.insert(
        2,
        ParamFormatEntry::new(*b"XPRV", ParamType::ByteArray).with_description("private"),
    );
    format
}

/// A todo record with an id, title and category.
pub fn sample_todo(sync_id: u32, title: &str, category: &[u8]) -> TodoItem {
    TodoItem {
        sync_id: Some(sync_id),
        description: Some(title.to_string()),
        category: Some(category.to_vec()),
        priority: Some(2),
        ..TodoItem::default()
    }
}

/// Encodes a record against `format`, panicking on failure.
pub fn values_for<R: ItemRecord>(format: &[ParamFormatEntry], record: &R) -> Vec<ParamValue> {
    encode_record(format, record).expect("fixture record encodes")
}

/// The todo records held by [`todo_device`], in id-list order.
pub fn todo_records() -> Vec<TodoItem> {
    vec![
        sample_todo(NEW_TODO_ID, "Buy milk", b"Work"),
        sample_todo(MODIFIED_TODO_ID, "Call the dentist", b"Personal"),
    ]
}

/// A device with pending todo changes and every other category in sync.
pub fn todo_device() -> DeviceData {
    let format = todo_format();
    let records = todo_records();
    let flags =
        SyncStateFlags::from_bits(ItemKind::Calendar.flag_bit() | ItemKind::Address.flag_bit());
    DeviceData::new(sample_device_info(), sample_time())
        .with_flags(flags)
        .with_storage_path("/home/zaurus/Applications")
        .with_format(ItemKind::Todo, format.clone())
        .with_new_item(ItemKind::Todo, NEW_TODO_ID, values_for(&format, &records[0]))
        .with_modified_item(
            ItemKind::Todo,
            MODIFIED_TODO_ID,
            values_for(&format, &records[1]),
        )
        .with_deleted_id(ItemKind::Todo, DELETED_TODO_ID)
}

#[cfg(test)]
mod tests {
    use super::*;
    use handsync_protocol::{decode_record, FieldTag};

    #[test]
    fn todo_format_keeps_unknown_field() {
        let format = todo_format();
        assert_eq!(format.len(), TodoItem::FIELDS.len() + 1);
        assert_eq!(format[2].tag, FieldTag::new(*b"XPRV"));
    }

    #[test]
    fn device_records_decode_back() {
        let device = todo_device();
        let category = device.category(ItemKind::Todo).unwrap();
        let values = &category.items[&NEW_TODO_ID];
        let record: TodoItem = decode_record(&category.format, values).unwrap();
        assert_eq!(record, todo_records()[0]);
        assert_eq!(category.ids.changed().collect::<Vec<_>>(), vec![7, 9]);
        assert_eq!(category.ids.deleted.ids, vec![DELETED_TODO_ID]);
    }

    #[test]
    fn only_todo_needs_slow_sync() {
        let flags = todo_device().flags;
        assert!(flags.needs_slow_sync(ItemKind::Todo));
        assert!(flags.is_synced(ItemKind::Calendar));
        assert!(flags.is_synced(ItemKind::Address));
    }
}
