//! Schema-driven item decoding.
//!
//! Item data is a list of raw values whose meaning comes from the category's
//! parameter format: value `i` has the tag and type of format entry `i`.

use crate::error::{SchemaError, SchemaResult};
use crate::item::{AddressItem, CalendarItem, FieldRef, FieldSlot, Item, ItemRecord, TodoItem};
use crate::kind::ItemKind;
use crate::param::{FieldTag, ParamFormatEntry, ParamValue};
use handsync_codec::copy_owned;

fn owned(tag: &FieldTag, data: &[u8]) -> SchemaResult<Vec<u8>> {
    copy_owned(data, "item field").map_err(|_| SchemaError::AllocationFailed {
        field: *tag,
        len: data.len(),
    })
}

fn fixed<const N: usize>(tag: &FieldTag, data: &[u8]) -> SchemaResult<[u8; N]> {
    data.try_into().map_err(|_| SchemaError::FieldWidth {
        tag: *tag,
        expected: N,
        actual: data.len(),
    })
}

fn store(slot: FieldSlot<'_>, tag: &FieldTag, data: &[u8]) -> SchemaResult<()> {
    match slot {
        FieldSlot::Bit(field) | FieldSlot::Byte(field) => {
            *field = Some(u8::from_le_bytes(fixed(tag, data)?));
        }
        FieldSlot::Word(field) => *field = Some(u16::from_le_bytes(fixed(tag, data)?)),
        FieldSlot::Long(field) | FieldSlot::Time(field) => {
            *field = Some(u32::from_le_bytes(fixed(tag, data)?));
        }
        FieldSlot::ByteArray(field) => *field = Some(owned(tag, data)?),
        FieldSlot::Utf8(field) => {
            let bytes = owned(tag, data)?;
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            };
            *field = Some(text);
        }
    }
    Ok(())
}

/// Decodes one record of a known type.
///
/// Entries whose tag or type the record does not know are skipped, as are
/// zero-length values. The record is only returned if every recognized value
/// decoded.
///
/// # Errors
///
/// - [`SchemaError::LengthMismatch`] if `format` and `values` differ in length.
/// - [`SchemaError::FieldWidth`] if a fixed-width value has the wrong size.
/// - [`SchemaError::AllocationFailed`] if an owned value cannot be allocated.
pub fn decode_record<R: ItemRecord>(
    format: &[ParamFormatEntry],
    values: &[ParamValue],
) -> SchemaResult<R> {
    if format.len() != values.len() {
        return Err(SchemaError::LengthMismatch {
            formats: format.len(),
            values: values.len(),
        });
    }

    let mut record = R::default();
    for (entry, value) in format.iter().zip(values) {
        if value.is_empty() {
            continue;
        }
        if let Some(slot) = record.field_mut(&entry.tag, entry.param_type) {
            store(slot, &entry.tag, &value.data)?;
        }
    }
    Ok(record)
}

/// Decodes item data for `kind` using its parameter format.
///
/// # Errors
///
/// See [`decode_record`].
pub fn decode_item(
    format: &[ParamFormatEntry],
    values: &[ParamValue],
    kind: ItemKind,
) -> SchemaResult<Item> {
    Ok(match kind {
        ItemKind::Todo => Item::Todo(decode_record::<TodoItem>(format, values)?),
        ItemKind::Calendar => Item::Calendar(decode_record::<CalendarItem>(format, values)?),
        ItemKind::Address => Item::Address(decode_record::<AddressItem>(format, values)?),
    })
}

/// Encodes a record as values in `format` order.
///
/// Fields the record lacks, and format entries it does not know, become
/// zero-length values.
///
/// # Errors
///
/// Returns [`SchemaError::AllocationFailed`] if a value cannot be allocated.
pub fn encode_record<R: ItemRecord>(
    format: &[ParamFormatEntry],
    record: &R,
) -> SchemaResult<Vec<ParamValue>> {
    format
        .iter()
        .map(|entry| {
            let data = match record.field(&entry.tag, entry.param_type) {
                None => Vec::new(),
                Some(FieldRef::Bit(v) | FieldRef::Byte(v)) => vec![*v],
                Some(FieldRef::Word(v)) => v.to_le_bytes().to_vec(),
                Some(FieldRef::Long(v) | FieldRef::Time(v)) => v.to_le_bytes().to_vec(),
                Some(FieldRef::ByteArray(v)) => owned(&entry.tag, v)?,
                Some(FieldRef::Utf8(v)) => owned(&entry.tag, v.as_bytes())?,
            };
            Ok(ParamValue::new(data))
        })
        .collect()
}

/// Encodes any item as values in `format` order.
///
/// # Errors
///
/// See [`encode_record`].
pub fn encode_item(format: &[ParamFormatEntry], item: &Item) -> SchemaResult<Vec<ParamValue>> {
    match item {
        Item::Todo(record) => encode_record(format, record),
        Item::Calendar(record) => encode_record(format, record),
        Item::Address(record) => encode_record(format, record),
    }
}

/// The parameter format a record type would advertise.
pub fn default_format<R: ItemRecord>() -> Vec<ParamFormatEntry> {
    R::FIELDS
        .iter()
        .map(|field| ParamFormatEntry {
            tag: field.tag,
            param_type: field.param_type,
            description: field.name.as_bytes().to_vec(),
        })
        .collect()
}
