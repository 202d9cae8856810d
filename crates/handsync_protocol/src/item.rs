//! Typed item records.
//!
//! Each category has a record struct whose fields are all optional. A field
//! is identified on the wire by a 4-byte tag together with its parameter
//! type; the `item_record!` macro generates the struct, its [`FieldSpec`]
//! table and the tag lookup from a single declaration.

use crate::kind::ItemKind;
use crate::param::{FieldTag, ParamType};
use serde::Serialize;

/// Static description of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Wire tag.
    pub tag: FieldTag,
    /// Expected parameter type.
    pub param_type: ParamType,
    /// Rust field name.
    pub name: &'static str,
}

/// Mutable access to one record field.
#[derive(Debug)]
pub enum FieldSlot<'a> {
    /// Boolean byte.
    Bit(&'a mut Option<u8>),
    /// Unsigned byte.
    Byte(&'a mut Option<u8>),
    /// 16-bit word.
    Word(&'a mut Option<u16>),
    /// 32-bit value.
    Long(&'a mut Option<u32>),
    /// Epoch seconds.
    Time(&'a mut Option<u32>),
    /// Opaque bytes.
    ByteArray(&'a mut Option<Vec<u8>>),
    /// Text.
    Utf8(&'a mut Option<String>),
}

/// Shared access to one populated record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    /// Boolean byte.
    Bit(&'a u8),
    /// Unsigned byte.
    Byte(&'a u8),
    /// 16-bit word.
    Word(&'a u16),
    /// 32-bit value.
    Long(&'a u32),
    /// Epoch seconds.
    Time(&'a u32),
    /// Opaque bytes.
    ByteArray(&'a Vec<u8>),
    /// Text.
    Utf8(&'a String),
}

/// A record type for one category.
pub trait ItemRecord: Default {
    /// Category this record belongs to.
    const KIND: ItemKind;

    /// Every field the record understands.
    const FIELDS: &'static [FieldSpec];

    /// Field for a wire tag and type, if the record has one.
    fn field_mut(&mut self, tag: &FieldTag, param_type: ParamType) -> Option<FieldSlot<'_>>;

    /// Populated field for a wire tag and type.
    fn field(&self, tag: &FieldTag, param_type: ParamType) -> Option<FieldRef<'_>>;

    /// Number of populated fields.
    fn populated(&self) -> usize;
}

const fn field_tag(s: &str) -> FieldTag {
    let b = s.as_bytes();
    FieldTag::new([b[0], b[1], b[2], b[3]])
}

macro_rules! field_type {
    (Bit) => { u8 };
    (Byte) => { u8 };
    (Word) => { u16 };
    (Long) => { u32 };
    (Time) => { u32 };
    (ByteArray) => { Vec<u8> };
    (Utf8) => { String };
}

macro_rules! item_record {
    (
        $(#[$meta:meta])*
        $name:ident => $kind:expr;
        $( $tag:literal $field:ident : $ty:ident = $doc:literal; )*
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct $name {
            $(
                #[doc = concat!("`", $tag, "` ", $doc)]
                #[serde(skip_serializing_if = "Option::is_none")]
                pub $field: Option<field_type!($ty)>,
            )*
        }

        impl ItemRecord for $name {
            const KIND: ItemKind = $kind;

            const FIELDS: &'static [FieldSpec] = &[
                $(
                    FieldSpec {
                        tag: field_tag($tag),
                        param_type: ParamType::$ty,
                        name: stringify!($field),
                    },
                )*
            ];

            fn field_mut(
                &mut self,
                tag: &FieldTag,
                param_type: ParamType,
            ) -> Option<FieldSlot<'_>> {
                $(
                    if *tag == field_tag($tag) && param_type == ParamType::$ty {
                        return Some(FieldSlot::$ty(&mut self.$field));
                    }
                )*
                None
            }

            fn field(&self, tag: &FieldTag, param_type: ParamType) -> Option<FieldRef<'_>> {
                $(
                    if *tag == field_tag($tag) && param_type == ParamType::$ty {
                        return self.$field.as_ref().map(FieldRef::$ty);
                    }
                )*
                None
            }

            fn populated(&self) -> usize {
                [$( self.$field.is_some() ),*].iter().filter(|set| **set).count()
            }
        }
    };
}

item_record! {
    /// A to-do entry.
    TodoItem => ItemKind::Todo;
    "SYID" sync_id: Long = "sync id";
    "ATTR" attributes: Bit = "record attributes";
    "CTTM" created: Time = "creation time";
    "MDTM" modified: Time = "last modification time";
    "CTGR" category: ByteArray = "category";
    "TITL" description: Utf8 = "title";
    "MEM1" notes: Utf8 = "notes";
    "PRTY" priority: Byte = "priority";
    "PRGS" progress: Byte = "progress percentage";
    "STDT" start_date: Time = "start date";
    "DUDT" due_date: Time = "due date";
    "CMDT" completed_date: Time = "completion date";
    "FNSH" completed: Bit = "finished";
}

item_record! {
    /// A calendar event.
    CalendarItem => ItemKind::Calendar;
    "SYID" sync_id: Long = "sync id";
    "ATTR" attributes: Bit = "record attributes";
    "CTTM" created: Time = "creation time";
    "MDTM" modified: Time = "last modification time";
    "CTGR" category: ByteArray = "category";
    "DSCR" description: Utf8 = "description";
    "MEM1" notes: Utf8 = "notes";
    "PLCE" location: Utf8 = "location";
    "STTM" start: Time = "start time";
    "EDTM" end: Time = "end time";
    "ALTM" alarm_time: Time = "alarm time";
    "ALRM" alarm_lead: Word = "alarm lead in minutes";
    "ALSD" alarm_sound: Byte = "alarm sound";
    "ADAY" all_day: Bit = "all-day event";
    "RTYP" repeat_type: Byte = "repeat type";
    "RFRQ" repeat_frequency: Word = "repeat frequency";
    "RPOS" repeat_position: Word = "repeat position in month";
    "RDYS" repeat_days: Byte = "repeat weekday mask";
    "RHEF" repeat_has_end: Bit = "repeat has an end date";
    "RETM" repeat_end: Time = "repeat end date";
    "TMZN" time_zone: Utf8 = "time zone";
}

item_record! {
    /// An address book contact.
    AddressItem => ItemKind::Address;
    "SYID" sync_id: Long = "sync id";
    "ATTR" attributes: Bit = "record attributes";
    "CTTM" created: Time = "creation time";
    "MDTM" modified: Time = "last modification time";
    "CTGR" category: ByteArray = "category";
    "FULL" full_name: Utf8 = "full name";
    "TITL" title: Utf8 = "honorific";
    "FNME" first_name: Utf8 = "first name";
    "MNME" middle_name: Utf8 = "middle name";
    "LNME" last_name: Utf8 = "last name";
    "SUFX" suffix: Utf8 = "name suffix";
    "FLAS" file_as: Utf8 = "file as";
    "FNPR" first_name_pronunciation: Utf8 = "first name pronunciation";
    "LNPR" last_name_pronunciation: Utf8 = "last name pronunciation";
    "CPPR" company_pronunciation: Utf8 = "company pronunciation";
    "NCKN" nickname: Utf8 = "nickname";
    "CMPY" company: Utf8 = "company";
    "DEPT" department: Utf8 = "department";
    "POSI" job_title: Utf8 = "job title";
    "PROF" profession: Utf8 = "profession";
    "OFFC" office: Utf8 = "office";
    "MNGR" manager: Utf8 = "manager";
    "ASST" assistant: Utf8 = "assistant";
    "EMAL" emails: Utf8 = "e-mail addresses";
    "DEML" default_email: Utf8 = "default e-mail";
    "HTEL" home_phone: Utf8 = "home phone";
    "HFAX" home_fax: Utf8 = "home fax";
    "HMOB" home_mobile: Utf8 = "home mobile";
    "HADR" home_street: Utf8 = "home street";
    "HCTY" home_city: Utf8 = "home city";
    "HSTA" home_state: Utf8 = "home state";
    "HZIP" home_zip: Utf8 = "home postal code";
    "HCTR" home_country: Utf8 = "home country";
    "HWEB" home_web: Utf8 = "home web page";
    "BTEL" business_phone: Utf8 = "business phone";
    "BFAX" business_fax: Utf8 = "business fax";
    "BMOB" business_mobile: Utf8 = "business mobile";
    "BPGR" business_pager: Utf8 = "pager";
    "BADR" business_street: Utf8 = "business street";
    "BCTY" business_city: Utf8 = "business city";
    "BSTA" business_state: Utf8 = "business state";
    "BZIP" business_zip: Utf8 = "business postal code";
    "BCTR" business_country: Utf8 = "business country";
    "BWEB" business_web: Utf8 = "business web page";
    "SPOU" spouse: Utf8 = "spouse";
    "GEND" gender: Utf8 = "gender";
    "BRTH" birthday: Utf8 = "birthday";
    "ANIV" anniversary: Utf8 = "anniversary";
    "CHLD" children: Utf8 = "children";
    "MEM1" notes: Utf8 = "notes";
}

/// A decoded item of any category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Item {
    /// To-do entry.
    Todo(TodoItem),
    /// Calendar event.
    Calendar(CalendarItem),
    /// Contact.
    Address(AddressItem),
}

impl Item {
    /// Category of the item.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Todo(_) => ItemKind::Todo,
            Self::Calendar(_) => ItemKind::Calendar,
            Self::Address(_) => ItemKind::Address,
        }
    }

    /// Sync id carried in the record, if any.
    pub fn sync_id(&self) -> Option<u32> {
        match self {
            Self::Todo(item) => item.sync_id,
            Self::Calendar(item) => item.sync_id,
            Self::Address(item) => item.sync_id,
        }
    }

    /// One-line summary for listings.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Todo(item) => item.description.as_deref(),
            Self::Calendar(item) => item.description.as_deref(),
            Self::Address(item) => item
                .full_name
                .as_deref()
                .or(item.last_name.as_deref())
                .or(item.company.as_deref()),
        }
    }
}

impl From<TodoItem> for Item {
    fn from(item: TodoItem) -> Self {
        Self::Todo(item)
    }
}

impl From<CalendarItem> for Item {
    fn from(item: CalendarItem) -> Self {
        Self::Calendar(item)
    }
}

impl From<AddressItem> for Item {
    fn from(item: AddressItem) -> Self {
        Self::Address(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_unique_tags<R: ItemRecord>() {
        for (i, a) in R::FIELDS.iter().enumerate() {
            for b in &R::FIELDS[i + 1..] {
                assert_ne!(a.tag, b.tag, "{} duplicated in {}", a.tag, R::KIND);
            }
        }
    }

    #[test]
    fn field_tags_are_unique_per_record() {
        assert_unique_tags::<TodoItem>();
        assert_unique_tags::<CalendarItem>();
        assert_unique_tags::<AddressItem>();
    }

    #[test]
    fn address_book_is_mostly_text() {
        let text = AddressItem::FIELDS
            .iter()
            .filter(|f| f.param_type == ParamType::Utf8)
            .count();
        assert!(text >= 40);
    }

    #[test]
    fn lookup_requires_matching_type() {
        let mut item = TodoItem::default();
        let tag = FieldTag::new(*b"SYID");
        assert!(item.field_mut(&tag, ParamType::Long).is_some());
        assert!(item.field_mut(&tag, ParamType::Word).is_none());
        assert!(item
            .field_mut(&FieldTag::new(*b"ZZZZ"), ParamType::Long)
            .is_none());
    }

    #[test]
    fn slot_writes_reach_the_record() {
        let mut item = CalendarItem::default();
        if let Some(FieldSlot::Utf8(slot)) =
            item.field_mut(&FieldTag::new(*b"PLCE"), ParamType::Utf8)
        {
            *slot = Some("Room 4".to_string());
        }
        assert_eq!(item.location.as_deref(), Some("Room 4"));
        assert_eq!(item.populated(), 1);
        assert_eq!(
            item.field(&FieldTag::new(*b"PLCE"), ParamType::Utf8),
            Some(FieldRef::Utf8(&"Room 4".to_string()))
        );
    }

    #[test]
    fn item_summary() {
        let item = Item::from(AddressItem {
            company: Some("Acme".into()),
            sync_id: Some(3),
            ..AddressItem::default()
        });
        assert_eq!(item.kind(), ItemKind::Address);
        assert_eq!(item.sync_id(), Some(3));
        assert_eq!(item.title(), Some("Acme"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let item = Item::from(TodoItem {
            sync_id: Some(7),
            description: Some("Buy milk".into()),
            ..TodoItem::default()
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "todo", "sync_id": 7, "description": "Buy milk"})
        );
    }
}
