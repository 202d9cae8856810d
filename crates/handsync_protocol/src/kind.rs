//! Sync categories and sync-state flags.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A synchronizable category on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// To-do list entries.
    Todo,
    /// Calendar events.
    Calendar,
    /// Address book contacts.
    Address,
}

impl ItemKind {
    /// Every category, in sync-state reset order.
    pub const ALL: [ItemKind; 3] = [ItemKind::Todo, ItemKind::Calendar, ItemKind::Address];

    /// Wire code of this category.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Calendar => 0x01,
            Self::Todo => 0x06,
            Self::Address => 0x07,
        }
    }

    /// Parses a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Calendar),
            0x06 => Some(Self::Todo),
            0x07 => Some(Self::Address),
            _ => None,
        }
    }

    /// Bit carried in [`SyncStateFlags`] for this category.
    #[must_use]
    pub const fn flag_bit(self) -> u8 {
        match self {
            Self::Todo => 0x01,
            Self::Calendar => 0x02,
            Self::Address => 0x04,
        }
    }

    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Calendar => "calendar",
            Self::Address => "address",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A category name that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown item kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ItemKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "todo" | "todos" => Ok(Self::Todo),
            "calendar" | "cal" => Ok(Self::Calendar),
            "address" | "addressbook" | "contacts" => Ok(Self::Address),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Per-category sync state reported by the device.
///
/// A set bit means the category is already in sync, i.e. a slow (full) sync
/// is *not* required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SyncStateFlags(u8);

impl SyncStateFlags {
    /// Wraps raw flag bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Flags with every category marked in sync.
    #[must_use]
    pub const fn all_synced() -> Self {
        Self(0x07)
    }

    /// Raw flag bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if the category is in sync.
    pub fn is_synced(self, kind: ItemKind) -> bool {
        self.0 & kind.flag_bit() != 0
    }

    /// Returns true if the category needs a slow sync.
    pub fn needs_slow_sync(self, kind: ItemKind) -> bool {
        !self.is_synced(kind)
    }

    /// Marks one category as in sync.
    pub fn mark_synced(&mut self, kind: ItemKind) {
        self.0 |= kind.flag_bit();
    }

    /// Marks a category as needing a slow sync.
    ///
    /// Categories fall through in the order todo, calendar, address: resetting
    /// todo also resets calendar and address, resetting calendar also resets
    /// address.
    pub fn reset(&mut self, kind: ItemKind) {
        let start = ItemKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(ItemKind::ALL.len());
        for k in &ItemKind::ALL[start..] {
            self.0 &= !k.flag_bit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ItemKind::from_code(0x02), None);
    }

    #[test]
    fn parse_names() {
        assert_eq!("Todo".parse::<ItemKind>().unwrap(), ItemKind::Todo);
        assert_eq!("contacts".parse::<ItemKind>().unwrap(), ItemKind::Address);
        assert!("memo".parse::<ItemKind>().is_err());
    }

    #[test]
    fn set_bit_means_synced() {
        let flags = SyncStateFlags::from_bits(0x02);
        assert!(flags.is_synced(ItemKind::Calendar));
        assert!(flags.needs_slow_sync(ItemKind::Todo));
        assert!(flags.needs_slow_sync(ItemKind::Address));
    }

    #[test]
    fn reset_todo_cascades_to_all() {
        let mut flags = SyncStateFlags::all_synced();
        flags.reset(ItemKind::Todo);
        assert_eq!(flags.bits(), 0x00);
    }

    #[test]
    fn reset_calendar_cascades_to_address() {
        let mut flags = SyncStateFlags::all_synced();
        flags.reset(ItemKind::Calendar);
        assert!(flags.is_synced(ItemKind::Todo));
        assert!(flags.needs_slow_sync(ItemKind::Calendar));
        assert!(flags.needs_slow_sync(ItemKind::Address));
    }

    #[test]
    fn reset_address_only_touches_address() {
        let mut flags = SyncStateFlags::all_synced();
        flags.reset(ItemKind::Address);
        assert_eq!(flags.bits(), 0x03);
    }

    #[test]
    fn mark_synced_sets_bit() {
        let mut flags = SyncStateFlags::default();
        flags.mark_synced(ItemKind::Address);
        assert_eq!(flags.bits(), 0x04);
    }
}
