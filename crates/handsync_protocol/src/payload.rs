//! Reusable payload shapes.
//!
//! Message payloads are built from two list layouts:
//!
//! - a u16 count followed by fixed-width records ([`FixedRecord`]), used for
//!   sync-id lists
//! - a u16 count followed by self-delimiting records ([`WireRecord`]), used for
//!   parameter formats and parameter values
//!
//! Blobs are a u16 length followed by that many bytes.

use handsync_codec::{ByteReader, ByteWriter, CodecError, CodecResult};
use serde::Serialize;
use std::fmt;

/// A record with a self-delimiting wire form.
pub trait WireRecord: Sized {
    /// Encoded size in bytes.
    fn encoded_len(&self) -> usize;

    /// Appends the record.
    fn encode(&self, w: &mut ByteWriter) -> CodecResult<()>;

    /// Reads one record.
    fn decode(r: &mut ByteReader<'_>) -> CodecResult<Self>;
}

/// A record with a fixed wire width.
pub trait FixedRecord: Sized + Copy {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Appends the record.
    fn put(self, w: &mut ByteWriter);

    /// Reads one record.
    fn get(r: &mut ByteReader<'_>) -> CodecResult<Self>;
}

impl FixedRecord for u32 {
    const WIDTH: usize = 4;

    fn put(self, w: &mut ByteWriter) {
        w.put_u32(self);
    }

    fn get(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        r.read_u32()
    }
}

/// Allocates room for `count` decoded elements.
fn reserve<T>(count: usize, what: &'static str) -> CodecResult<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(count)
        .map_err(|_| CodecError::AllocationFailed {
            what,
            len: count.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(out)
}

/// Encoded size of a counted fixed-width list.
pub fn fixed_list_len<T: FixedRecord>(items: &[T]) -> usize {
    2 + items.len() * T::WIDTH
}

/// Writes a u16 count followed by each fixed-width record.
pub fn put_fixed_list<T: FixedRecord>(
    w: &mut ByteWriter,
    items: &[T],
    what: &'static str,
) -> CodecResult<()> {
    w.put_count(items.len(), what)?;
    for item in items {
        item.put(w);
    }
    Ok(())
}

/// Reads a u16 count followed by that many fixed-width records.
///
/// The whole list must be present before anything is allocated.
pub fn read_fixed_list<T: FixedRecord>(
    r: &mut ByteReader<'_>,
    what: &'static str,
) -> CodecResult<Vec<T>> {
    let count = usize::from(r.read_u16()?);
    let needed = count * T::WIDTH;
    if r.remaining() < needed {
        return Err(CodecError::UnexpectedEof {
            needed,
            available: r.remaining(),
        });
    }
    let mut out = reserve(count, what)?;
    for _ in 0..count {
        out.push(T::get(r)?);
    }
    Ok(out)
}

/// Encoded size of a counted record list.
pub fn record_list_len<T: WireRecord>(items: &[T]) -> usize {
    2 + items.iter().map(WireRecord::encoded_len).sum::<usize>()
}

/// Writes a u16 count followed by each record.
pub fn put_record_list<T: WireRecord>(
    w: &mut ByteWriter,
    items: &[T],
    what: &'static str,
) -> CodecResult<()> {
    w.put_count(items.len(), what)?;
    items.iter().try_for_each(|item| item.encode(w))
}

/// Reads a u16 count followed by that many records.
pub fn read_record_list<T: WireRecord>(
    r: &mut ByteReader<'_>,
    what: &'static str,
) -> CodecResult<Vec<T>> {
    let count = usize::from(r.read_u16()?);
    // Every record occupies at least two bytes.
    let mut out = reserve(count.min(r.remaining() / 2), what)?;
    for _ in 0..count {
        out.push(T::decode(r)?);
    }
    Ok(out)
}

/// List id of the "new" sync-id list.
pub const LIST_NEW: u8 = 0x01;
/// List id of the "modified" sync-id list.
pub const LIST_MODIFIED: u8 = 0x02;
/// List id of the "deleted" sync-id list.
pub const LIST_DELETED: u8 = 0x03;

/// One labelled list of sync ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdList {
    /// List identifier.
    pub list_id: u8,
    /// Sync ids in device order.
    pub ids: Vec<u32>,
}

impl IdList {
    /// Creates a labelled list.
    pub fn new(list_id: u8, ids: Vec<u32>) -> Self {
        Self { list_id, ids }
    }
}

impl WireRecord for IdList {
    fn encoded_len(&self) -> usize {
        1 + fixed_list_len(&self.ids)
    }

    fn encode(&self, w: &mut ByteWriter) -> CodecResult<()> {
        w.put_u8(self.list_id);
        put_fixed_list(w, &self.ids, "sync id list")
    }

    fn decode(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        let list_id = r.read_u8()?;
        let ids = read_fixed_list(r, "sync id list")?;
        Ok(Self { list_id, ids })
    }
}

/// The three parallel sync-id lists a device reports for a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncIdLists {
    /// Items created since the last sync.
    pub new: IdList,
    /// Items changed since the last sync.
    pub modified: IdList,
    /// Items removed since the last sync.
    pub deleted: IdList,
}

impl SyncIdLists {
    /// Builds the three lists with their standard ids.
    pub fn new(new: Vec<u32>, modified: Vec<u32>, deleted: Vec<u32>) -> Self {
        Self {
            new: IdList::new(LIST_NEW, new),
            modified: IdList::new(LIST_MODIFIED, modified),
            deleted: IdList::new(LIST_DELETED, deleted),
        }
    }

    /// Ids whose item data should be fetched: new first, then modified.
    pub fn changed(&self) -> impl Iterator<Item = u32> + '_ {
        self.new.ids.iter().chain(&self.modified.ids).copied()
    }

    /// Total number of ids across all three lists.
    pub fn total(&self) -> usize {
        self.new.ids.len() + self.modified.ids.len() + self.deleted.ids.len()
    }

    /// Returns true if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl WireRecord for SyncIdLists {
    fn encoded_len(&self) -> usize {
        self.new.encoded_len() + self.modified.encoded_len() + self.deleted.encoded_len()
    }

    fn encode(&self, w: &mut ByteWriter) -> CodecResult<()> {
        self.new.encode(w)?;
        self.modified.encode(w)?;
        self.deleted.encode(w)
    }

    fn decode(r: &mut ByteReader<'_>) -> CodecResult<Self> {
        Ok(Self {
            new: IdList::decode(r)?,
            modified: IdList::decode(r)?,
            deleted: IdList::decode(r)?,
        })
    }
}

/// Device clock as 14 ASCII digits, `YYYYMMDDhhmmss`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceTime([u8; 14]);

impl DeviceTime {
    /// Wire width.
    pub const LEN: usize = 14;

    /// Validates raw wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTime`] unless every byte is an ASCII digit.
    pub fn from_bytes(bytes: [u8; 14]) -> CodecResult<Self> {
        if bytes.iter().all(u8::is_ascii_digit) {
            Ok(Self(bytes))
        } else {
            Err(CodecError::InvalidTime)
        }
    }

    /// Parses `YYYYMMDDhhmmss`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTime`] on any other shape.
    pub fn parse(s: &str) -> CodecResult<Self> {
        let bytes: [u8; 14] = s
            .as_bytes()
            .try_into()
            .map_err(|_| CodecError::InvalidTime)?;
        Self::from_bytes(bytes)
    }

    /// Builds a time from calendar parts.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTime`] if a part overflows its digits.
    pub fn from_parts(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> CodecResult<Self> {
        if year > 9999 || month > 99 || day > 99 || hour > 99 || minute > 99 || second > 99 {
            return Err(CodecError::InvalidTime);
        }
        let s = format!("{year:04}{month:02}{day:02}{hour:02}{minute:02}{second:02}");
        Self::parse(&s)
    }

    /// The raw digits.
    pub fn as_bytes(&self) -> &[u8; 14] {
        &self.0
    }

    fn number(&self, range: std::ops::Range<usize>) -> u16 {
        self.0[range]
            .iter()
            .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'))
    }

    /// Four-digit year.
    pub fn year(&self) -> u16 {
        self.number(0..4)
    }

    /// Month, 1-12.
    pub fn month(&self) -> u16 {
        self.number(4..6)
    }

    /// Day of month.
    pub fn day(&self) -> u16 {
        self.number(6..8)
    }

    /// Hour, 0-23.
    pub fn hour(&self) -> u16 {
        self.number(8..10)
    }

    /// Minute.
    pub fn minute(&self) -> u16 {
        self.number(10..12)
    }

    /// Second.
    pub fn second(&self) -> u16 {
        self.number(12..14)
    }
}

impl fmt::Display for DeviceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        )
    }
}

impl fmt::Debug for DeviceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceTime({self})")
    }
}

impl Serialize for DeviceTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn id_list_layout() {
        let list = IdList::new(LIST_NEW, vec![7, 0x0102_0304]);
        let mut w = ByteWriter::new();
        list.encode(&mut w).unwrap();
        assert_eq!(
            w.as_bytes(),
            &[0x01, 0x02, 0x00, 0x07, 0x00, 0x00, 0x00, 0x04, 0x03, 0x02, 0x01]
        );
        assert_eq!(w.len(), list.encoded_len());
    }

    #[test]
    fn short_fixed_list_fails_before_allocating() {
        // count says 1000 ids but only one is present
        let bytes = [0xe8, 0x03, 0x01, 0x00, 0x00, 0x00];
        let err = read_fixed_list::<u32>(&mut ByteReader::new(&bytes), "ids").unwrap_err();
        assert_eq!(
            err,
            CodecError::UnexpectedEof {
                needed: 4000,
                available: 4
            }
        );
    }

    #[test]
    fn changed_ids_are_new_then_modified() {
        let lists = SyncIdLists::new(vec![1, 2], vec![5], vec![9]);
        assert_eq!(lists.changed().collect::<Vec<_>>(), vec![1, 2, 5]);
        assert_eq!(lists.total(), 4);
        assert!(!lists.is_empty());
        assert!(SyncIdLists::default().is_empty());
    }

    #[test]
    fn device_time_parses_digits() {
        let t = DeviceTime::parse("20240131235958").unwrap();
        assert_eq!(t.year(), 2024);
        assert_eq!(t.month(), 1);
        assert_eq!(t.second(), 58);
        assert_eq!(t.to_string(), "2024-01-31 23:59:58");
    }

    #[test]
    fn device_time_rejects_bad_shapes() {
        assert_eq!(DeviceTime::parse("2024"), Err(CodecError::InvalidTime));
        assert_eq!(
            DeviceTime::parse("2024013123595x"),
            Err(CodecError::InvalidTime)
        );
        assert_eq!(
            DeviceTime::from_parts(2024, 100, 1, 0, 0, 0),
            Err(CodecError::InvalidTime)
        );
    }

    proptest! {
        #[test]
        fn sync_id_lists_round_trip(
            new in prop::collection::vec(any::<u32>(), 0..20),
            modified in prop::collection::vec(any::<u32>(), 0..20),
            deleted in prop::collection::vec(any::<u32>(), 0..20),
        ) {
            let lists = SyncIdLists::new(new, modified, deleted);
            let mut w = ByteWriter::new();
            lists.encode(&mut w).unwrap();
            prop_assert_eq!(w.len(), lists.encoded_len());

            let mut r = ByteReader::new(w.as_bytes());
            prop_assert_eq!(SyncIdLists::decode(&mut r).unwrap(), lists);
            prop_assert!(r.is_empty());
        }
    }
}
