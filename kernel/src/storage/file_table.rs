/// On-disk file table. Maps names to contiguous LBA ranges.
///
/// The table occupies 8 blocks starting at `StorageLayout::file_table_lba`.
/// Each record is 32 bytes (fixed), 128 records in total:
///
///   0..16   name, NUL padded (at most 15 bytes + terminator)
///   16..20  start LBA, little-endian u32
///   20..24  size in bytes, little-endian u32
///   24      used flag
///   25..32  reserved, written as zero
///
/// The whole array is rewritten on every `save`. There is no journal: a
/// change to data blocks becomes durable only once `save` returns Ok.
use alloc::string::String;

use log::warn;

use crate::config::{StorageLayout, BLOCK_SIZE, FILE_TABLE_BLOCKS, MAX_FILES, RECORD_SIZE};
use super::block_device::{Block, BlockDevice, DeviceError};

/// Bytes reserved for the name, including the NUL terminator.
pub const NAME_LEN: usize = 16;

/// Longest name a record can hold.
pub const MAX_NAME_LEN: usize = NAME_LEN - 1;

const RECORDS_PER_BLOCK: usize = BLOCK_SIZE / RECORD_SIZE;

/// A single file record, 32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileRecord {
    /// File name, NUL-terminated.
    pub name: [u8; NAME_LEN],
    /// First LBA of the file's contiguous run.
    pub start: u32,
    /// Length of the file in bytes.
    pub size: u32,
    pub used: bool,
    _reserved: [u8; 7],
}

static_assertions::const_assert_eq!(core::mem::size_of::<FileRecord>(), RECORD_SIZE);
static_assertions::const_assert_eq!(MAX_FILES * RECORD_SIZE, FILE_TABLE_BLOCKS as usize * BLOCK_SIZE);

/// Blocks needed to hold `size` bytes.
pub const fn blocks_for(size: u32) -> u32 {
    size.div_ceil(BLOCK_SIZE as u32)
}

/// Names are 1..=15 printable ASCII bytes, space excluded.
///
/// Names are typed as whitespace-separated shell arguments, so a name
/// containing a space could never be addressed again. Control bytes and
/// anything above 0x7E are rejected too.
pub fn is_valid_name(name: &[u8]) -> bool {
    !name.is_empty() && name.len() <= MAX_NAME_LEN && name.iter().all(|b| b.is_ascii_graphic())
}

impl FileRecord {
    pub const fn empty() -> Self {
        Self {
            name: [0u8; NAME_LEN],
            start: 0,
            size: 0,
            used: false,
            _reserved: [0u8; 7],
        }
    }

    /// Get the file name as a byte slice (up to the first NUL).
    pub fn name_bytes(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..len]
    }

    /// Set the file name, truncating to 15 bytes.
    pub fn set_name(&mut self, name: &[u8]) {
        let copy_len = name.len().min(MAX_NAME_LEN);
        self.name = [0u8; NAME_LEN];
        self.name[..copy_len].copy_from_slice(&name[..copy_len]);
    }

    /// Number of blocks the file occupies.
    pub fn block_count(&self) -> u32 {
        blocks_for(self.size)
    }

    /// Serialize into the 32-byte on-disk form.
    pub fn encode(&self, out: &mut [u8]) {
        out[..NAME_LEN].copy_from_slice(&self.name);
        out[16..20].copy_from_slice(&self.start.to_le_bytes());
        out[20..24].copy_from_slice(&self.size.to_le_bytes());
        out[24] = self.used as u8;
        out[25..RECORD_SIZE].fill(0);
    }

    /// Parse the 32-byte on-disk form. The name is always NUL-terminated
    /// afterwards, whatever the disk held in byte 15.
    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; NAME_LEN];
        name[..MAX_NAME_LEN].copy_from_slice(&raw[..MAX_NAME_LEN]);
        Self {
            name,
            start: u32::from_le_bytes([raw[16], raw[17], raw[18], raw[19]]),
            size: u32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]),
            used: raw[24] != 0,
            _reserved: [0u8; 7],
        }
    }

    /// True if this record's block range intersects `other`'s.
    pub fn overlaps(&self, other: &FileRecord) -> bool {
        let (a, b) = (self.block_count(), other.block_count());
        if a == 0 || b == 0 {
            return false;
        }
        self.start < other.start + b && other.start < self.start + a
    }

    /// Does this used record point somewhere sane for `layout`?
    fn is_consistent(&self, layout: &StorageLayout) -> bool {
        if !is_valid_name(self.name_bytes()) {
            return false;
        }
        let blocks = self.block_count();
        if blocks == 0 {
            return true;
        }
        self.start >= layout.data_start_lba()
            && (self.start as u64 + blocks as u64) <= layout.total_blocks as u64
    }
}

/// Public view of a used record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    pub start: u32,
    pub size: u32,
}

impl From<&FileRecord> for FileInfo {
    fn from(r: &FileRecord) -> Self {
        Self {
            name: String::from_utf8_lossy(r.name_bytes()).into_owned(),
            start: r.start,
            size: r.size,
        }
    }
}

/// In-memory file table, cached from disk.
#[derive(Clone)]
pub struct FileTable {
    entries: [FileRecord; MAX_FILES],
    layout: StorageLayout,
}

impl FileTable {
    /// Create an empty file table.
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            entries: [FileRecord::empty(); MAX_FILES],
            layout,
        }
    }

    /// Load the file table from disk, dropping records that fail the
    /// consistency check. Returns a fresh table; nothing is merged.
    pub fn load(dev: &mut dyn BlockDevice, layout: StorageLayout) -> Result<Self, DeviceError> {
        let mut table = Self::new(layout);
        let mut buf: Block = [0u8; BLOCK_SIZE];

        for blk in 0..FILE_TABLE_BLOCKS {
            dev.read_block(layout.file_table_lba + blk, &mut buf)?;
            for i in 0..RECORDS_PER_BLOCK {
                let offset = i * RECORD_SIZE;
                let idx = blk as usize * RECORDS_PER_BLOCK + i;
                table.entries[idx] = FileRecord::decode(&buf[offset..offset + RECORD_SIZE]);
            }
        }

        table.sanitize();
        Ok(table)
    }

    /// Clear every used record that is malformed, duplicates an earlier
    /// name, or overlaps an earlier record's blocks.
    fn sanitize(&mut self) {
        for i in 0..MAX_FILES {
            let rec = self.entries[i];
            if !rec.used {
                // Unused slots carry no meaning; normalize them.
                self.entries[i] = FileRecord::empty();
                continue;
            }

            let reason = if !rec.is_consistent(&self.layout) {
                Some("bad name or range")
            } else if self.entries[..i]
                .iter()
                .any(|e| e.used && e.name_bytes() == rec.name_bytes())
            {
                Some("duplicate name")
            } else if self.entries[..i].iter().any(|e| e.used && e.overlaps(&rec)) {
                Some("overlapping blocks")
            } else {
                None
            };

            if let Some(reason) = reason {
                warn!("file table: dropping slot {} ({})", i, reason);
                self.entries[i] = FileRecord::empty();
            }
        }
    }

    /// Write all 128 records back over the table region.
    ///
    /// `changed_slot` is the one record the caller modified. Its block goes
    /// out last; every block before it only repeats what loading the disk
    /// would already yield. A `Ready` or `DataRequest` timeout therefore
    /// leaves the durable table as it was, and only a `Completion` timeout
    /// can leave it in doubt.
    pub fn save(&self, dev: &mut dyn BlockDevice, changed_slot: usize) -> Result<(), DeviceError> {
        let last = (changed_slot.min(MAX_FILES - 1) / RECORDS_PER_BLOCK) as u32;
        let order = (0..FILE_TABLE_BLOCKS)
            .filter(|&blk| blk != last)
            .chain(core::iter::once(last));

        let mut buf: Block = [0u8; BLOCK_SIZE];
        for blk in order {
            for i in 0..RECORDS_PER_BLOCK {
                let offset = i * RECORD_SIZE;
                let idx = blk as usize * RECORDS_PER_BLOCK + i;
                self.entries[idx].encode(&mut buf[offset..offset + RECORD_SIZE]);
            }
            dev.write_block(self.layout.file_table_lba + blk, &buf)?;
        }

        Ok(())
    }

    /// Look up a file by name. Returns the slot index and a reference.
    pub fn lookup(&self, name: &[u8]) -> Option<(usize, &FileRecord)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.used && e.name_bytes() == name)
    }

    /// First slot not in use.
    pub fn first_free_slot(&self) -> Option<usize> {
        self.entries.iter().position(|e| !e.used)
    }

    /// Get a reference to a used record by index.
    pub fn get(&self, index: usize) -> Option<&FileRecord> {
        self.entries.get(index).filter(|e| e.used)
    }

    /// Overwrite slot `index` with `record`.
    pub fn put(&mut self, index: usize, record: FileRecord) {
        self.entries[index] = record;
    }

    /// Fill a slot with a new used record.
    pub fn occupy(&mut self, index: usize, name: &[u8], start: u32, size: u32) {
        let entry = &mut self.entries[index];
        *entry = FileRecord::empty();
        entry.set_name(name);
        entry.start = start;
        entry.size = size;
        entry.used = true;
    }

    /// Mark a slot unused, clearing name and size. Returns the old record.
    pub fn clear(&mut self, index: usize) -> Option<FileRecord> {
        let entry = self.get(index).copied()?;
        self.entries[index] = FileRecord::empty();
        Some(entry)
    }

    /// Used records in table order.
    pub fn iter_used(&self) -> impl Iterator<Item = (usize, &FileRecord)> {
        self.entries.iter().enumerate().filter(|(_, e)| e.used)
    }

    pub fn used_count(&self) -> usize {
        self.entries.iter().filter(|e| e.used).count()
    }
}
