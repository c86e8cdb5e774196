//! Kernel configuration: on-disk layout, device polling bounds, sizes.
//!
//! Everything here is a compile-time constant or a small `Copy` struct with
//! a reference default. The storage engine and the ATA driver take these by
//! value so tests can run against a smaller or shifted layout.

/// Bytes per block on the storage device.
pub const BLOCK_SIZE: usize = 512;

/// Number of records in the file table.
pub const MAX_FILES: usize = 128;

/// Size of one serialized file record.
pub const RECORD_SIZE: usize = 32;

/// Blocks occupied by the serialized file table (128 × 32 bytes).
pub const FILE_TABLE_BLOCKS: u32 = (MAX_FILES * RECORD_SIZE / BLOCK_SIZE) as u32;

/// First LBA of the file table in the reference layout.
pub const FILE_TABLE_LBA: u32 = 4096;

/// Addressable blocks tracked by the bitmap in the reference layout.
pub const TOTAL_BLOCKS: u32 = 65536;

/// Files larger than this are skipped by `snapshot_and_clear`.
pub const MAX_SNAPSHOT_FILE_SIZE: usize = 32 * 1024;

/// Kernel heap arena size.
pub const KERNEL_HEAP_SIZE: usize = 8 * 1024 * 1024;

static_assertions::const_assert_eq!(FILE_TABLE_BLOCKS, 8);

/// Where the file table and data region live on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    /// First block of the 8-block file table region.
    pub file_table_lba: u32,
    /// Blocks covered by the bitmap; the data region ends here.
    pub total_blocks: u32,
}

impl StorageLayout {
    /// The bit-exact layout: table at 4096..4104, data at 4104..65536.
    pub const REFERENCE: Self = Self {
        file_table_lba: FILE_TABLE_LBA,
        total_blocks: TOTAL_BLOCKS,
    };

    /// First LBA the allocator may hand out.
    pub const fn data_start_lba(&self) -> u32 {
        self.file_table_lba + FILE_TABLE_BLOCKS
    }

    /// Number of blocks in the data region.
    pub const fn data_block_count(&self) -> u32 {
        self.total_blocks.saturating_sub(self.data_start_lba())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::REFERENCE
    }
}

/// Iteration bounds for the ATA write path.
///
/// These are spin counts, not time. A faster CPU exhausts them sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    /// Waiting for BSY to clear before a write command is issued.
    pub ready: u32,
    /// Waiting for DRQ after WRITE SECTORS.
    pub data_request: u32,
    /// Waiting for BSY to clear after the data has been streamed.
    pub completion: u32,
}

impl PollLimits {
    pub const DEFAULT: Self = Self {
        ready: 1_000_000,
        data_request: 1_000_000,
        completion: 1_000_000,
    };
}

impl Default for PollLimits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Maximum log level, chosen at build time through the `LOG` variable.
pub fn log_level() -> log::LevelFilter {
    match option_env!("LOG") {
        Some("ERROR") => log::LevelFilter::Error,
        Some("WARN") => log::LevelFilter::Warn,
        Some("DEBUG") => log::LevelFilter::Debug,
        Some("TRACE") => log::LevelFilter::Trace,
        Some("OFF") => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}
