/// In-memory free-space bitmap.
///
/// One bit per block over the whole addressable range (0 = free,
/// 1 = used). Only the data region is ever handed out. The bitmap is
/// never written to disk: it is derived from the file table and rebuilt
/// every time the table is loaded.
use alloc::vec;
use alloc::vec::Vec;

use crate::config::StorageLayout;
use super::file_table::FileTable;

/// Bitmap block allocator with first-fit contiguous allocation.
#[derive(Clone, PartialEq, Eq)]
pub struct BlockBitmap {
    bitmap: Vec<u64>,
    total_blocks: u32,
    data_start: u32,
    free_count: u32,
}

impl BlockBitmap {
    /// All-free bitmap covering `layout.total_blocks` blocks.
    pub fn new(layout: StorageLayout) -> Self {
        let words = (layout.total_blocks as usize).div_ceil(64);
        Self {
            bitmap: vec![0u64; words],
            total_blocks: layout.total_blocks,
            data_start: layout.data_start_lba(),
            free_count: layout.data_block_count(),
        }
    }

    #[inline]
    fn bit(lba: u32) -> (usize, u64) {
        ((lba / 64) as usize, 1u64 << (lba % 64))
    }

    fn in_data_region(&self, lba: u32) -> bool {
        lba >= self.data_start && lba < self.total_blocks
    }

    /// Set or clear the bit for `lba`. Idempotent. LBAs past the end are
    /// ignored.
    pub fn mark(&mut self, lba: u32, used: bool) {
        if lba >= self.total_blocks {
            return;
        }
        let (word, mask) = Self::bit(lba);
        let was_used = self.bitmap[word] & mask != 0;
        if was_used == used {
            return;
        }

        if used {
            self.bitmap[word] |= mask;
        } else {
            self.bitmap[word] &= !mask;
        }

        if self.in_data_region(lba) {
            if used {
                self.free_count -= 1;
            } else {
                self.free_count += 1;
            }
        }
    }

    /// Is the block at `lba` free? Blocks past the end never are.
    pub fn is_free(&self, lba: u32) -> bool {
        if lba >= self.total_blocks {
            return false;
        }
        let (word, mask) = Self::bit(lba);
        self.bitmap[word] & mask == 0
    }

    /// Find the first run of `count` free blocks in the data region,
    /// scanning upward, mark it used and return its first LBA.
    ///
    /// On failure the bitmap is unchanged.
    pub fn allocate_contiguous(&mut self, count: u32) -> Result<u32, AllocError> {
        if count == 0 {
            return Err(AllocError::InvalidSize);
        }
        if self.free_count < count {
            return Err(AllocError::NoFreeSpace);
        }

        let mut start = self.data_start;
        while start as u64 + count as u64 <= self.total_blocks as u64 {
            let blocker = (start..start + count).find(|&lba| !self.is_free(lba));
            match blocker {
                // Restart just past the used block that broke the run.
                Some(used) => start = used + 1,
                None => {
                    for lba in start..start + count {
                        self.mark(lba, true);
                    }
                    return Ok(start);
                }
            }
        }

        Err(AllocError::NoFreeSpace)
    }

    /// Mark `count` blocks starting at `start` free.
    pub fn free_range(&mut self, start: u32, count: u32) {
        for lba in start..start.saturating_add(count) {
            self.mark(lba, false);
        }
    }

    /// Mark `count` blocks starting at `start` used.
    pub fn mark_range(&mut self, start: u32, count: u32) {
        for lba in start..start.saturating_add(count) {
            self.mark(lba, true);
        }
    }

    /// Clear everything, then mark the blocks of every used record.
    pub fn rebuild(&mut self, table: &FileTable) {
        self.bitmap.fill(0);
        self.free_count = self.total_blocks.saturating_sub(self.data_start);
        for (_, rec) in table.iter_used() {
            self.mark_range(rec.start, rec.block_count());
        }
    }

    /// Free blocks in the data region.
    pub fn free_count(&self) -> u32 {
        self.free_count
    }
}

/// Block allocation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    NoFreeSpace,
    InvalidSize,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::NoFreeSpace => write!(f, "no free sectors"),
            AllocError::InvalidSize => write!(f, "invalid allocation size"),
        }
    }
}
