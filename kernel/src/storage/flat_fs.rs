/// FlatFs: the storage engine behind `list`/`read`/`write`/`delete`.
///
/// Owns the block device, the cached file table and the free-space bitmap
/// as one unit. Anything that shares the engine across threads must lock
/// the whole struct: updating the table without the bitmap (or the other
/// way round) breaks the no-overlap invariant.
///
/// Write path:
/// - shrink or same size: rewrite in place, `start` does not move
/// - grow: write a fresh run first, switch the record over, then free
///   the old run
/// - every step that can fail happens before the in-memory record or
///   bitmap is touched, or is undone if `save` fails
///
/// Durability: data blocks go out before the table, and the table block
/// holding the changed record goes out last. If power is lost before that
/// block lands, the table still describes the previous version. There is no
/// commit record to detect a torn final block.
use alloc::vec::Vec;

use log::{debug, info, warn};

use crate::config::{StorageLayout, BLOCK_SIZE};
use super::block_alloc::BlockBitmap;
use super::block_device::{Block, BlockDevice, DeviceError, PollStage};
use super::error::FsError;
use super::file_table::{blocks_for, is_valid_name, FileInfo, FileRecord, FileTable};
use super::mount::BootGeometry;

/// Space accounting, for `df`-style reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub files: usize,
    pub free_blocks: u32,
    pub data_blocks: u32,
}

/// Replace every two-byte `\` `n` escape with a single line feed.
///
/// Content reaches the engine through a line-oriented input path, so real
/// line breaks arrive escaped.
pub fn normalize_line_breaks(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut i = 0;
    while i < content.len() {
        if content[i] == b'\\' && content.get(i + 1) == Some(&b'n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(content[i]);
            i += 1;
        }
    }
    out
}

/// Map a failed table save to the error the caller sees.
///
/// The changed record's block is written last, so anything short of a
/// completion timeout stopped before that record could reach the disk.
fn save_error(e: DeviceError) -> FsError {
    match e {
        DeviceError::Timeout(PollStage::Completion) => FsError::Torn(e),
        _ => FsError::Device(e),
    }
}

/// The mounted flat filesystem.
pub struct FlatFs<D: BlockDevice> {
    dev: D,
    layout: StorageLayout,
    table: FileTable,
    bitmap: BlockBitmap,
    geometry: Option<BootGeometry>,
}

impl<D: BlockDevice> FlatFs<D> {
    /// Read the boot sector geometry, load the file table and rebuild the
    /// bitmap from it.
    pub fn mount(mut dev: D, layout: StorageLayout) -> Result<Self, FsError> {
        if dev.total_blocks() < layout.total_blocks {
            return Err(DeviceError::OutOfRange(layout.total_blocks.saturating_sub(1)).into());
        }
        let geometry = BootGeometry::read(&mut dev)?;
        let mut fs = Self::unmounted(dev, layout);
        fs.geometry = geometry;
        fs.load()?;
        info!(
            "flatfs: mounted, {} files, {} of {} data blocks free",
            fs.table.used_count(),
            fs.bitmap.free_count(),
            layout.data_block_count()
        );
        Ok(fs)
    }

    /// An engine with an empty table and bitmap. Call `load` before use
    /// unless the device is known to be blank.
    pub fn unmounted(dev: D, layout: StorageLayout) -> Self {
        Self {
            dev,
            layout,
            table: FileTable::new(layout),
            bitmap: BlockBitmap::new(layout),
            geometry: None,
        }
    }

    /// Replace the in-memory table with the one on disk and rebuild the
    /// bitmap. On error the previous in-memory state is kept.
    pub fn load(&mut self) -> Result<(), FsError> {
        let table = FileTable::load(&mut self.dev, self.layout)?;
        self.table = table;
        self.rebuild_bitmap();
        Ok(())
    }

    /// Recompute the bitmap from the current table.
    pub fn rebuild_bitmap(&mut self) {
        self.bitmap.rebuild(&self.table);
    }

    // ---- list / stat ----

    /// Used files in table order.
    pub fn list(&self) -> Vec<FileInfo> {
        self.table.iter_used().map(|(_, r)| FileInfo::from(r)).collect()
    }

    pub fn stat(&self, name: &str) -> Result<FileInfo, FsError> {
        self.table
            .lookup(name.as_bytes())
            .map(|(_, r)| FileInfo::from(r))
            .ok_or(FsError::NotFound)
    }

    pub fn usage(&self) -> Usage {
        Usage {
            files: self.table.used_count(),
            free_blocks: self.bitmap.free_count(),
            data_blocks: self.layout.data_block_count(),
        }
    }

    // ---- read ----

    /// Read the whole file.
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, FsError> {
        let rec = *self.table.lookup(name.as_bytes()).ok_or(FsError::NotFound)?.1;

        let size = rec.size as usize;
        let mut out = Vec::with_capacity(size);
        let mut buf: Block = [0u8; BLOCK_SIZE];

        for i in 0..rec.block_count() {
            self.dev.read_block(rec.start + i, &mut buf)?;
            let take = (size - out.len()).min(BLOCK_SIZE);
            out.extend_from_slice(&buf[..take]);
        }

        Ok(out)
    }

    // ---- delete ----

    /// Remove a file and free its blocks immediately.
    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let (idx, rec) = self.table.lookup(name.as_bytes()).ok_or(FsError::NotFound)?;
        let rec = *rec;

        self.table.clear(idx);
        self.bitmap.free_range(rec.start, rec.block_count());

        if let Err(e) = self.table.save(&mut self.dev, idx) {
            warn!("flatfs: delete {}: table save failed: {}", name, e);
            self.table.put(idx, rec);
            self.bitmap.mark_range(rec.start, rec.block_count());
            return Err(save_error(e));
        }

        debug!("flatfs: deleted {} ({} blocks at {})", name, rec.block_count(), rec.start);
        Ok(())
    }

    // ---- write ----

    /// Create or replace a file with `content` (after line-break
    /// normalization).
    ///
    /// On `Err`, the in-memory record is what it was before the call. If
    /// the error is `FsError::Torn`, the disk may not agree: an in-place
    /// rewrite stopped partway through the file's own blocks, or the final
    /// table block timed out after its data was sent. Blocks the disk might
    /// still reference stay reserved until the next `load`.
    pub fn write(&mut self, name: &str, content: &[u8]) -> Result<(), FsError> {
        if !is_valid_name(name.as_bytes()) {
            return Err(FsError::InvalidName);
        }

        let data = normalize_line_breaks(content);
        let len = u32::try_from(data.len()).map_err(|_| FsError::NoFreeSpace)?;
        let blocks = blocks_for(len);

        let existing = self.table.lookup(name.as_bytes()).map(|(i, r)| (i, *r));
        let result = match existing {
            Some((idx, old)) if blocks <= old.block_count() => {
                self.rewrite_in_place(idx, old, &data, len)
            }
            Some((idx, old)) => self.relocate(idx, old, &data, len),
            None => self.create(name.as_bytes(), &data, len),
        };

        match &result {
            Ok(()) => debug!("flatfs: wrote {} ({} bytes, {} blocks)", name, len, blocks),
            Err(e) => warn!("flatfs: write {} failed: {}", name, e),
        }
        result
    }

    /// New contents fit in the blocks the file already owns.
    fn rewrite_in_place(
        &mut self,
        idx: usize,
        old: FileRecord,
        data: &[u8],
        len: u32,
    ) -> Result<(), FsError> {
        let blocks = blocks_for(len);
        let old_blocks = old.block_count();
        let tail_start = old.start + blocks;
        let tail_len = old_blocks - blocks;

        // New data, then zeros over the tail. Once one block has gone out,
        // the file's contents are no longer the old ones.
        if let Err((written, e)) = self.write_run(old.start, data, old_blocks) {
            return Err(match e {
                DeviceError::Timeout(PollStage::Completion) => FsError::Torn(e),
                _ if written > 0 => FsError::Torn(e),
                _ => FsError::Device(e),
            });
        }

        let mut updated = old;
        updated.size = len;
        self.table.put(idx, updated);
        self.bitmap.free_range(tail_start, tail_len);

        if let Err(e) = self.table.save(&mut self.dev, idx) {
            self.table.put(idx, old);
            self.bitmap.mark_range(tail_start, tail_len);
            return Err(save_error(e));
        }
        Ok(())
    }

    /// File grows: move it to a fresh run. The old run stays allocated
    /// (and intact) until the new one is fully written.
    fn relocate(
        &mut self,
        idx: usize,
        old: FileRecord,
        data: &[u8],
        len: u32,
    ) -> Result<(), FsError> {
        let blocks = blocks_for(len);
        let new_start = self.bitmap.allocate_contiguous(blocks)?;

        // Nothing references the new run yet, so a failure here is clean.
        if let Err((_, e)) = self.write_run(new_start, data, blocks) {
            self.bitmap.free_range(new_start, blocks);
            return Err(e.into());
        }

        let mut updated = old;
        updated.start = new_start;
        updated.size = len;
        self.table.put(idx, updated);
        self.bitmap.free_range(old.start, old.block_count());

        if let Err(e) = self.table.save(&mut self.dev, idx) {
            let err = save_error(e);
            self.table.put(idx, old);
            self.bitmap.mark_range(old.start, old.block_count());
            // The disk may already point at the new run.
            if !err.is_ambiguous() {
                self.bitmap.free_range(new_start, blocks);
            }
            return Err(err);
        }

        debug!("flatfs: relocated slot {} from {} to {}", idx, old.start, new_start);
        Ok(())
    }

    /// First write of a new name.
    fn create(&mut self, name: &[u8], data: &[u8], len: u32) -> Result<(), FsError> {
        // Check for a slot before allocating so a full table never leaks blocks.
        let slot = self.table.first_free_slot().ok_or(FsError::NoFreeSlots)?;

        let blocks = blocks_for(len);
        let start = if blocks == 0 {
            self.layout.data_start_lba()
        } else {
            self.bitmap.allocate_contiguous(blocks)?
        };

        if let Err((_, e)) = self.write_run(start, data, blocks) {
            self.bitmap.free_range(start, blocks);
            return Err(e.into());
        }

        self.table.occupy(slot, name, start, len);

        if let Err(e) = self.table.save(&mut self.dev, slot) {
            let err = save_error(e);
            self.table.clear(slot);
            if !err.is_ambiguous() {
                self.bitmap.free_range(start, blocks);
            }
            return Err(err);
        }
        Ok(())
    }

    /// Write `data` over `blocks` consecutive blocks from `start`,
    /// zero-filling past its end. Stops at the first failure and reports how
    /// many blocks went out before it.
    fn write_run(&mut self, start: u32, data: &[u8], blocks: u32) -> Result<(), (u32, DeviceError)> {
        let mut buf: Block = [0u8; BLOCK_SIZE];
        let mut chunks = data.chunks(BLOCK_SIZE);
        for i in 0..blocks {
            let chunk = chunks.next().unwrap_or(&[]);
            buf[..chunk.len()].copy_from_slice(chunk);
            buf[chunk.len()..].fill(0);
            self.dev.write_block(start + i, &buf).map_err(|e| (i, e))?;
        }
        Ok(())
    }

    // ---- accessors ----

    pub fn geometry(&self) -> Option<&BootGeometry> {
        self.geometry.as_ref()
    }

    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    pub fn table(&self) -> &FileTable {
        &self.table
    }

    pub fn bitmap(&self) -> &BlockBitmap {
        &self.bitmap
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    /// Unmount, handing the device back.
    pub fn into_device(self) -> D {
        self.dev
    }
}
