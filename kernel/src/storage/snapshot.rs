/// Whole-filesystem dump into RAM and replay.
///
/// Used to migrate files across a layout change: snapshot, reformat or
/// move the table, restore. The snapshot lives only in memory; a power
/// loss between the two halves loses every captured file.
use alloc::string::String;
use alloc::vec::Vec;

use log::{info, warn};

use crate::config::MAX_SNAPSHOT_FILE_SIZE;
use super::block_device::BlockDevice;
use super::error::FsError;
use super::flat_fs::FlatFs;

/// One captured file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub content: Vec<u8>,
}

/// Files taken off the disk by `snapshot_and_clear`.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    /// Captured and deleted, in table order.
    pub files: Vec<SnapshotEntry>,
    /// Still on disk: too large to capture, or the delete failed.
    pub left_on_disk: Vec<String>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total bytes held in memory.
    pub fn bytes(&self) -> usize {
        self.files.iter().map(|e| e.content.len()).sum()
    }
}

impl<D: BlockDevice> FlatFs<D> {
    /// Reload the table, read every file into memory and delete it.
    ///
    /// All reads happen before the first delete, so a read failure leaves
    /// the disk untouched. Files over `MAX_SNAPSHOT_FILE_SIZE` are skipped
    /// whole rather than truncated.
    pub fn snapshot_and_clear(&mut self) -> Result<Snapshot, FsError> {
        self.load()?;

        let mut snapshot = Snapshot::default();
        let mut captured = Vec::new();

        for info in self.list() {
            if info.size as usize > MAX_SNAPSHOT_FILE_SIZE {
                warn!("snapshot: skipping {} ({} bytes)", info.name, info.size);
                snapshot.left_on_disk.push(info.name);
                continue;
            }
            let content = self.read(&info.name)?;
            captured.push(SnapshotEntry { name: info.name, content });
        }

        for entry in captured {
            match self.delete(&entry.name) {
                Ok(()) => snapshot.files.push(entry),
                Err(e) => {
                    warn!("snapshot: {} kept on disk: {}", entry.name, e);
                    snapshot.left_on_disk.push(entry.name);
                }
            }
        }

        info!(
            "snapshot: captured {} files ({} bytes), {} left on disk",
            snapshot.len(),
            snapshot.bytes(),
            snapshot.left_on_disk.len()
        );
        Ok(snapshot)
    }

    /// Write every captured file back through `write`. Stops at the first
    /// failure; files restored before it stay restored.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<usize, FsError> {
        for (i, entry) in snapshot.files.iter().enumerate() {
            if let Err(e) = self.write(&entry.name, &entry.content) {
                warn!("restore: {} failed after {} files: {}", entry.name, i, e);
                return Err(e);
            }
        }
        info!("restore: {} files written", snapshot.len());
        Ok(snapshot.len())
    }
}
