/// Storage-level errors surfaced to callers of FlatFs.
use core::fmt;

use super::block_alloc::AllocError;
use super::block_device::DeviceError;

/// Why a file operation did not happen.
///
/// Every variant is recoverable: the engine stays usable and its in-memory
/// state matches the last successful `save`. Only `Torn` means the disk
/// may have moved on without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// A block read or write failed before anything the table points at
    /// changed. Surfaced as-is, never retried.
    Device(DeviceError),
    /// A block write failed after on-disk state the table points at had
    /// started to change: a file rewritten in place is partly new, or the
    /// table block holding the record may or may not have landed. Do not
    /// trust the file until it is rewritten or the table is reloaded.
    Torn(DeviceError),
    /// No contiguous run of the requested size exists.
    NoFreeSpace,
    /// All file table slots are in use.
    NoFreeSlots,
    /// No used record has this name.
    NotFound,
    /// Name is empty, too long, or contains bytes outside 0x21..=0x7E.
    InvalidName,
}

impl FsError {
    /// True when the disk may not match the in-memory table.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, FsError::Torn(_))
    }
}

impl From<DeviceError> for FsError {
    fn from(e: DeviceError) -> Self {
        FsError::Device(e)
    }
}

impl From<AllocError> for FsError {
    fn from(e: AllocError) -> Self {
        match e {
            AllocError::NoFreeSpace | AllocError::InvalidSize => FsError::NoFreeSpace,
        }
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Device(e) => write!(f, "{}", e),
            FsError::Torn(e) => write!(f, "{} (on-disk state uncertain)", e),
            FsError::NoFreeSpace => write!(f, "no free sectors"),
            FsError::NoFreeSlots => write!(f, "no free slots"),
            FsError::NotFound => write!(f, "file not found"),
            FsError::InvalidName => write!(f, "invalid file name"),
        }
    }
}
