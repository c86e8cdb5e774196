/// BlockDevice trait: abstracts single-block I/O for testing.
///
/// Both the ATA PIO driver and a RAM-backed mock implement this trait.
/// The bitmap allocator, file table and FlatFs use this instead of the
/// driver directly.
use core::fmt;

use crate::config::BLOCK_SIZE;

/// One block worth of bytes.
pub type Block = [u8; BLOCK_SIZE];

/// Which bounded poll gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStage {
    /// BSY never cleared before the command. Nothing was sent.
    Ready,
    /// DRQ never came after the write command. No data was sent.
    DataRequest,
    /// BSY never cleared after the data. The block contents are unknown.
    Completion,
}

/// Errors reported by a block device. The device never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// A bounded status poll exceeded its iteration limit.
    Timeout(PollStage),
    /// LBA is outside what the device can address.
    OutOfRange(u32),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Timeout(PollStage::Ready) => {
                write!(f, "device timeout waiting for ready")
            }
            DeviceError::Timeout(PollStage::DataRequest) => {
                write!(f, "device timeout waiting for data request")
            }
            DeviceError::Timeout(PollStage::Completion) => {
                write!(f, "device timeout after data transfer (block state unknown)")
            }
            DeviceError::OutOfRange(lba) => write!(f, "lba {} out of range", lba),
        }
    }
}

/// Abstract block device for storage operations.
pub trait BlockDevice {
    /// Read the block at `lba` into `buf`.
    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), DeviceError>;

    /// Write `buf` to the block at `lba`.
    ///
    /// On `Err(Timeout(Completion))` the bytes may or may not have landed.
    fn write_block(&mut self, lba: u32, buf: &Block) -> Result<(), DeviceError>;

    /// Total number of addressable blocks.
    fn total_blocks(&self) -> u32;
}
