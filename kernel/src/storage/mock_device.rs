/// RAM-backed mock block device for testing.
///
/// Simulates a block device entirely in memory. Blocks that were never
/// written read back as zeros, so a full 65536-block device costs only the
/// blocks a test actually touches.
use alloc::collections::BTreeMap;

use crate::config::BLOCK_SIZE;
use super::block_device::{Block, BlockDevice, DeviceError, PollStage};

/// Pending write failure, armed by a test.
#[derive(Clone, Copy)]
struct InjectedFault {
    /// Successful writes still allowed before the fault fires.
    remaining: u32,
    stage: PollStage,
}

/// RAM-backed block device.
pub struct RamDisk {
    blocks: BTreeMap<u32, Block>,
    total_blocks: u32,
    write_count: u64,
    fault: Option<InjectedFault>,
}

impl RamDisk {
    /// Create a zero-filled RAM disk of `total_blocks` blocks.
    pub fn new(total_blocks: u32) -> Self {
        Self {
            blocks: BTreeMap::new(),
            total_blocks,
            write_count: 0,
            fault: None,
        }
    }

    /// Let `after` more writes succeed, then fail every write with a
    /// timeout at `stage` until `clear_fault` is called.
    pub fn fail_writes_after(&mut self, after: u32, stage: PollStage) {
        self.fault = Some(InjectedFault { remaining: after, stage });
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// How many writes reached the medium (for testing).
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// Contents of a block without going through the trait.
    pub fn read_raw(&self, lba: u32) -> Block {
        self.blocks.get(&lba).copied().unwrap_or([0u8; BLOCK_SIZE])
    }

    /// Store a block without going through the trait (for seeding tests).
    pub fn write_raw(&mut self, lba: u32, data: &Block) {
        self.blocks.insert(lba, *data);
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), DeviceError> {
        if lba >= self.total_blocks {
            return Err(DeviceError::OutOfRange(lba));
        }
        *buf = self.read_raw(lba);
        Ok(())
    }

    fn write_block(&mut self, lba: u32, buf: &Block) -> Result<(), DeviceError> {
        if lba >= self.total_blocks {
            return Err(DeviceError::OutOfRange(lba));
        }

        if let Some(fault) = self.fault.as_mut() {
            if fault.remaining == 0 {
                // A completion timeout means the data did go out.
                if fault.stage == PollStage::Completion {
                    self.blocks.insert(lba, *buf);
                    self.write_count += 1;
                }
                return Err(DeviceError::Timeout(fault.stage));
            }
            fault.remaining -= 1;
        }

        self.blocks.insert(lba, *buf);
        self.write_count += 1;
        Ok(())
    }

    fn total_blocks(&self) -> u32 {
        self.total_blocks
    }
}
