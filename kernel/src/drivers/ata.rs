/// ATA PIO driver for the primary bus master drive, 28-bit LBA.
///
/// One sector per command, polled, no interrupts. Reads wait for DRQ with
/// no bound at all: a dead drive hangs the caller. Writes poll under three
/// iteration bounds (`PollLimits`) and report which one ran out. Nothing
/// is ever retried here; the storage engine decides what a failure means.
use bitflags::bitflags;

use crate::arch::x86_64::{inb, inw, outb, outw};
use crate::config::PollLimits;
use crate::storage::{Block, BlockDevice, DeviceError, PollStage};

/// Primary bus command block registers.
mod regs {
    pub const DATA: u16 = 0x1F0;
    pub const SECTOR_COUNT: u16 = 0x1F2;
    pub const LBA_LOW: u16 = 0x1F3;
    pub const LBA_MID: u16 = 0x1F4;
    pub const LBA_HIGH: u16 = 0x1F5;
    pub const DRIVE_HEAD: u16 = 0x1F6;
    pub const STATUS: u16 = 0x1F7; // read
    pub const COMMAND: u16 = 0x1F7; // write
}

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_WRITE_SECTORS: u8 = 0x30;

/// Master drive, LBA addressing; low nibble carries LBA bits 24..28.
const DRIVE_MASTER_LBA: u8 = 0xE0;

/// Highest LBA expressible in 28 bits, plus one.
const LBA28_LIMIT: u32 = 1 << 28;

bitflags! {
    /// Status register (0x1F7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        const ERR = 0x01;
        const DRQ = 0x08;
        const SRV = 0x10;
        const DF  = 0x20;
        const RDY = 0x40;
        const BSY = 0x80;
    }
}

/// Polled ATA block device.
pub struct AtaPio {
    limits: PollLimits,
    total_blocks: u32,
}

impl AtaPio {
    /// Driver for the primary master, exposing `total_blocks` blocks.
    pub const fn new(limits: PollLimits, total_blocks: u32) -> Self {
        Self { limits, total_blocks }
    }

    fn status(&self) -> Status {
        Status::from_bits_retain(inb(regs::STATUS))
    }

    /// Spin until `done(status)` holds, at most `limit` times.
    fn poll(&self, limit: u32, done: impl Fn(Status) -> bool) -> bool {
        for _ in 0..limit {
            if done(self.status()) {
                return true;
            }
            core::hint::spin_loop();
        }
        false
    }

    fn check_lba(&self, lba: u32) -> Result<(), DeviceError> {
        if lba >= self.total_blocks || lba >= LBA28_LIMIT {
            return Err(DeviceError::OutOfRange(lba));
        }
        Ok(())
    }

    /// Program drive/head, sector count and LBA, then issue `command`.
    fn select(&self, lba: u32, command: u8) {
        outb(regs::DRIVE_HEAD, DRIVE_MASTER_LBA | ((lba >> 24) & 0x0F) as u8);
        outb(regs::SECTOR_COUNT, 1);
        outb(regs::LBA_LOW, lba as u8);
        outb(regs::LBA_MID, (lba >> 8) as u8);
        outb(regs::LBA_HIGH, (lba >> 16) as u8);
        outb(regs::COMMAND, command);
    }
}

impl BlockDevice for AtaPio {
    fn read_block(&mut self, lba: u32, buf: &mut Block) -> Result<(), DeviceError> {
        self.check_lba(lba)?;
        self.select(lba, CMD_READ_SECTORS);

        // Unbounded: a drive that never raises DRQ hangs here.
        while !self.status().contains(Status::DRQ) {
            core::hint::spin_loop();
        }

        for pair in buf.chunks_exact_mut(2) {
            pair.copy_from_slice(&inw(regs::DATA).to_le_bytes());
        }
        Ok(())
    }

    fn write_block(&mut self, lba: u32, buf: &Block) -> Result<(), DeviceError> {
        self.check_lba(lba)?;

        if !self.poll(self.limits.ready, |s| !s.contains(Status::BSY)) {
            return Err(DeviceError::Timeout(PollStage::Ready));
        }

        self.select(lba, CMD_WRITE_SECTORS);

        if !self.poll(self.limits.data_request, |s| s.contains(Status::DRQ)) {
            return Err(DeviceError::Timeout(PollStage::DataRequest));
        }

        for pair in buf.chunks_exact(2) {
            outw(regs::DATA, u16::from_le_bytes([pair[0], pair[1]]));
        }

        // Data is on the wire; from here a timeout leaves the block unknown.
        if !self.poll(self.limits.completion, |s| !s.contains(Status::BSY)) {
            return Err(DeviceError::Timeout(PollStage::Completion));
        }

        Ok(())
    }

    fn total_blocks(&self) -> u32 {
        self.total_blocks
    }
}
