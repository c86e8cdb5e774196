/// Boot-sector geometry, read once at mount.
///
/// The flat file table does not depend on any of this. It is decoded so
/// the kernel can report what else lives on the disk image.
use log::info;

use crate::config::BLOCK_SIZE;
use super::block_device::{Block, BlockDevice, DeviceError};

/// Fields of a FAT-style BIOS parameter block at LBA 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootGeometry {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    /// Blocks before the first allocation table.
    pub reserved_sectors: u16,
    /// Number of allocation tables.
    pub fat_count: u8,
    /// Blocks per allocation table.
    pub sectors_per_fat: u32,
}

impl BootGeometry {
    /// Decode a boot sector. Returns None without the 0x55AA signature.
    pub fn parse(sector: &Block) -> Option<Self> {
        if sector[510] != 0x55 || sector[511] != 0xAA {
            return None;
        }

        let le16 = |off: usize| u16::from_le_bytes([sector[off], sector[off + 1]]);

        // FAT12/16 keep the table size at 0x16; FAT32 zeroes it and uses 0x24.
        let sectors_per_fat = match le16(0x16) {
            0 => u32::from_le_bytes([sector[0x24], sector[0x25], sector[0x26], sector[0x27]]),
            n => n as u32,
        };

        Some(Self {
            bytes_per_sector: le16(0x0B),
            sectors_per_cluster: sector[0x0D],
            reserved_sectors: le16(0x0E),
            fat_count: sector[0x10],
            sectors_per_fat,
        })
    }

    /// Read LBA 0 and decode it.
    pub fn read(dev: &mut dyn BlockDevice) -> Result<Option<Self>, DeviceError> {
        let mut sector: Block = [0u8; BLOCK_SIZE];
        dev.read_block(0, &mut sector)?;

        let geometry = Self::parse(&sector);
        match &geometry {
            Some(g) => info!(
                "boot sector: {} bytes/sector, {} reserved, {} FATs x {} sectors",
                g.bytes_per_sector, g.reserved_sectors, g.fat_count, g.sectors_per_fat
            ),
            None => info!("boot sector: no BIOS parameter block"),
        }
        Ok(geometry)
    }
}
