//! Block geometry and logical-to-physical address translation

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::map::{RaidMap, Slot};

/// Fixed striping parameters of one array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Bytes per block
    pub block_size: u64,
    /// Rows per period
    pub physical_period: u64,
    /// Number of disks, including a missing one
    pub disk_count: usize,
    /// Logical origin of the stream (e.g. start of a partition)
    pub base_offset: u64,
}

/// Where one logical byte lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Logical block number of the cursor
    pub logical_block: u64,
    /// Byte offset within the block
    pub block_offset: u64,
    /// Which repetition of the map
    pub period_number: u64,
    /// Logical block index within the period
    pub period_position: u64,
    /// Cell holding the block
    pub slot: Slot,
    /// Block number on the owning disk
    pub physical_block: u64,
    /// Byte offset on the owning disk
    pub physical_offset: u64,
    /// Bytes left in this block from the cursor
    pub block_remaining: u64,
}

impl Geometry {
    /// Derive the geometry for a parsed map
    pub fn new(block_size: u64, map: &RaidMap, base_offset: u64) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidGeometry(
                "block size must be greater than 0".to_string(),
            ));
        }

        Ok(Geometry {
            block_size,
            physical_period: map.physical_period() as u64,
            disk_count: map.disk_count(),
            base_offset,
        })
    }

    /// Logical blocks per period
    pub fn logical_period_size(&self) -> u64 {
        self.physical_period * (self.disk_count as u64 - 1)
    }

    /// Logical bytes per period
    pub fn logical_period_bytes(&self) -> u64 {
        self.logical_period_size() * self.block_size
    }

    /// Translate a raw cursor position to its physical location
    ///
    /// Returns `None` when the physical address does not fit in 64 bits.
    pub fn locate(&self, map: &RaidMap, cursor: u64) -> Option<Location> {
        let logical_block = cursor / self.block_size;
        let block_offset = cursor % self.block_size;

        let logical_period_size = self.logical_period_size();
        let period_position = logical_block % logical_period_size;
        let period_number = logical_block / logical_period_size;

        let slot = map.lookup()[period_position as usize];
        let physical_block = period_number
            .checked_mul(self.physical_period)?
            .checked_add(slot.row as u64)?;
        let physical_offset = self
            .block_size
            .checked_mul(physical_block)?
            .checked_add(block_offset)?;

        Some(Location {
            logical_block,
            block_offset,
            period_number,
            period_position,
            slot,
            physical_block,
            physical_offset,
            block_remaining: self.block_size - block_offset,
        })
    }

    /// Byte offset of a row of a period on every disk
    ///
    /// # Errors
    /// Returns `AddressOverflow` if the offset does not fit in 64 bits
    pub fn row_offset(&self, period_number: u64, row: u64) -> Result<u64> {
        period_number
            .checked_mul(self.physical_period)
            .and_then(|block| block.checked_add(row))
            .and_then(|block| block.checked_mul(self.block_size))
            .ok_or(Error::AddressOverflow {
                period: period_number,
                row,
            })
    }
}
