//! Disk sources
//!
//! A disk is a finite, byte-addressed, read-only source: one member image of
//! the array. Disks are opened by the caller and lent to the reconstruction
//! layer, which never closes them.

mod file;
mod memory;

pub use file::FileDisk;
pub use memory::MemDisk;

use crate::error::{Error, Result};

/// Byte-addressed read-only source
///
/// `read_at` is positional so that several readers can share one disk.
/// Implementations that wrap a cursor-based handle must serialize their own
/// seek and read.
pub trait Disk: Send + Sync {
    /// Read up to `buf.len()` bytes at `offset`
    ///
    /// Returns fewer bytes only at end of data, and 0 past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Size in bytes, if known
    fn size(&self) -> Option<u64>;

    /// Identifier used in logs and reports
    fn name(&self) -> &str;
}

impl<D: Disk + ?Sized> Disk for Box<D> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Ordered member list of one array
///
/// Built once. At most one member may be missing; its content is
/// reconstructed from the others by index-based exclusion.
pub struct DiskSet<'a, D: Disk + ?Sized = dyn Disk> {
    slots: Vec<Option<&'a D>>,
    missing: Option<usize>,
}

impl<'a, D: Disk + ?Sized> DiskSet<'a, D> {
    /// Create a set where every member is present
    pub fn new<I>(disks: I) -> Self
    where
        I: IntoIterator<Item = &'a D>,
    {
        DiskSet {
            slots: disks.into_iter().map(Some).collect(),
            missing: None,
        }
    }

    /// Create a set whose last member is missing
    ///
    /// # Errors
    /// Returns error if fewer than two members are present
    pub fn with_missing<I>(disks: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a D>,
    {
        let mut slots: Vec<Option<&'a D>> = disks.into_iter().map(Some).collect();
        slots.push(None);
        Self::from_slots(slots)
    }

    /// Create a set from explicit slots, `None` marking the missing member
    ///
    /// # Errors
    /// Returns error if more than one slot is empty or fewer than two
    /// members are present
    pub fn from_slots(slots: Vec<Option<&'a D>>) -> Result<Self> {
        let mut missing = None;
        for (index, slot) in slots.iter().enumerate() {
            if slot.is_none() {
                if let Some(first) = missing {
                    return Err(Error::InvalidGeometry(format!(
                        "disks {} and {} are both missing; only one disk can be reconstructed",
                        first, index
                    )));
                }
                missing = Some(index);
            }
        }

        let present = slots.len() - usize::from(missing.is_some());
        if present < 2 {
            return Err(Error::InvalidGeometry(format!(
                "an array needs at least two present disks, got {}",
                present
            )));
        }

        Ok(DiskSet { slots, missing })
    }

    /// Number of members, including a missing one
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the set has no members
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Index of the missing member
    pub fn missing(&self) -> Option<usize> {
        self.missing
    }

    /// Get a present member
    pub fn get(&self, index: usize) -> Option<&'a D> {
        self.slots.get(index).copied().flatten()
    }

    /// Present members other than `index`
    pub fn siblings(&self, index: usize) -> impl Iterator<Item = (usize, &'a D)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(i, _)| *i != index)
            .filter_map(|(i, slot)| slot.map(|disk| (i, disk)))
    }

    /// Size of the first present member
    pub fn first_size(&self) -> Option<u64> {
        self.slots.iter().flatten().next().and_then(|disk| disk.size())
    }

    /// Display name for a member, `"missing"` for the reconstructed one
    pub fn label(&self, index: usize) -> &str {
        match self.get(index) {
            Some(disk) => disk.name(),
            None => "missing",
        }
    }
}
