//! Reconstructed logical stream over a striped disk set
//!
//! `RaidReader` presents the array as one contiguous, seekable byte stream.
//! Each read is split at block boundaries; every block is translated through
//! the period lookup table to a disk and physical offset, and fetched from
//! that disk, or rebuilt from parity when the disk is the missing member.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::disk::{Disk, DiskSet};
use crate::error::{Error, Result};

use super::geometry::{Geometry, Location};
use super::map::RaidMap;
use super::parity::{ParitySource, ShortReadPolicy};
use super::seek::{self, Whence};

/// Read-only view of a RAID-5 array as a single stream
pub struct RaidReader<'a, D: Disk + ?Sized = dyn Disk> {
    disks: DiskSet<'a, D>,
    map: RaidMap,
    geometry: Geometry,
    policy: ShortReadPolicy,
    /// Estimated end of the stream, as a raw cursor
    size: u64,
    /// Raw cursor, including the base offset
    cursor: u64,
}

impl<'a, D: Disk + ?Sized> RaidReader<'a, D> {
    /// Create a reader
    ///
    /// # Arguments
    /// * `disks` - Members in map column order, at most one missing
    /// * `block_size` - Bytes per block
    /// * `map` - Parsed interleave map
    /// * `base_offset` - Logical position reported as offset 0
    ///
    /// # Errors
    /// Returns error if the disk count does not match the map or the block
    /// size is zero
    pub fn new(disks: DiskSet<'a, D>, block_size: u64, map: RaidMap, base_offset: u64) -> Result<Self> {
        if disks.len() != map.disk_count() {
            return Err(Error::InvalidGeometry(format!(
                "map describes {} disks but {} were given",
                map.disk_count(),
                disks.len()
            )));
        }

        let geometry = Geometry::new(block_size, &map, base_offset)?;

        // Advisory only: disks rarely hold a whole number of periods
        let size = disks.first_size().unwrap_or(0) * geometry.physical_period;

        debug!(
            "RAID reader: {} disks (missing: {:?}), block size {}, period {}, offset {}, estimated size {}",
            disks.len(),
            disks.missing(),
            block_size,
            geometry.physical_period,
            base_offset,
            size
        );

        Ok(RaidReader {
            disks,
            map,
            geometry,
            policy: ShortReadPolicy::default(),
            size,
            cursor: base_offset,
        })
    }

    /// Set how parity reconstruction handles unequal sibling lengths
    pub fn with_policy(mut self, policy: ShortReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The member disks
    pub fn disks(&self) -> &DiskSet<'a, D> {
        &self.disks
    }

    /// The interleave map
    pub fn map(&self) -> &RaidMap {
        &self.map
    }

    /// Striping parameters
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Estimated raw size (advisory)
    pub fn estimated_size(&self) -> u64 {
        self.size
    }

    /// Position relative to the logical start
    pub fn position(&self) -> u64 {
        self.cursor - self.geometry.base_offset
    }

    /// Seek with a signed offset
    ///
    /// `Start` is relative to the base offset; `End` moves to the estimated
    /// size and ignores the offset.
    /// Returns the new position relative to the logical start.
    pub fn seek_to(&mut self, offset: i128, whence: Whence) -> Result<u64> {
        self.cursor = seek::resolve(
            self.cursor,
            self.geometry.base_offset,
            self.size,
            offset,
            whence,
        )?;
        Ok(self.position())
    }

    /// Physical location of a logical position
    ///
    /// Returns `None` past the addressable range.
    pub fn locate(&self, position: u64) -> Option<Location> {
        let cursor = self.geometry.base_offset.checked_add(position)?;
        self.geometry.locate(&self.map, cursor)
    }

    /// Read from at most one block at the cursor
    pub fn partial_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.read_block(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }

    /// Fetch the bytes of the single block containing `cursor`
    ///
    /// An address beyond 64 bits is end of data.
    fn read_block(&self, cursor: u64, buf: &mut [u8]) -> Result<usize> {
        let Some(loc) = self.geometry.locate(&self.map, cursor) else {
            trace!("Cursor {} has no physical address; treating as end of data", cursor);
            return Ok(0);
        };
        // The cursor itself must not wrap once the bytes are consumed
        let want = (buf.len() as u64)
            .min(loc.block_remaining)
            .min(u64::MAX - cursor) as usize;
        let buf = &mut buf[..want];
        let disk = loc.slot.disk;

        trace!(
            "Logical block {} (period {} position {}) -> disk {} block {} offset {}",
            loc.logical_block,
            loc.period_number,
            loc.period_position,
            disk,
            loc.physical_block,
            loc.physical_offset
        );

        match self.disks.get(disk) {
            Some(member) => member.read_at(loc.physical_offset, buf),
            None => ParitySource::new(&self.disks, disk)
                .with_policy(self.policy)
                .read_at(loc.physical_offset, buf),
        }
    }

    /// Fill `buf` from a raw cursor, stopping early only at end of data
    fn read_from(&self, mut cursor: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_block(cursor, &mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
            cursor += n as u64;
        }
        Ok(filled)
    }
}

impl<'a, D: Disk + ?Sized> Disk for RaidReader<'a, D> {
    /// Read at a position relative to the logical start
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        match self.geometry.base_offset.checked_add(offset) {
            Some(cursor) => self.read_from(cursor, buf),
            None => Ok(0),
        }
    }

    fn size(&self) -> Option<u64> {
        Some(self.size.saturating_sub(self.geometry.base_offset))
    }

    fn name(&self) -> &str {
        "raid"
    }
}

impl<'a, D: Disk + ?Sized> Read for RaidReader<'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_from(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }
}

impl<'a, D: Disk + ?Sized> Seek for RaidReader<'a, D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (offset, whence) = Whence::from_seek(pos);
        Ok(self.seek_to(offset, whence)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemDisk;

    fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
        a.iter().zip(b).map(|(x, y)| x ^ y).collect()
    }

    #[test]
    fn test_disk_count_must_match_map() {
        let d0 = MemDisk::new("d0", vec![0u8; 8]);
        let d1 = MemDisk::new("d1", vec![0u8; 8]);
        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let result = RaidReader::new(DiskSet::new([&d0, &d1]), 4, map, 0);
        assert!(matches!(result, Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_translation_correctness() {
        let a = b"AAAA".to_vec();
        let b = b"BBBB".to_vec();
        let d0 = MemDisk::new("d0", a.clone());
        let d1 = MemDisk::new("d1", b.clone());
        let d2 = MemDisk::new("d2", xor(&a, &b));

        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1, &d2]), 4, map, 0).unwrap();

        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"AAAABBBB");
    }

    #[test]
    fn test_parity_reconstruction() {
        let a = b"AAAA".to_vec();
        let b = b"BBBB".to_vec();
        let d0 = MemDisk::new("d0", a.clone());
        let d2 = MemDisk::new("d2", xor(&a, &b));

        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let disks = DiskSet::from_slots(vec![Some(&d0), None, Some(&d2)]).unwrap();
        let mut reader = RaidReader::new(disks, 4, map, 0).unwrap();

        reader.seek(SeekFrom::Start(4)).unwrap();
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"BBBB");
    }

    #[test]
    fn test_partial_read_stops_at_block() {
        let d0 = MemDisk::new("d0", b"0123".to_vec());
        let d1 = MemDisk::new("d1", b"4567".to_vec());
        let d2 = MemDisk::new("d2", vec![0u8; 4]);
        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1, &d2]), 4, map, 0).unwrap();

        reader.seek(SeekFrom::Start(2)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.partial_read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"23");
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.partial_read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"4567");
    }

    #[test]
    fn test_seek_boundary() {
        let d0 = MemDisk::new("d0", b"0123".to_vec());
        let d1 = MemDisk::new("d1", b"4567".to_vec());
        let d2 = MemDisk::new("d2", vec![0u8; 4]);
        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1, &d2]), 4, map, 0).unwrap();

        assert!(matches!(
            reader.seek_to(-1, Whence::Start),
            Err(Error::Seek { .. })
        ));
        assert_eq!(reader.seek_to(0, Whence::Start).unwrap(), 0);

        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"0");

        let err = reader.seek(SeekFrom::Current(-2)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_base_offset_shifts_origin() {
        let d0 = MemDisk::new("d0", b"0123".to_vec());
        let d1 = MemDisk::new("d1", b"4567".to_vec());
        let d2 = MemDisk::new("d2", vec![0u8; 4]);
        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1, &d2]), 4, map, 3).unwrap();

        // A fresh reader starts at the base offset
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"345");

        assert_eq!(reader.seek(SeekFrom::Start(1)).unwrap(), 1);
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"456");

        assert!(reader.seek_to(-1, Whence::Start).is_err());
        assert_eq!(Disk::size(&reader), Some(1));
    }

    #[test]
    fn test_eof_returns_short() {
        let d0 = MemDisk::new("d0", b"0123".to_vec());
        let d1 = MemDisk::new("d1", b"4567".to_vec());
        let d2 = MemDisk::new("d2", vec![0u8; 4]);
        let map = RaidMap::parse("0.1.P", 1, 3).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1, &d2]), 4, map, 0).unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"01234567");

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_past_addressable_range_is_eof() {
        let d0 = MemDisk::new("d0", vec![0u8; 12]);
        let d1 = MemDisk::new("d1", vec![0u8; 12]);
        let map = RaidMap::parse("P.1.P.2.0.P", 3, 2).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1]), 4, map, 0).unwrap();

        reader.seek(SeekFrom::Start(u64::MAX - 1)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.position(), u64::MAX - 1);
        assert!(reader.locate(u64::MAX - 1).is_none());
        assert_eq!(Disk::read_at(&reader, u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_cursor_does_not_wrap_at_top_of_range() {
        // With every block on row 0 the last cursor values stay addressable
        let d0 = MemDisk::new("d0", vec![0u8; 4]);
        let d1 = MemDisk::new("d1", vec![0u8; 4]);
        let map = RaidMap::parse("0.P", 1, 2).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1]), 1, map, 0).unwrap();

        reader.seek(SeekFrom::Start(u64::MAX - 1)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.position(), u64::MAX - 1);
    }

    #[test]
    fn test_seek_end_uses_estimate() {
        let d0 = MemDisk::new("d0", vec![0u8; 16]);
        let d1 = MemDisk::new("d1", vec![0u8; 16]);
        let d2 = MemDisk::new("d2", vec![0u8; 16]);
        let map = RaidMap::parse("0.1.P.2.P.3.P.4.5", 3, 3).unwrap();
        let mut reader = RaidReader::new(DiskSet::new([&d0, &d1, &d2]), 4, map, 0).unwrap();

        assert_eq!(reader.estimated_size(), 48);
        assert_eq!(reader.seek(SeekFrom::End(0)).unwrap(), 48);
        assert_eq!(reader.seek(SeekFrom::End(-8)).unwrap(), 48);
    }
}
