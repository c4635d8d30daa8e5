//! Reconstruction of a missing disk from parity
//!
//! In a single-parity array every row XORs to zero across all disks, so the
//! content of any one disk is the XOR of the same bytes on all the others.

use std::io::{self, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::disk::{Disk, DiskSet};
use crate::error::{Error, Result};

use super::seek::{self, Whence};

/// What to do when siblings return unequal lengths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortReadPolicy {
    /// Report `Error::ShortRead`
    #[default]
    Fail,
    /// Return the common prefix and log a warning
    Truncate,
}

/// Siblings disagreed on how many bytes were available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortRead {
    /// Fewest bytes any sibling returned
    pub shortest: usize,
    /// Most bytes any sibling returned
    pub longest: usize,
}

/// Outcome of one reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconstruction {
    /// Valid reconstructed bytes at the front of the buffer
    pub len: usize,
    /// Set when the result is shorter than some sibling's data
    pub shortfall: Option<ShortRead>,
}

impl Reconstruction {
    /// Check if every sibling contributed the same length
    pub fn is_complete(&self) -> bool {
        self.shortfall.is_none()
    }
}

/// Synthesized content of the missing member of a disk set
pub struct ParitySource<'s, 'a, D: Disk + ?Sized = dyn Disk> {
    disks: &'s DiskSet<'a, D>,
    index: usize,
    policy: ShortReadPolicy,
    cursor: u64,
    name: String,
}

impl<'s, 'a, D: Disk + ?Sized> ParitySource<'s, 'a, D> {
    /// Create a parity source standing in for member `index`
    pub fn new(disks: &'s DiskSet<'a, D>, index: usize) -> Self {
        ParitySource {
            disks,
            index,
            policy: ShortReadPolicy::default(),
            cursor: 0,
            name: format!("parity[{}]", index),
        }
    }

    /// Set the short read policy
    pub fn with_policy(mut self, policy: ShortReadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Member index this source reconstructs
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current read position
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// XOR the siblings' bytes at `offset` into `buf`
    ///
    /// The result covers the shortest sibling read; any disagreement is
    /// reported in the returned shortfall rather than padded.
    pub fn reconstruct_at(&self, offset: u64, buf: &mut [u8]) -> Result<Reconstruction> {
        let mut siblings = self.disks.siblings(self.index);
        let Some((_, first)) = siblings.next() else {
            return Err(Error::InvalidGeometry(format!(
                "disk {} has no siblings to reconstruct from",
                self.index
            )));
        };

        let mut shortest = first.read_at(offset, buf)?;
        let mut longest = shortest;
        let mut scratch = vec![0u8; buf.len()];

        for (_, disk) in siblings {
            let n = disk.read_at(offset, &mut scratch)?;
            for (out, byte) in buf.iter_mut().zip(&scratch[..n.min(shortest)]) {
                *out ^= byte;
            }
            shortest = shortest.min(n);
            longest = longest.max(n);
        }

        trace!(
            "Reconstructed {} bytes of disk {} at offset {}",
            shortest,
            self.index,
            offset
        );

        let shortfall = (shortest != longest).then_some(ShortRead { shortest, longest });
        Ok(Reconstruction {
            len: shortest,
            shortfall,
        })
    }

    /// Seek with a signed offset
    pub fn seek_to(&mut self, offset: i128, whence: Whence) -> Result<u64> {
        let end = self.size().unwrap_or(0);
        self.cursor = seek::resolve(self.cursor, 0, end, offset, whence)?;
        Ok(self.cursor)
    }
}

impl<'s, 'a, D: Disk + ?Sized> Disk for ParitySource<'s, 'a, D> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let result = self.reconstruct_at(offset, buf)?;
        match (result.shortfall, self.policy) {
            (None, _) => Ok(result.len),
            (Some(short), ShortReadPolicy::Fail) => Err(Error::ShortRead {
                disk: self.index,
                offset,
                shortest: short.shortest,
                longest: short.longest,
            }),
            (Some(short), ShortReadPolicy::Truncate) => {
                warn!(
                    "Parity for disk {} at offset {} truncated to {} bytes ({} available on some siblings)",
                    self.index, offset, short.shortest, short.longest
                );
                Ok(result.len)
            }
        }
    }

    fn size(&self) -> Option<u64> {
        self.disks.siblings(self.index).next().and_then(|(_, disk)| disk.size())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<'s, 'a, D: Disk + ?Sized> Read for ParitySource<'s, 'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_at(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }
}

impl<'s, 'a, D: Disk + ?Sized> Seek for ParitySource<'s, 'a, D> {
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
    fn test_reconstructs_missing_member() {
        let a = b"ABCDEFGH".to_vec();
        let b = b"abcdefgh".to_vec();
        let p = xor(&a, &b);

        let d0 = MemDisk::new("d0", a);
        let d2 = MemDisk::new("d2", p);
        let set = DiskSet::from_slots(vec![Some(&d0), None, Some(&d2)]).unwrap();

        let mut parity = ParitySource::new(&set, 1);
        let mut out = Vec::new();
        parity.read_to_end(&mut out).unwrap();
        assert_eq!(out, b);
        assert_eq!(parity.position(), 8);
    }

    #[test]
    fn test_seek_then_read() {
        let d0 = MemDisk::new("d0", vec![0x0fu8; 16]);
        let d1 = MemDisk::new("d1", vec![0xf0u8; 16]);
        let set = DiskSet::with_missing([&d0, &d1]).unwrap();

        let mut parity = ParitySource::new(&set, 2);
        assert_eq!(parity.seek(SeekFrom::Start(12)).unwrap(), 12);

        let mut buf = [0u8; 8];
        assert_eq!(parity.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], &[0xffu8; 4]);

        assert_eq!(parity.seek(SeekFrom::End(0)).unwrap(), 16);
        assert_eq!(parity.read(&mut buf).unwrap(), 0);
        assert!(parity.seek_to(-1, Whence::Start).is_err());
    }

    #[test]
    fn test_unequal_siblings_fail_by_default() {
        let d0 = MemDisk::new("d0", vec![1u8; 8]);
        let d1 = MemDisk::new("d1", vec![2u8; 6]);
        let set = DiskSet::with_missing([&d0, &d1]).unwrap();
        let parity = ParitySource::new(&set, 2);

        let mut buf = [0u8; 8];
        let result = parity.reconstruct_at(0, &mut buf).unwrap();
        assert_eq!(result.len, 6);
        assert_eq!(
            result.shortfall,
            Some(ShortRead {
                shortest: 6,
                longest: 8
            })
        );
        assert!(!result.is_complete());
        assert_eq!(&buf[..6], &[3u8; 6]);

        let err = parity.read_at(0, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortRead {
                disk: 2,
                shortest: 6,
                longest: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_unequal_siblings_truncate() {
        let d0 = MemDisk::new("d0", vec![1u8; 8]);
        let d1 = MemDisk::new("d1", vec![2u8; 6]);
        let set = DiskSet::with_missing([&d0, &d1]).unwrap();
        let parity = ParitySource::new(&set, 2).with_policy(ShortReadPolicy::Truncate);

        let mut buf = [0u8; 8];
        assert_eq!(parity.read_at(0, &mut buf).unwrap(), 6);
        assert_eq!(&buf[..6], &[3u8; 6]);
    }

    #[test]
    fn test_all_siblings_at_eof_is_not_short() {
        let d0 = MemDisk::new("d0", vec![1u8; 4]);
        let d1 = MemDisk::new("d1", vec![2u8; 4]);
        let set = DiskSet::with_missing([&d0, &d1]).unwrap();
        let parity = ParitySource::new(&set, 2);

        let mut buf = [0u8; 4];
        assert_eq!(parity.read_at(4, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_present_member_can_be_verified() {
        // Rebuilding a member that is present must reproduce it exactly
        let d0 = MemDisk::new("d0", b"12345678".to_vec());
        let d1 = MemDisk::new("d1", b"abcdefgh".to_vec());
        let d2 = MemDisk::new("d2", xor(b"12345678", b"abcdefgh"));
        let set = DiskSet::new([&d0, &d1, &d2]);

        let parity = ParitySource::new(&set, 0);
        let mut buf = [0u8; 8];
        parity.read_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"12345678");
    }
}
