//! In-memory disks

use bytes::Bytes;

use super::Disk;
use crate::error::Result;

/// A disk held in memory
#[derive(Debug, Clone)]
pub struct MemDisk {
    name: String,
    data: Bytes,
}

impl MemDisk {
    /// Create a disk from its full contents
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        MemDisk {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Get the raw contents
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Disk for MemDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }

        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_and_past_end() {
        let disk = MemDisk::new("mem", b"abcdef".to_vec());
        let mut buf = [0u8; 4];

        assert_eq!(disk.read_at(1, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"bcde");

        assert_eq!(disk.read_at(4, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");

        assert_eq!(disk.read_at(6, &mut buf).unwrap(), 0);
        assert_eq!(disk.read_at(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_clones_share_contents() {
        let disk = MemDisk::new("mem", Bytes::from_static(b"shared"));
        let copy = disk.clone();
        assert_eq!(copy.data(), disk.data());
        assert_eq!(copy.size(), Some(6));
    }
}
