//! Raw image files

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use super::Disk;
use crate::error::Result;

/// A raw disk image file
///
/// The handle is guarded by a mutex so each seek and its read happen as one
/// step, even when the disk is shared between readers.
pub struct FileDisk {
    name: String,
    file: Mutex<File>,
    size: u64,
}

impl FileDisk {
    /// Open an image file read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_file(file, path.display().to_string())
    }

    /// Wrap an already open file
    pub fn from_file(file: File, name: impl Into<String>) -> Result<Self> {
        let size = file.metadata()?.len();
        let name = name.into();
        debug!("Opened disk {} ({} bytes)", name, size);

        Ok(FileDisk {
            name,
            file: Mutex::new(file),
            size,
        })
    }
}

impl Disk for FileDisk {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Ok(fill(&mut *file, buf)?)
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Read until `buf` is full or the source is exhausted, retrying interrupts
fn fill<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Hands out two bytes per call and is interrupted before every read
    struct Flaky {
        data: &'static [u8],
        interrupt: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::new(ErrorKind::Interrupted, "signal"));
            }
            let n = buf.len().min(self.data.len()).min(2);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_fill_retries_interrupted_reads() {
        let mut source = Flaky {
            data: b"abcde",
            interrupt: false,
        };
        let mut buf = [0u8; 8];
        assert_eq!(fill(&mut source, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"abcde");
    }

    #[test]
    fn test_fill_propagates_other_errors() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(ErrorKind::PermissionDenied, "denied"))
            }
        }

        let err = fill(&mut Broken, &mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_read_at_offsets() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        tmp.flush().unwrap();

        let disk = FileDisk::open(tmp.path()).unwrap();
        assert_eq!(disk.size(), Some(10));

        let mut buf = [0u8; 4];
        assert_eq!(disk.read_at(3, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        // Short read at the end, nothing past it
        assert_eq!(disk.read_at(8, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(disk.read_at(20, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_name_is_path() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let disk = FileDisk::open(tmp.path()).unwrap();
        assert_eq!(disk.name(), tmp.path().display().to_string());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(FileDisk::open("/nonexistent/raidimage/disk.img").is_err());
    }
}
