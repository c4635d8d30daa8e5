//! Cursor arithmetic shared by the reconstructing sources

use std::io::SeekFrom;

use crate::error::{Error, Result};

/// Seek origin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Relative to the logical start (the base offset)
    Start,
    /// Relative to the cursor
    Current,
    /// The estimated size; the offset is not applied
    End,
}

impl Whence {
    /// Split a std seek position into a signed offset and its origin
    pub fn from_seek(pos: SeekFrom) -> (i128, Whence) {
        match pos {
            SeekFrom::Start(offset) => (offset as i128, Whence::Start),
            SeekFrom::Current(delta) => (delta as i128, Whence::Current),
            SeekFrom::End(delta) => (delta as i128, Whence::End),
        }
    }
}

/// Compute a new raw cursor
///
/// `origin` is the lowest valid cursor; `end` is the raw position that
/// `Whence::End` moves to.
pub(crate) fn resolve(cursor: u64, origin: u64, end: u64, offset: i128, whence: Whence) -> Result<u64> {
    let position = match whence {
        Whence::Start => origin as i128 + offset,
        Whence::Current => cursor as i128 + offset,
        Whence::End => end as i128,
    };

    if position < origin as i128 {
        return Err(Error::Seek { position, origin });
    }

    u64::try_from(position).map_err(|_| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("seek to {} is beyond the addressable range", position),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_start_includes_origin() {
        assert_eq!(resolve(0, 512, 4096, 0, Whence::Start).unwrap(), 512);
        assert_eq!(resolve(0, 512, 4096, 10, Whence::Start).unwrap(), 522);
    }

    #[test]
    fn test_resolve_current_and_end() {
        assert_eq!(resolve(600, 512, 4096, -88, Whence::Current).unwrap(), 512);
        assert_eq!(resolve(600, 512, 4096, 0, Whence::End).unwrap(), 4096);
        assert_eq!(resolve(600, 512, 4096, -96, Whence::End).unwrap(), 4096);
    }

    #[test]
    fn test_resolve_before_origin() {
        assert!(matches!(
            resolve(0, 0, 100, -1, Whence::Start),
            Err(Error::Seek { position: -1, origin: 0 })
        ));
        assert!(resolve(600, 512, 4096, -89, Whence::Current).is_err());
    }

    #[test]
    fn test_from_seek_from() {
        let (offset, whence) = Whence::from_seek(SeekFrom::Current(-4));
        assert_eq!(offset, -4);
        assert_eq!(whence, Whence::Current);
    }
}
