//! raidimage - Read-only reconstruction of RAID-5 disk image sets
//!
//! This library rebuilds the logical volume of a single-parity striped array
//! from images of its member disks, given the interleave map the controller
//! used. One missing member can be rebuilt on the fly from parity.

pub mod config;
pub mod disk;
pub mod error;
pub mod raid;

pub use config::ArrayConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ArrayConfig;
    pub use crate::disk::{Disk, DiskSet, FileDisk, MemDisk};
    pub use crate::error::{Error, Result};
    pub use crate::raid::{ParitySource, RaidMap, RaidReader, ShortReadPolicy, Whence};
}
