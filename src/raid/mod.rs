//! RAID-5 reconstruction
//!
//! Turns a set of striped disk images plus an interleave map into one
//! logical byte stream. Supports single-parity layouts with rotating or
//! fixed parity, and rebuilds at most one missing disk from the others.

pub mod geometry;
pub mod inspect;
pub mod map;
pub mod parity;
pub mod preset;
pub mod reader;
pub mod seek;

pub use geometry::{Geometry, Location};
pub use inspect::{find_text_region, preview_period, BlockPreview, TextRegion};
pub use map::{MapToken, RaidMap, Slot};
pub use parity::{ParitySource, Reconstruction, ShortRead, ShortReadPolicy};
pub use preset::{Preset, PRESETS};
pub use reader::RaidReader;
pub use seek::Whence;
