//! Helpers for working out a map by eye
//!
//! Building a map for an unknown controller means looking at the start and
//! end of each physical block of a period and deciding which logical block
//! it continues. These helpers fetch those samples and find periods that
//! hold plain text, where block boundaries are easiest to spot.

use std::sync::OnceLock;

use regex::bytes::Regex;
use tracing::debug;

use crate::disk::{Disk, DiskSet};
use crate::error::{Error, Result};

use super::geometry::Geometry;
use super::map::{MapToken, RaidMap};
use super::parity::{ParitySource, ShortReadPolicy};

/// Bytes sampled to classify a block as text
pub const TEXT_SAMPLE_LEN: usize = 20;

/// Printable ASCII plus common whitespace
const TEXT_PATTERN: &str = r"^[\t\n\r\x20-\x7e]+$";

fn text_regex() -> &'static Regex {
    static TEXT_RE: OnceLock<Regex> = OnceLock::new();
    TEXT_RE.get_or_init(|| Regex::new(TEXT_PATTERN).expect("text pattern is a valid regex"))
}

/// Start and end of one physical block
#[derive(Debug, Clone)]
pub struct BlockPreview {
    /// Disk column
    pub disk: usize,
    /// Row within the period
    pub row: usize,
    /// Byte offset of the block on its disk
    pub offset: u64,
    /// Map cell assigned to this block
    pub token: MapToken,
    /// First bytes of the block
    pub head: Vec<u8>,
    /// Last bytes of the block
    pub tail: Vec<u8>,
}

/// A block whose first bytes look like text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRegion {
    /// Period containing the block
    pub period_number: u64,
    /// Row within the period
    pub row: u64,
    /// Disk column
    pub disk: usize,
    /// Byte offset of the block on its disk
    pub offset: u64,
}

/// Read from a member, rebuilding it when missing
fn read_member<D: Disk + ?Sized>(
    disks: &DiskSet<'_, D>,
    index: usize,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize> {
    match disks.get(index) {
        Some(disk) => disk.read_at(offset, buf),
        None => ParitySource::new(disks, index)
            .with_policy(ShortReadPolicy::Truncate)
            .read_at(offset, buf),
    }
}

/// Sample every physical block of one period
///
/// Results are ordered by disk, then row.
pub fn preview_period<D: Disk + ?Sized>(
    disks: &DiskSet<'_, D>,
    map: &RaidMap,
    geometry: &Geometry,
    period_number: u64,
    sample: usize,
) -> Result<Vec<BlockPreview>> {
    let sample = sample.min(geometry.block_size as usize);
    let mut previews = Vec::with_capacity(map.grid().len());

    for disk in 0..disks.len() {
        for row in 0..map.physical_period() {
            let offset = geometry.row_offset(period_number, row as u64)?;

            let mut head = vec![0u8; sample];
            let n = read_member(disks, disk, offset, &mut head)?;
            head.truncate(n);

            let mut tail = vec![0u8; sample];
            let tail_offset = offset
                .checked_add(geometry.block_size - sample as u64)
                .ok_or(Error::AddressOverflow {
                    period: period_number,
                    row: row as u64,
                })?;
            let n = read_member(disks, disk, tail_offset, &mut tail)?;
            tail.truncate(n);

            let token = map.cell(row, disk).cloned().unwrap_or(MapToken::Parity);
            previews.push(BlockPreview {
                disk,
                row,
                offset,
                token,
                head,
                tail,
            });
        }
    }

    Ok(previews)
}

/// Find the first block at or after `from_period` that starts with text
///
/// Returns `None` once every disk is exhausted.
pub fn find_text_region<D: Disk + ?Sized>(
    disks: &DiskSet<'_, D>,
    geometry: &Geometry,
    from_period: u64,
) -> Result<Option<TextRegion>> {
    let overflow = |block: u64| Error::AddressOverflow {
        period: block / geometry.physical_period,
        row: block % geometry.physical_period,
    };

    let mut sample = [0u8; TEXT_SAMPLE_LEN];
    let mut block = from_period
        .checked_mul(geometry.physical_period)
        .ok_or(Error::AddressOverflow {
            period: from_period,
            row: 0,
        })?;

    loop {
        let offset = block
            .checked_mul(geometry.block_size)
            .ok_or_else(|| overflow(block))?;
        let mut exhausted = true;

        for disk in 0..disks.len() {
            let n = read_member(disks, disk, offset, &mut sample)?;
            if n == 0 {
                continue;
            }
            exhausted = false;

            if text_regex().is_match(&sample[..n]) {
                let region = TextRegion {
                    period_number: block / geometry.physical_period,
                    row: block % geometry.physical_period,
                    disk,
                    offset,
                };
                debug!("Found text at {:?}", region);
                return Ok(Some(region));
            }
        }

        if exhausted {
            return Ok(None);
        }
        block = block.checked_add(1).ok_or_else(|| overflow(block))?;
    }
}

/// Render bytes for a terminal, replacing anything unprintable with `.`
pub fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if (0x20..0x7f).contains(&b) { b as char } else { '.' })
        .collect()
}
