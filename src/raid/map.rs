//! Interleave map parsing
//!
//! A map describes one period of the array: `physical_period` rows across
//! all disks, written row-major as dot-separated tokens. Each token is the
//! logical block index stored in that cell, or `P` for parity. For example
//! the Linux 3-disk layout with a period of 3 rows is
//!
//! ```text
//! 1.0.P.P.3.2.4.P.5
//! ```
//!
//! From the grid we derive the period lookup table, which maps every logical
//! block index of a period to its `(row, disk)` cell.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Token separator in the textual map
pub const MAP_SEPARATOR: char = '.';

/// One cell of the layout grid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapToken {
    /// Logical block index stored in this cell
    Data(u64),
    /// Parity block
    Parity,
    /// Unrecognized token, treated like parity
    Unknown(String),
}

impl MapToken {
    /// Classify a single token
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.eq_ignore_ascii_case("p") {
            return MapToken::Parity;
        }
        match token.parse::<u64>() {
            Ok(index) => MapToken::Data(index),
            Err(_) => MapToken::Unknown(token.to_string()),
        }
    }

    /// Logical index, if this cell holds data
    pub fn index(&self) -> Option<u64> {
        match self {
            MapToken::Data(index) => Some(*index),
            MapToken::Parity | MapToken::Unknown(_) => None,
        }
    }

    /// Check if this cell holds no logical data
    pub fn is_parity(&self) -> bool {
        self.index().is_none()
    }
}

impl fmt::Display for MapToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapToken::Data(index) => write!(f, "{}", index),
            MapToken::Parity => f.write_str("P"),
            MapToken::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Physical position of a logical block within one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Row within the period
    pub row: usize,
    /// Disk column
    pub disk: usize,
}

/// Parsed layout grid plus its period lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidMap {
    physical_period: usize,
    disk_count: usize,
    /// Row-major, `physical_period * disk_count` cells
    grid: Vec<MapToken>,
    /// Indexed by logical block index within a period
    lookup: Vec<Slot>,
}

impl RaidMap {
    /// Parse a dot-separated map
    ///
    /// # Arguments
    /// * `map` - Tokens, row 0 across all disks first
    /// * `physical_period` - Number of rows before the pattern repeats
    /// * `disk_count` - Number of disks, including a missing one
    ///
    /// # Errors
    /// * `InvalidGeometry` if the period is empty or there are fewer than two disks
    /// * `MalformedMap` if there are fewer tokens than cells
    /// * `InvalidMap` naming the first logical index absent from the grid
    pub fn parse(map: &str, physical_period: usize, disk_count: usize) -> Result<Self> {
        if physical_period == 0 {
            return Err(Error::InvalidGeometry(
                "period must be at least one row".to_string(),
            ));
        }
        if disk_count < 2 {
            return Err(Error::InvalidGeometry(format!(
                "a parity array needs at least two disks, got {}",
                disk_count
            )));
        }

        let cells = physical_period * disk_count;
        let tokens: Vec<&str> = map.split(MAP_SEPARATOR).collect();
        if tokens.len() < cells {
            return Err(Error::MalformedMap {
                expected: cells,
                found: tokens.len(),
            });
        }
        if tokens.len() > cells {
            debug!(
                "Ignoring {} surplus map tokens beyond {} cells",
                tokens.len() - cells,
                cells
            );
        }

        let grid: Vec<MapToken> = tokens[..cells].iter().map(|t| MapToken::parse(t)).collect();
        for (cell, token) in grid.iter().enumerate() {
            if let MapToken::Unknown(raw) = token {
                warn!(
                    "Map token {:?} at row {} disk {} is not an index; treating it as parity",
                    raw,
                    cell / disk_count,
                    cell % disk_count
                );
            }
        }

        Self::from_grid(grid, physical_period, disk_count)
    }

    /// Build the lookup table from an already classified grid
    pub fn from_grid(grid: Vec<MapToken>, physical_period: usize, disk_count: usize) -> Result<Self> {
        if physical_period == 0 || disk_count < 2 {
            return Err(Error::InvalidGeometry(format!(
                "cannot build a map of {} rows by {} disks",
                physical_period, disk_count
            )));
        }
        let cells = physical_period * disk_count;
        if grid.len() != cells {
            return Err(Error::MalformedMap {
                expected: cells,
                found: grid.len(),
            });
        }

        let logical_period_size = physical_period * (disk_count - 1);
        let mut found: Vec<Option<Slot>> = vec![None; logical_period_size];

        // Row-major scan: the first occurrence of an index wins
        for (cell, token) in grid.iter().enumerate() {
            let Some(index) = token.index() else {
                continue;
            };
            let slot = Slot {
                row: cell / disk_count,
                disk: cell % disk_count,
            };

            match found.get_mut(index as usize) {
                Some(entry) => match entry {
                    None => *entry = Some(slot),
                    Some(first) => warn!(
                        "Logical block {} appears at row {} disk {} and again at row {} disk {}; using the first",
                        index, first.row, first.disk, slot.row, slot.disk
                    ),
                },
                None => warn!(
                    "Logical block {} at row {} disk {} is outside the period of {} blocks",
                    index, slot.row, slot.disk, logical_period_size
                ),
            }
        }

        let mut lookup = Vec::with_capacity(logical_period_size);
        for (index, slot) in found.into_iter().enumerate() {
            match slot {
                Some(slot) => lookup.push(slot),
                None => return Err(Error::InvalidMap { index: index as u64 }),
            }
        }

        debug!(
            "Parsed map: {} rows x {} disks, {} logical blocks per period",
            physical_period, disk_count, logical_period_size
        );

        Ok(RaidMap {
            physical_period,
            disk_count,
            grid,
            lookup,
        })
    }

    /// Rows per period
    pub fn physical_period(&self) -> usize {
        self.physical_period
    }

    /// Number of disk columns
    pub fn disk_count(&self) -> usize {
        self.disk_count
    }

    /// Logical blocks per period: `physical_period * (disk_count - 1)`
    pub fn logical_period_size(&self) -> usize {
        self.lookup.len()
    }

    /// Row-major grid cells
    pub fn grid(&self) -> &[MapToken] {
        &self.grid
    }

    /// Cell at a row and disk
    pub fn cell(&self, row: usize, disk: usize) -> Option<&MapToken> {
        if row >= self.physical_period || disk >= self.disk_count {
            return None;
        }
        self.grid.get(row * self.disk_count + disk)
    }

    /// Period lookup table
    pub fn lookup(&self) -> &[Slot] {
        &self.lookup
    }

    /// Cell holding a logical block index within the period
    pub fn slot(&self, period_position: usize) -> Option<Slot> {
        self.lookup.get(period_position).copied()
    }

    /// Render back to the dot-separated form
    pub fn to_map_string(&self) -> String {
        let separator = MAP_SEPARATOR.to_string();
        self.grid
            .iter()
            .map(|token| token.to_string())
            .collect::<Vec<_>>()
            .join(separator.as_str())
    }
}

impl fmt::Display for RaidMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.grid.chunks(self.disk_count) {
            let line: Vec<String> = row.iter().map(|token| format!("{:>5}", token.to_string())).collect();
            writeln!(f, "{}", line.join(""))?;
        }
        Ok(())
    }
}
