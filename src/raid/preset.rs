//! Built-in interleave maps for common controllers

use crate::error::{Error, Result};

use super::map::{RaidMap, MAP_SEPARATOR};

/// A named, known-good layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    /// Human readable description
    pub name: &'static str,
    /// Dot-separated map
    pub map: &'static str,
    /// Rows per period
    pub period: usize,
}

/// Layouts offered out of the box
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "3 Disk Rotating parity (Adaptec)",
        map: "0.1.P.2.P.3.P.4.5",
        period: 3,
    },
    Preset {
        name: "4 Disk Continuing parity (Linux)",
        map: "0.1.2.P.4.5.P.3.8.P.6.7.P.9.10.11",
        period: 4,
    },
    Preset {
        name: "3 Disk double parity (4x3 permutations)",
        map: "0.1.P.2.3.P.4.5.P.6.7.P.8.P.9.10.P.11.\
              12.P.13.14.P.15.P.16.17.P.18.19.P.20.21.P.22.23",
        period: 12,
    },
];

impl Preset {
    /// Look up a preset by index or case-insensitive name prefix
    pub fn find(key: &str) -> Result<&'static Preset> {
        let key = key.trim();
        if let Ok(index) = key.parse::<usize>() {
            return PRESETS
                .get(index)
                .ok_or_else(|| Error::UnknownPreset(key.to_string()));
        }

        let lowered = key.to_lowercase();
        PRESETS
            .iter()
            .find(|preset| preset.name.to_lowercase().starts_with(&lowered))
            .ok_or_else(|| Error::UnknownPreset(key.to_string()))
    }

    /// Number of disks this layout is written for
    pub fn disk_count(&self) -> usize {
        self.map.split(MAP_SEPARATOR).count() / self.period
    }

    /// Parse the layout
    pub fn parse(&self) -> Result<RaidMap> {
        RaidMap::parse(self.map, self.period, self.disk_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_presets_parse() {
        for preset in PRESETS {
            let map = preset.parse().unwrap();
            assert_eq!(map.physical_period(), preset.period);
            assert_eq!(map.disk_count(), preset.disk_count());
            assert_eq!(map.to_map_string(), preset.map);
        }
    }

    #[test]
    fn test_disk_counts() {
        assert_eq!(PRESETS[0].disk_count(), 3);
        assert_eq!(PRESETS[1].disk_count(), 4);
        assert_eq!(PRESETS[2].disk_count(), 3);
    }

    #[test]
    fn test_find_by_index_and_name() {
        assert_eq!(Preset::find("1").unwrap().period, 4);
        assert_eq!(Preset::find("3 disk double").unwrap().period, 12);
        assert!(Preset::find("7").is_err());
        assert!(Preset::find("raid6").is_err());
    }
}
