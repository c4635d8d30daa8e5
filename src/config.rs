//! Array configuration
//!
//! Everything needed to rebuild one array: member image paths, block size,
//! period, map, whether a disk is missing and where the stream of interest
//! starts. Stored as JSON, or YAML when the file has a `.yaml`/`.yml`
//! extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raid::{Geometry, Preset, RaidMap, ShortReadPolicy, PRESETS};

/// Default block size
pub const DEFAULT_BLOCK_SIZE: &str = "4k";

/// Bytes per sector for `s`-suffixed sizes
pub const SECTOR_SIZE: u64 = 512;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "RAIDIMAGE_";

/// Configuration of one array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    /// Member images in map column order, excluding a missing disk
    pub disks: Vec<PathBuf>,

    /// Block size, with optional k/m/g/s suffix
    pub block_size: String,

    /// Rows per period
    pub period: usize,

    /// Dot-separated interleave map
    pub map: String,

    /// Whether one disk is absent (it is appended as the last column)
    pub missing: bool,

    /// Start of the stream of interest, with optional suffix
    pub offset: String,

    /// Handling of unequal sibling lengths during parity reconstruction
    pub short_read: ShortReadPolicy,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        let preset = &PRESETS[0];
        ArrayConfig {
            disks: Vec::new(),
            block_size: DEFAULT_BLOCK_SIZE.to_string(),
            period: preset.period,
            map: preset.map.to_string(),
            missing: false,
            offset: "0".to_string(),
            short_read: ShortReadPolicy::default(),
        }
    }
}

/// On-disk format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }
}

impl ArrayConfig {
    /// Load and validate configuration from a file, with environment
    /// variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration and apply environment overrides without validating
    ///
    /// Callers that layer further overrides on top validate afterwards.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: ArrayConfig = match Format::for_path(path) {
            Format::Json => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?,
            Format::Yaml => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?,
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match Format::for_path(path) {
            Format::Json => serde_json::to_string_pretty(self)
                .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?,
            Format::Yaml => serde_yaml::to_string(self)
                .map_err(|e| Error::Serialization(format!("Failed to serialize config: {}", e)))?,
        };

        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
    }

    /// Apply overrides from a key lookup (keys without the prefix)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(block_size) = value("BLOCK_SIZE") {
            self.block_size = block_size;
        }

        if let Some(period) = value("PERIOD") {
            if let Ok(period) = period.parse::<usize>() {
                self.period = period;
            }
        }

        if let Some(map) = value("MAP") {
            self.map = map;
        }

        if let Some(offset) = value("OFFSET") {
            self.offset = offset;
        }

        if let Some(missing) = value("MISSING") {
            self.missing = matches!(missing.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
    }

    /// Replace the map and period with a preset's
    pub fn apply_preset(&mut self, key: &str) -> Result<&'static Preset> {
        let preset = Preset::find(key)?;
        self.map = preset.map.to_string();
        self.period = preset.period;
        Ok(preset)
    }

    /// Number of map columns, counting a missing disk
    pub fn disk_count(&self) -> usize {
        self.disks.len() + usize::from(self.missing)
    }

    /// Block size in bytes
    pub fn block_size_bytes(&self) -> Result<u64> {
        parse_size(&self.block_size)
    }

    /// Base offset in bytes
    pub fn offset_bytes(&self) -> Result<u64> {
        parse_size(&self.offset)
    }

    /// Parse the map against the configured disks
    pub fn parse_map(&self) -> Result<RaidMap> {
        RaidMap::parse(&self.map, self.period, self.disk_count())
    }

    /// Resolve the map and geometry
    pub fn layout(&self) -> Result<(RaidMap, Geometry)> {
        let map = self.parse_map()?;
        let geometry = Geometry::new(self.block_size_bytes()?, &map, self.offset_bytes()?)?;
        Ok((map, geometry))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.disks.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one disk image is required".to_string(),
            ));
        }

        if self.period == 0 {
            return Err(Error::InvalidConfig(
                "Period must be greater than 0".to_string(),
            ));
        }

        if self.block_size_bytes()? == 0 {
            return Err(Error::InvalidConfig(
                "Block size must be greater than 0".to_string(),
            ));
        }

        if self.missing && self.disks.len() < 2 {
            return Err(Error::InvalidConfig(
                "Rebuilding a missing disk needs at least two present disks".to_string(),
            ));
        }

        self.offset_bytes()?;
        self.parse_map()?;
        Ok(())
    }
}

/// Parse a human readable size
///
/// Accepts a plain byte count or a number with a case-insensitive suffix:
/// `k` (KiB), `m` (MiB), `g` (GiB) or `s` (512-byte sectors).
pub fn parse_size(text: &str) -> Result<u64> {
    let text = text.trim();
    let Some(last) = text.chars().last() else {
        return Err(Error::InvalidSize("empty size".to_string()));
    };

    let (digits, multiplier) = match last.to_ascii_lowercase() {
        'k' => (&text[..text.len() - 1], 1024),
        'm' => (&text[..text.len() - 1], 1024 * 1024),
        'g' => (&text[..text.len() - 1], 1024 * 1024 * 1024),
        's' => (&text[..text.len() - 1], SECTOR_SIZE),
        _ => (text, 1),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| Error::InvalidSize(format!("{:?} is not a size", text)))?;

    value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::InvalidSize(format!("{:?} overflows", text)))
}
