//! Error types for raidimage

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reconstructing a RAID image
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// The map has fewer tokens than the geometry requires
    #[error("Map does not have enough elements: expected {expected}, found {found}")]
    MalformedMap { expected: usize, found: usize },

    /// A logical block index is missing from the map
    #[error("Invalid map: position {index} not found")]
    InvalidMap { index: u64 },

    /// Disk count, period or block size cannot describe an array
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Human readable size could not be parsed
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// No preset with the given name or index
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// Configuration file could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration is self-inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    // =========================================================================
    // Access Errors
    // =========================================================================
    /// Seek before the start of the logical stream
    #[error("Seek before start of file: position {position} is before origin {origin}")]
    Seek { position: i128, origin: u64 },

    /// A block address does not fit in 64 bits
    #[error("Address overflow: period {period} row {row} is beyond the addressable range")]
    AddressOverflow { period: u64, row: u64 },

    /// Parity siblings returned unequal lengths
    #[error(
        "Short read reconstructing disk {disk} at offset {offset}: siblings returned between {shortest} and {longest} bytes"
    )]
    ShortRead {
        disk: usize,
        offset: u64,
        shortest: usize,
        longest: usize,
    },

    /// I/O error from an underlying disk
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;

        match err {
            Error::Io(e) => e,
            err @ Error::ShortRead { .. } => std::io::Error::new(ErrorKind::UnexpectedEof, err),
            other => std::io::Error::new(ErrorKind::InvalidInput, other),
        }
    }
}
