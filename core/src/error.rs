//! Error types and result handling for the engine.
//!
//! The engine has exactly one fallible entry point: construction, where the
//! block configuration table is validated. Runtime failures (storage faults,
//! digest mismatches) are never errors in the `Result` sense - they surface
//! through block status flags and callbacks.

use core::fmt;

/// Result type alias for configuration validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A rejected block configuration table.
///
/// Each variant names the offending block (by its positional ID) so the
/// defect can be traced back to the configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration table is empty.
    NoBlocks,

    /// More blocks than the engine supports.
    TooManyBlocks {
        /// Number of configured blocks.
        count: usize,
    },

    /// The checksum implementation reports a zero-width digest.
    ZeroDigestWidth,

    /// A block has a zero-byte payload.
    ZeroDataSize {
        /// Offending block.
        block: usize,
    },

    /// A wear-leveling block too small to hold the sequence counter plus
    /// at least one payload byte.
    PayloadTooSmall {
        /// Offending block.
        block: usize,
    },

    /// An instance count outside the policy's supported range.
    InstanceCountOutOfRange {
        /// Offending block.
        block: usize,
        /// Configured instance count.
        count: u8,
    },

    /// A full-image default whose length differs from the block's payload
    /// size.
    DefaultsLengthMismatch {
        /// Offending block.
        block: usize,
        /// Required length (the block's `data_size`).
        expected: usize,
        /// Configured length.
        actual: usize,
    },

    /// A tiled default pattern shorter than two bytes.
    TilePatternTooShort {
        /// Offending block.
        block: usize,
    },

    /// Two blocks whose device regions overlap.
    RegionOverlap {
        /// Lower-numbered block of the overlapping pair.
        first: usize,
        /// Higher-numbered block of the overlapping pair.
        second: usize,
    },
}

impl ConfigError {
    /// Get a human-readable description of the error kind.
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoBlocks => "no blocks configured",
            Self::TooManyBlocks { .. } => "too many blocks configured",
            Self::ZeroDigestWidth => "checksum digest width is zero",
            Self::ZeroDataSize { .. } => "block payload size is zero",
            Self::PayloadTooSmall { .. } => {
                "wear-leveling block too small for sequence counter and payload"
            }
            Self::InstanceCountOutOfRange { .. } => "instance count outside policy range",
            Self::DefaultsLengthMismatch { .. } => "full-image defaults length mismatch",
            Self::TilePatternTooShort { .. } => "tiled default pattern shorter than two bytes",
            Self::RegionOverlap { .. } => "block device regions overlap",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())?;
        match *self {
            Self::TooManyBlocks { count } => write!(f, " ({count})"),
            Self::ZeroDataSize { block }
            | Self::PayloadTooSmall { block }
            | Self::TilePatternTooShort { block } => write!(f, " (block {block})"),
            Self::InstanceCountOutOfRange { block, count } => {
                write!(f, " (block {block}, count {count})")
            }
            Self::DefaultsLengthMismatch {
                block,
                expected,
                actual,
            } => write!(f, " (block {block}, expected {expected}, got {actual})"),
            Self::RegionOverlap { first, second } => write!(f, " (blocks {first} and {second})"),
            _ => Ok(()),
        }
    }
}
