//! Block configuration surface and its validation.
//!
//! The application hands the engine a table of [`BlockConfig`] entries at
//! construction. Block IDs are positional: block `i` is the entry at index
//! `i`, so IDs are dense from zero by construction. The table is validated
//! once and is immutable for the engine's lifetime.

use alloc::vec::Vec;

use crate::error::{ConfigError, ConfigResult};
use crate::status::{MAX_BLOCK_COUNT, MAX_PROFILE_INSTANCES, MAX_WEAR_LEVELING_INSTANCES};

/// How a block's instances are managed on the device.
///
/// The variant carries only the parameters its policy actually needs;
/// instance counts for the single- and dual-instance policies are implied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementPolicy {
    /// One checksummed instance, read at init, overwritten in place.
    Basic,
    /// Two identical instances; both are written on every update, and
    /// either one is enough to initialize the cache.
    BackupCopy,
    /// `instance_count` instances written round-robin, with a one-byte
    /// sequence counter (cache byte 0) identifying the newest.
    WearLeveling {
        /// Stored instances, `2..=15`.
        instance_count: u8,
    },
    /// `instance_count` independent profiles, exactly one active at a time.
    MultiProfile {
        /// Stored profiles, `2..=14`.
        instance_count: u8,
    },
}

impl ManagementPolicy {
    /// Number of instances this block occupies on the device.
    pub fn instance_count(&self) -> usize {
        match *self {
            Self::Basic => 1,
            Self::BackupCopy => 2,
            Self::WearLeveling { instance_count } | Self::MultiProfile { instance_count } => {
                usize::from(instance_count)
            }
        }
    }
}

/// Source pattern for populating a cache with default values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultsPattern {
    /// A full image, exactly `data_size` bytes, copied as-is.
    Image(Vec<u8>),
    /// A single byte repeated across the cache.
    Fill(u8),
    /// A short pattern (at least two bytes) tiled across the cache; the
    /// last repeat is truncated to fit.
    Tile(Vec<u8>),
}

/// What to do with a block whose stored data cannot be validated at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Populate the cache with defaults and schedule a write so the device
    /// is repaired too.
    DefaultsAndRepair,
    /// Populate the cache with defaults; leave the device as found.
    DefaultsOnly,
}

/// Static configuration of one block.
#[derive(Debug, Clone)]
pub struct BlockConfig {
    /// Starting byte offset of the block's region in the device namespace.
    pub offset_in_eeprom: usize,
    /// Payload bytes per instance (equals the cache length).
    pub data_size: usize,
    /// Instance management policy.
    pub policy: ManagementPolicy,
    /// Default values used for recovery and [`Engine::restore_defaults`].
    ///
    /// [`Engine::restore_defaults`]: crate::Engine::restore_defaults
    pub defaults: DefaultsPattern,
    /// Recovery strategy on init failure.
    pub recovery: RecoveryStrategy,
}

impl BlockConfig {
    /// Device region occupied by this block: `[start, end)`.
    pub(crate) fn region(&self, digest_size: usize) -> (usize, usize) {
        let span = self.policy.instance_count() * (self.data_size + digest_size);
        (self.offset_in_eeprom, self.offset_in_eeprom + span)
    }
}

/// Validates a configuration table against the engine's structural rules.
pub(crate) fn validate(configs: &[BlockConfig], digest_size: usize) -> ConfigResult<()> {
    if digest_size == 0 {
        return Err(ConfigError::ZeroDigestWidth);
    }
    if configs.is_empty() {
        return Err(ConfigError::NoBlocks);
    }
    if configs.len() > MAX_BLOCK_COUNT {
        return Err(ConfigError::TooManyBlocks {
            count: configs.len(),
        });
    }

    for (block, cfg) in configs.iter().enumerate() {
        if cfg.data_size == 0 {
            return Err(ConfigError::ZeroDataSize { block });
        }

        match cfg.policy {
            ManagementPolicy::WearLeveling { instance_count } => {
                if !(2..=MAX_WEAR_LEVELING_INSTANCES as u8).contains(&instance_count) {
                    return Err(ConfigError::InstanceCountOutOfRange {
                        block,
                        count: instance_count,
                    });
                }
                // Byte 0 is the sequence counter; a payload must remain.
                if cfg.data_size < 2 {
                    return Err(ConfigError::PayloadTooSmall { block });
                }
            }
            ManagementPolicy::MultiProfile { instance_count } => {
                if !(2..=MAX_PROFILE_INSTANCES as u8).contains(&instance_count) {
                    return Err(ConfigError::InstanceCountOutOfRange {
                        block,
                        count: instance_count,
                    });
                }
            }
            ManagementPolicy::Basic | ManagementPolicy::BackupCopy => {}
        }

        match &cfg.defaults {
            DefaultsPattern::Image(image) if image.len() != cfg.data_size => {
                return Err(ConfigError::DefaultsLengthMismatch {
                    block,
                    expected: cfg.data_size,
                    actual: image.len(),
                });
            }
            DefaultsPattern::Tile(pattern) if pattern.len() < 2 => {
                return Err(ConfigError::TilePatternTooShort { block });
            }
            _ => {}
        }
    }

    for first in 0..configs.len() {
        for second in (first + 1)..configs.len() {
            let (a_start, a_end) = configs[first].region(digest_size);
            let (b_start, b_end) = configs[second].region(digest_size);
            if a_start < b_end && b_start < a_end {
                return Err(ConfigError::RegionOverlap { first, second });
            }
        }
    }

    Ok(())
}

/// Writes the default pattern into `cache[skip..]`.
///
/// `skip` is 1 for wear-leveling blocks (byte 0 is the sequence counter and
/// is never sourced from defaults), 0 otherwise.
pub(crate) fn fill_defaults(cache: &mut [u8], defaults: &DefaultsPattern, skip: usize) {
    match defaults {
        DefaultsPattern::Image(image) => cache[skip..].copy_from_slice(&image[skip..]),
        DefaultsPattern::Fill(byte) => cache[skip..].fill(*byte),
        DefaultsPattern::Tile(pattern) => {
            let mut offset = skip;
            while offset < cache.len() {
                let chunk = pattern.len().min(cache.len() - offset);
                cache[offset..offset + chunk].copy_from_slice(&pattern[..chunk]);
                offset += chunk;
            }
        }
    }
}
