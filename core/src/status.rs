//! Runtime block status and engine-wide protocol constants.

use bitflags::bitflags;
use static_assertions::const_assert;

bitflags! {
    /// Runtime status flags of a block.
    ///
    /// A snapshot of these is returned by
    /// [`Engine::block_status`](crate::Engine::block_status).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        /// Set once when initialization fails and the cache is populated
        /// with defaults. For multi-profile blocks, cleared again when a
        /// profile switch is accepted.
        const RECOVERED = 1 << 0;
        /// Set when a write operation completes. Cleared when a new write
        /// request is accepted.
        const WRITE_COMPLETE = 1 << 1;
        /// Set when a write operation fails. Persists until the next
        /// successful write of the block.
        const WRITE_FAILED = 1 << 2;
        /// Set while a write request waits for the scheduler. Cleared the
        /// instant the write starts, so a follow-up request can queue while
        /// the write is still in flight.
        const WRITE_PENDING = 1 << 3;
        /// Set while a profile switch waits for its fetch to complete.
        /// Multi-profile blocks only.
        const FETCH_PENDING = 1 << 4;
    }
}

/// Sentinel for "no profile selected yet" in a multi-profile block.
///
/// The active-instance index lives in a 4-bit domain, so valid profile
/// indices stop at 14.
pub const INVALID_PROFILE_INSTANCE: u8 = 0xF;

/// Ceiling on wear-leveling instances per block (4-bit instance index).
pub const MAX_WEAR_LEVELING_INSTANCES: usize = 15;

/// Ceiling on multi-profile instances per block. One index below the 4-bit
/// limit, reserving [`INVALID_PROFILE_INSTANCE`] as the sentinel.
pub const MAX_PROFILE_INSTANCES: usize = 14;

/// Ceiling on the number of configured blocks.
pub const MAX_BLOCK_COUNT: usize = 255;

/// Backup-copy blocks always hold exactly two identical instances.
pub(crate) const BACKUP_COPY_INSTANCES: usize = 2;

/// Exclusive upper bound of the wear-leveling sequence counter domain.
/// Stored counters live in `0..=254`.
pub(crate) const SEQUENCE_MODULUS: u8 = 255;

/// Marks an unreadable or erased instance in a sequence-counter scan.
pub(crate) const SEQUENCE_INVALID: u8 = 0xFF;

// The sentinel must never collide with a valid multi-profile index, and
// the counter domain must leave the erased byte value free.
const_assert!(MAX_PROFILE_INSTANCES < INVALID_PROFILE_INSTANCE as usize + 1);
const_assert!(MAX_WEAR_LEVELING_INSTANCES <= 15);
const_assert!(SEQUENCE_INVALID >= SEQUENCE_MODULUS);

/// Increments `value` by one, wrapping to zero at `exclusive_limit`.
pub(crate) fn wrap_inc(value: u8, exclusive_limit: u8) -> u8 {
    let next = value.wrapping_add(1);
    if next >= exclusive_limit {
        0
    } else {
        next
    }
}
