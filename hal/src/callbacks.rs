//! # Engine Callbacks
//!
//! Notifications produced by the engine. All methods except
//! [`select_initial_profile`] default to no-ops, so a sink only implements
//! what it cares about.
//!
//! [`select_initial_profile`]: EngineCallbacks::select_initial_profile

/// Lifecycle notifications and queries the engine directs at the
/// application.
///
/// Every method runs in the context of the engine call that triggered it
/// (`init` or `periodic_task`), so implementations must return promptly.
pub trait EngineCallbacks {
    /// Selects the initially active profile of a multi-profile block.
    ///
    /// Called once per multi-profile block during engine init, before the
    /// block's stored data is fetched. Must return a value in
    /// `[0, instance_count)` for the given block.
    ///
    /// Blocks are initialized in ascending ID order, so the selection may
    /// be derived from the already-initialized cache of an earlier block.
    fn select_initial_profile(&mut self, block_id: usize) -> u8 {
        let _ = block_id;
        0
    }

    /// A block finished initializing (successfully or via recovery).
    fn on_block_init_complete(&mut self, block_id: usize) {
        let _ = block_id;
    }

    /// A scheduled write for `block_id` left the queue and started.
    fn on_block_write_started(&mut self, block_id: usize) {
        let _ = block_id;
    }

    /// The write for `block_id` completed. Inspect the block status for
    /// the outcome.
    fn on_block_write_complete(&mut self, block_id: usize) {
        let _ = block_id;
    }

    /// A profile fetch for a multi-profile block started.
    fn on_profile_fetch_started(&mut self, block_id: usize) {
        let _ = block_id;
    }

    /// A profile fetch completed; the block's cache now holds the new
    /// profile (or recovery defaults).
    fn on_profile_fetch_complete(&mut self, block_id: usize) {
        let _ = block_id;
    }
}

/// A sink that ignores every notification and always selects profile 0.
impl EngineCallbacks for () {}
