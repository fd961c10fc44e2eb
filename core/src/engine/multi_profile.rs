//! Multi-profile blocks: one parameter cache and N checksummed instances
//! (profiles) on the device, exactly one active at a time. The initially
//! active profile is chosen by the application at init; later switches run
//! asynchronously through the scheduler. Writes touch only the active
//! profile's instance.

use nvparam_hal::{Checksum, EepromBus, EngineCallbacks};

use crate::config::ManagementPolicy;
use crate::engine::io::{IoStage, IoStatus, ReadTarget};
use crate::engine::{Engine, InitStage};
use crate::status::{BlockFlags, INVALID_PROFILE_INSTANCE};

impl<B: EepromBus, C: Checksum, U: EngineCallbacks> Engine<B, C, U> {
    /// Initializes a multi-profile block. Synchronous: the fetch machine is
    /// spun in place, since the periodic task is not live during init.
    pub(crate) fn init_multi_profile_block(&mut self, block_id: usize, instance_count: u8) {
        let selected = self.callbacks.select_initial_profile(block_id);
        debug_assert!(
            selected < instance_count,
            "initial profile out of range for block {block_id}"
        );
        self.blocks[block_id].active_instance = selected.min(instance_count - 1);

        self.start_profile_read(block_id);
        while !self.profile_fetch_step() {}
    }

    /// Prepares the read of the block's active profile instance into the
    /// work buffer.
    pub(crate) fn start_profile_read(&mut self, block_id: usize) {
        let instance_len = self.blocks[block_id].config.data_size + C::DIGEST_SIZE;
        let active = self.blocks[block_id].active_instance;

        // A fetch may only target an already-selected profile.
        if active == INVALID_PROFILE_INSTANCE {
            debug_assert!(false, "profile fetch with no active profile selected");
            self.state.block_id = block_id;
            self.state.init_stage = InitStage::FetchInstance;
            self.state.io.stage = IoStage::Complete;
            self.state.io.status = IoStatus::Nok;
            return;
        }

        let offset =
            self.blocks[block_id].config.offset_in_eeprom + usize::from(active) * instance_len;
        self.start_read(block_id, offset, instance_len, ReadTarget::WorkBuffer);
    }

    /// Advances the profile fetch machine by one transition. Returns `true`
    /// once the fetch (including validation and recovery) has completed.
    pub(crate) fn profile_fetch_step(&mut self) -> bool {
        let stage = self.state.init_stage;
        match stage {
            InitStage::FetchInstance => match self.read_step() {
                IoStatus::Ok => self.state.init_stage = InitStage::EvaluateInstance,
                IoStatus::Nok => self.state.init_stage = InitStage::RecoverData,
                IoStatus::Busy => {}
            },
            InitStage::EvaluateInstance => {
                let block_id = self.state.block_id;
                self.state.init_stage = if self.work_digest_valid(block_id) {
                    InitStage::Cache
                } else {
                    InitStage::RecoverData
                };
            }
            InitStage::Cache => {
                let block_id = self.state.block_id;
                let digest_len = C::DIGEST_SIZE;
                let block = &mut self.blocks[block_id];
                let data_len = block.config.data_size;
                block
                    .cache
                    .copy_from_slice(&self.work[digest_len..digest_len + data_len]);
                self.state.init_stage = InitStage::Ready;
            }
            InitStage::RecoverData => {
                let block_id = self.state.block_id;
                self.recover_block(block_id);
                self.state.init_stage = InitStage::Ready;
            }
            InitStage::Ready => {}
        }
        self.state.init_stage == InitStage::Ready
    }

    /// The index of the block's currently active profile.
    ///
    /// # Panics
    ///
    /// Panics if `block_id` is out of range.
    pub fn active_profile(&self, block_id: usize) -> u8 {
        let block = &self.blocks[block_id];
        debug_assert!(
            matches!(block.config.policy, ManagementPolicy::MultiProfile { .. }),
            "active_profile queried on a non-multi-profile block"
        );
        block.active_instance
    }

    /// Requests a switch to another profile of a multi-profile block.
    ///
    /// Returns whether the request was accepted. Rejected while the engine
    /// is suspended, while a switch is already pending, or when `target` is
    /// the active profile. A pending *write* does not reject the switch:
    /// the in-flight write completes against its snapshot first, then the
    /// fetch runs.
    ///
    /// On acceptance the active index moves immediately and the cache
    /// becomes unusable until [`is_multi_profile_block_ready`] reports
    /// `true` again.
    ///
    /// [`is_multi_profile_block_ready`]: Engine::is_multi_profile_block_ready
    ///
    /// # Panics
    ///
    /// Panics if `block_id` is out of range.
    pub fn initiate_switch_to_profile(&mut self, block_id: usize, target_profile: u8) -> bool {
        let accept = self.state.accept_new_requests;
        let block = &mut self.blocks[block_id];
        let ManagementPolicy::MultiProfile { instance_count } = block.config.policy else {
            debug_assert!(false, "profile switch on a non-multi-profile block");
            return false;
        };
        if target_profile >= instance_count {
            debug_assert!(false, "target profile out of range for block {block_id}");
            return false;
        }

        if accept
            && !block.flags.contains(BlockFlags::FETCH_PENDING)
            && target_profile != block.active_instance
        {
            block.active_instance = target_profile;
            block.flags.remove(BlockFlags::RECOVERED);
            block.flags.insert(BlockFlags::FETCH_PENDING);
            return true;
        }
        false
    }

    /// Whether the block's cache holds its active profile.
    ///
    /// `false` from the moment a switch is accepted until its fetch
    /// completes.
    ///
    /// # Panics
    ///
    /// Panics if `block_id` is out of range.
    pub fn is_multi_profile_block_ready(&self, block_id: usize) -> bool {
        !self.blocks[block_id]
            .flags
            .contains(BlockFlags::FETCH_PENDING)
    }
}
