//! # The Engine
//!
//! Owns every piece of engine state - the block table with its RAM caches,
//! the shared work buffer, and the scheduler - and exposes the public
//! operation surface as its methods. The storage driver, the checksum, and
//! the callback sink are injected at construction, so tests can run the
//! engine against a RAM simulator and assert callback orderings.
//!
//! All progress happens on [`Engine::periodic_task`]; the sole exception is
//! [`Engine::init`], which drives each block's initializer synchronously
//! because the engine is not yet open for requests at that point.

mod backup_copy;
mod basic;
mod io;
mod multi_profile;
mod wear_leveling;

use alloc::vec;
use alloc::vec::Vec;

use nvparam_hal::{BusStatus, Checksum, EepromBus, EngineCallbacks};

use crate::config::{self, BlockConfig, ManagementPolicy, RecoveryStrategy};
use crate::error::ConfigResult;
use crate::status::{BlockFlags, INVALID_PROFILE_INSTANCE};

use io::{IoRequest, IoStage};

/// The operation currently owning the work buffer and the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    None,
    Write,
    ProfileFetch,
}

/// Stages of the block-initialization / profile-fetch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitStage {
    FetchInstance,
    EvaluateInstance,
    Cache,
    RecoverData,
    Ready,
}

/// One configured block: immutable config plus runtime state.
struct Block {
    config: BlockConfig,
    flags: BlockFlags,
    /// Index of the instance the next write targets (wear-leveling), or of
    /// the active profile (multi-profile). 4-bit domain;
    /// [`INVALID_PROFILE_INSTANCE`] until a profile is selected.
    active_instance: u8,
    /// RAM mirror of the block's current parameter values.
    cache: Vec<u8>,
}

impl Block {
    fn new(config: BlockConfig) -> Self {
        let cache = vec![0; config.data_size];
        let active_instance = match config.policy {
            ManagementPolicy::MultiProfile { .. } => INVALID_PROFILE_INSTANCE,
            _ => 0,
        };
        Self {
            config,
            flags: BlockFlags::empty(),
            active_instance,
            cache,
        }
    }

    fn reset(&mut self) {
        self.cache.fill(0);
        self.flags = BlockFlags::empty();
        self.active_instance = match self.config.policy {
            ManagementPolicy::MultiProfile { .. } => INVALID_PROFILE_INSTANCE,
            _ => 0,
        };
    }
}

/// Engine-global scheduler state.
struct EngineState {
    /// Gate for new user requests, toggled by resume/suspend.
    accept_new_requests: bool,
    operation: Operation,
    /// Block under service; valid while `operation != None` and during
    /// synchronous init.
    block_id: usize,
    /// Round-robin cursor, pre-incremented on each probe.
    next_block: usize,
    /// Write machine stage. Disjoint use with `init_stage`: at most one of
    /// the two machines runs at a time.
    write_stage: IoStage,
    /// Init/fetch machine stage.
    init_stage: InitStage,
    /// The single in-flight bus request.
    io: IoRequest,
}

impl EngineState {
    fn new(block_count: usize) -> Self {
        Self {
            accept_new_requests: false,
            operation: Operation::None,
            block_id: 0,
            // The cursor is pre-incremented, so the first probe after init
            // lands on block 0.
            next_block: block_count - 1,
            write_stage: IoStage::Complete,
            init_stage: InitStage::Ready,
            io: IoRequest::idle(),
        }
    }
}

/// The parameter-persistence engine.
///
/// Generic over the injected storage driver `B`, checksum `C`, and callback
/// sink `U`; a release build for a concrete target is fully monomorphized.
pub struct Engine<B, C, U> {
    bus: B,
    checksum: C,
    callbacks: U,
    blocks: Vec<Block>,
    /// Staging area for the in-flight instance image,
    /// `max(data_size) + DIGEST_SIZE` bytes.
    work: Vec<u8>,
    /// Digest comparison scratch, `DIGEST_SIZE` bytes.
    scratch: Vec<u8>,
    state: EngineState,
}

impl<B: EepromBus, C: Checksum, U: EngineCallbacks> Engine<B, C, U> {
    /// Assembles an engine from its collaborators and a validated block
    /// configuration table.
    ///
    /// Block IDs are positional: block `i` is `configs[i]`. All RAM the
    /// engine will ever use (caches, work buffer) is allocated here; the
    /// tick path allocates nothing.
    pub fn new(bus: B, checksum: C, callbacks: U, configs: Vec<BlockConfig>) -> ConfigResult<Self> {
        config::validate(&configs, C::DIGEST_SIZE)?;

        let work_len = configs
            .iter()
            .map(|cfg| cfg.data_size + C::DIGEST_SIZE)
            .max()
            .unwrap_or(0);
        let block_count = configs.len();
        let blocks: Vec<Block> = configs.into_iter().map(Block::new).collect();

        Ok(Self {
            bus,
            checksum,
            callbacks,
            blocks,
            work: vec![0; work_len],
            scratch: vec![0; C::DIGEST_SIZE],
            state: EngineState::new(block_count),
        })
    }

    /// Number of configured blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Read access to a block's cache.
    pub fn cache(&self, block_id: usize) -> &[u8] {
        &self.blocks[block_id].cache
    }

    /// Write access to a block's cache.
    ///
    /// The application mutates parameter values here and then schedules a
    /// write with [`initiate_block_write`]. An already in-flight write is
    /// unaffected: it operates on the snapshot taken when it started.
    ///
    /// For wear-leveling blocks, byte 0 is the engine-owned sequence
    /// counter and must not be modified.
    ///
    /// [`initiate_block_write`]: Engine::initiate_block_write
    pub fn cache_mut(&mut self, block_id: usize) -> &mut [u8] {
        &mut self.blocks[block_id].cache
    }

    /// Fetches and validates every configured block from the device and
    /// populates the caches.
    ///
    /// Synchronous: blocks are initialized one after another in ascending
    /// ID order, with [`EngineCallbacks::on_block_init_complete`] after
    /// each. Execution time depends entirely on the configuration.
    ///
    /// The engine comes up suspended; call [`resume`](Engine::resume) to
    /// start accepting requests.
    pub fn init(&mut self) {
        log::info!("initializing {} parameter blocks", self.blocks.len());
        self.bus.init();

        for block_id in 0..self.blocks.len() {
            match self.blocks[block_id].config.policy {
                ManagementPolicy::Basic => self.init_basic_block(block_id),
                ManagementPolicy::BackupCopy => self.init_backup_copy_block(block_id),
                ManagementPolicy::WearLeveling { instance_count } => {
                    self.init_wear_leveling_block(block_id, instance_count)
                }
                ManagementPolicy::MultiProfile { instance_count } => {
                    self.init_multi_profile_block(block_id, instance_count)
                }
            }
            self.callbacks.on_block_init_complete(block_id);
        }

        self.state.operation = Operation::None;
        self.state.next_block = self.blocks.len() - 1;
        self.state.accept_new_requests = false;
    }

    /// Clears all engine state and de-initializes the storage driver.
    ///
    /// The engine is not operational afterwards; call
    /// [`init`](Engine::init) again to resume service. Pending requests are
    /// discarded unconditionally.
    pub fn deinit(&mut self) {
        log::info!("engine deinitialized");
        self.bus.deinit();
        self.work.fill(0);
        self.scratch.fill(0);
        for block in &mut self.blocks {
            block.reset();
        }
        self.state = EngineState::new(self.blocks.len());
    }

    /// Starts (or resumes) acceptance of new write and profile-switch
    /// requests.
    pub fn resume(&mut self) {
        log::debug!("request acceptance resumed");
        self.state.accept_new_requests = true;
    }

    /// Stops acceptance of new requests. Already queued or in-flight work
    /// still completes.
    pub fn suspend(&mut self) {
        log::debug!("request acceptance suspended");
        self.state.accept_new_requests = false;
    }

    /// True while any operation is in flight or any block has a pending
    /// request.
    pub fn is_busy(&self) -> bool {
        self.state.operation != Operation::None
            || self
                .blocks
                .iter()
                .any(|b| b.flags.intersects(BlockFlags::WRITE_PENDING | BlockFlags::FETCH_PENDING))
    }

    /// Requests an asynchronous write of the block's cache to the device.
    ///
    /// Returns whether the request was accepted. Rejected while the engine
    /// is suspended, or while the block already has a pending write or
    /// profile switch. The write is not guaranteed to start immediately;
    /// it competes with other blocks' requests.
    ///
    /// # Panics
    ///
    /// Panics if `block_id` is out of range.
    pub fn initiate_block_write(&mut self, block_id: usize) -> bool {
        let accept = self.state.accept_new_requests;
        let block = &mut self.blocks[block_id];
        if accept
            && !block
                .flags
                .intersects(BlockFlags::WRITE_PENDING | BlockFlags::FETCH_PENDING)
        {
            block.flags.insert(BlockFlags::WRITE_PENDING);
            block.flags.remove(BlockFlags::WRITE_COMPLETE);
            return true;
        }
        false
    }

    /// Returns a snapshot of the block's status flags.
    ///
    /// # Panics
    ///
    /// Panics if `block_id` is out of range.
    pub fn block_status(&self, block_id: usize) -> BlockFlags {
        self.blocks[block_id].flags
    }

    /// Populates the block's cache with its configured default values.
    ///
    /// Does not schedule a write. For wear-leveling blocks the sequence
    /// counter (cache byte 0) is preserved.
    ///
    /// # Panics
    ///
    /// Panics if `block_id` is out of range.
    pub fn restore_defaults(&mut self, block_id: usize) {
        let block = &mut self.blocks[block_id];
        let skip = match block.config.policy {
            ManagementPolicy::WearLeveling { .. } => 1,
            _ => 0,
        };
        config::fill_defaults(&mut block.cache, &block.config.defaults, skip);
    }

    /// Recovers a block whose stored data could not be validated: flags it,
    /// loads defaults, and - per the configured strategy - schedules a
    /// repair write.
    pub(crate) fn recover_block(&mut self, block_id: usize) {
        log::warn!("block {block_id}: stored data invalid, restoring defaults");
        let repair = self.blocks[block_id].config.recovery == RecoveryStrategy::DefaultsAndRepair;
        let block = &mut self.blocks[block_id];
        block.flags.insert(BlockFlags::RECOVERED);
        if repair {
            block.flags.insert(BlockFlags::WRITE_PENDING);
        }
        self.restore_defaults(block_id);
    }

    /// Processes pending write and profile-fetch requests.
    ///
    /// Must be called periodically from the application's super-loop. One
    /// call advances the active operation by at most one state-machine
    /// step; when no operation is active and the bus is free, it dispatches
    /// the next pending block in round-robin order. The bus driver is
    /// ticked last.
    pub fn periodic_task(&mut self) {
        if !self.process_current_request() {
            self.try_process_next_request();
        }
        self.bus.task();
    }

    /// Advances the active operation, if any. Returns whether an operation
    /// is still active afterwards - completion frees the same tick for
    /// dispatching the next request.
    fn process_current_request(&mut self) -> bool {
        match self.state.operation {
            Operation::Write => {
                if self.write_step() {
                    let block_id = self.state.block_id;
                    log::debug!("block {block_id}: write complete");
                    self.state.operation = Operation::None;
                    self.callbacks.on_block_write_complete(block_id);
                }
            }
            Operation::ProfileFetch => {
                if self.profile_fetch_step() {
                    let block_id = self.state.block_id;
                    log::debug!("block {block_id}: profile fetch complete");
                    self.state.operation = Operation::None;
                    self.callbacks.on_profile_fetch_complete(block_id);
                }
            }
            Operation::None => {}
        }
        self.state.operation != Operation::None
    }

    /// Dispatches the highest-priority job of the next pending block.
    fn try_process_next_request(&mut self) {
        if self.bus.status() == BusStatus::Busy {
            return;
        }
        let Some(block_id) = self.next_block_to_process() else {
            return;
        };

        if self.blocks[block_id].flags.contains(BlockFlags::WRITE_PENDING) {
            // Clear as early as possible so follow-up write requests can
            // queue while this one is in flight.
            self.blocks[block_id].flags.remove(BlockFlags::WRITE_PENDING);
            self.state.operation = Operation::Write;
            self.start_write(block_id);
            log::debug!("block {block_id}: write started");
            self.callbacks.on_block_write_started(block_id);
        } else if self.blocks[block_id].flags.contains(BlockFlags::FETCH_PENDING) {
            self.blocks[block_id].flags.remove(BlockFlags::FETCH_PENDING);
            self.state.operation = Operation::ProfileFetch;
            self.start_profile_read(block_id);
            let _ = self.profile_fetch_step();
            log::debug!("block {block_id}: profile fetch started");
            self.callbacks.on_profile_fetch_started(block_id);
        }
    }

    /// Round-robin selection: bumps the cursor up to once per block and
    /// returns the first with a pending request. The just-serviced block is
    /// probed last, so no block starves.
    fn next_block_to_process(&mut self) -> Option<usize> {
        let block_count = self.blocks.len();
        for _ in 0..block_count {
            self.state.next_block = (self.state.next_block + 1) % block_count;
            let block_id = self.state.next_block;
            if self.blocks[block_id]
                .flags
                .intersects(BlockFlags::WRITE_PENDING | BlockFlags::FETCH_PENDING)
            {
                return Some(block_id);
            }
        }
        None
    }
}
