//! Shared read/write protocol over the EEPROM bus.
//!
//! Both protocols are explicit state machines advanced one transition per
//! call, so a `periodic_task` tick stays bounded. The read machine is used
//! by the synchronous block initializers (which spin it to completion) and
//! by the asynchronous multi-profile fetch; the write machine is driven
//! exclusively by the scheduler.

use nvparam_hal::{BusStatus, Checksum, EepromBus, EngineCallbacks};

use crate::config::ManagementPolicy;
use crate::engine::Engine;
use crate::status::{wrap_inc, BlockFlags, BACKUP_COPY_INSTANCES, SEQUENCE_MODULUS};

/// Stages shared by the read and write state machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IoStage {
    /// Push the request to the bus driver.
    Initiate,
    /// Poll the driver until the request completes.
    Waiting,
    /// Post-write actions (policy-specific); writes only.
    Finalize,
    /// Terminal.
    Complete,
}

/// Outcome of an I/O request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IoStatus {
    Ok,
    Nok,
    Busy,
}

/// Destination of a read request.
///
/// Reads normally land in the work buffer so the digest can be evaluated.
/// The wear-leveling initializer re-reads the chosen instance's payload
/// directly into the block cache, skipping the digest bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadTarget {
    WorkBuffer,
    BlockCache,
}

/// The engine's single in-flight bus request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoRequest {
    pub offset: usize,
    pub len: usize,
    pub target: ReadTarget,
    pub stage: IoStage,
    pub status: IoStatus,
}

impl IoRequest {
    pub(crate) fn idle() -> Self {
        Self {
            offset: 0,
            len: 0,
            target: ReadTarget::WorkBuffer,
            stage: IoStage::Complete,
            status: IoStatus::Ok,
        }
    }
}

impl<B: EepromBus, C: Checksum, U: EngineCallbacks> Engine<B, C, U> {
    /// Prepares a read of `len` bytes at `offset` for `block_id`.
    pub(crate) fn start_read(
        &mut self,
        block_id: usize,
        offset: usize,
        len: usize,
        target: ReadTarget,
    ) {
        self.state.block_id = block_id;
        self.state.init_stage = super::InitStage::FetchInstance;
        self.state.io = IoRequest {
            offset,
            len,
            target,
            stage: IoStage::Initiate,
            status: IoStatus::Busy,
        };
    }

    /// Advances the read machine by one transition.
    pub(crate) fn read_step(&mut self) -> IoStatus {
        let stage = self.state.io.stage;
        match stage {
            IoStage::Initiate => {
                let offset = self.state.io.offset;
                let len = self.state.io.len;
                let target = self.state.io.target;
                let accepted = match target {
                    ReadTarget::WorkBuffer => self.bus.begin_read(offset, &mut self.work[..len]),
                    ReadTarget::BlockCache => {
                        let cache = &mut self.blocks[self.state.block_id].cache;
                        self.bus.begin_read(offset, &mut cache[..len])
                    }
                };
                if accepted {
                    self.state.io.stage = IoStage::Waiting;
                } else {
                    self.state.io.status = IoStatus::Nok;
                    self.state.io.stage = IoStage::Complete;
                    log::error!("block {}: bus rejected read request", self.state.block_id);
                    debug_assert!(false, "bus rejected a read while believed idle");
                }
            }
            IoStage::Waiting => {
                self.bus.task();
                match self.bus.status() {
                    BusStatus::Ok => {
                        self.state.io.status = IoStatus::Ok;
                        self.state.io.stage = IoStage::Complete;
                    }
                    BusStatus::Nok => {
                        self.state.io.status = IoStatus::Nok;
                        self.state.io.stage = IoStage::Complete;
                    }
                    _ => {} // still busy
                }
            }
            _ => {} // complete
        }
        self.state.io.status
    }

    /// Runs a read to completion. Init-path only: the periodic task is not
    /// live yet, so the machine is spun in place.
    pub(crate) fn blocking_read(
        &mut self,
        block_id: usize,
        offset: usize,
        len: usize,
        target: ReadTarget,
    ) -> IoStatus {
        self.start_read(block_id, offset, len, target);
        loop {
            match self.read_step() {
                IoStatus::Busy => {}
                done => return done,
            }
        }
    }

    /// Checks the digest of the instance currently held in the work buffer.
    pub(crate) fn work_digest_valid(&mut self, block_id: usize) -> bool {
        let digest_len = C::DIGEST_SIZE;
        let data_len = self.blocks[block_id].config.data_size;
        self.checksum
            .compute(&self.work[digest_len..digest_len + data_len], &mut self.scratch);
        self.scratch[..] == self.work[..digest_len]
    }

    /// Prepares the write of `block_id`'s cache: resolves the target
    /// instance offset and snapshots the cache into the work buffer.
    ///
    /// The snapshot keeps a single write operation consistent even if the
    /// application mutates the cache while the write is in flight. On
    /// targets with interrupt-context cache writers, this copy is the spot
    /// to wrap in the platform's critical section.
    pub(crate) fn start_write(&mut self, block_id: usize) {
        let digest_len = C::DIGEST_SIZE;
        self.state.block_id = block_id;
        self.state.write_stage = IoStage::Initiate;

        let block = &mut self.blocks[block_id];
        // `write_failed` reports the outcome of the most recent write.
        block.flags.remove(BlockFlags::WRITE_FAILED);
        let data_len = block.config.data_size;
        let instance_len = data_len + digest_len;
        let instance_offset = match block.config.policy {
            ManagementPolicy::Basic | ManagementPolicy::BackupCopy => {
                block.active_instance = 0;
                0
            }
            ManagementPolicy::WearLeveling { .. } | ManagementPolicy::MultiProfile { .. } => {
                usize::from(block.active_instance) * instance_len
            }
        };

        self.state.io.offset = block.config.offset_in_eeprom + instance_offset;
        self.state.io.len = instance_len;
        self.state.io.status = IoStatus::Busy;

        self.work[digest_len..instance_len].copy_from_slice(&block.cache);
    }

    /// Advances the write machine by one transition.
    ///
    /// Returns `true` once the write (including any policy-specific
    /// follow-up instance) has completed.
    pub(crate) fn write_step(&mut self) -> bool {
        let stage = self.state.write_stage;
        match stage {
            IoStage::Initiate => {
                self.seal_work_buffer();
                self.write_initiate();
            }
            IoStage::Waiting => self.write_wait(),
            IoStage::Finalize => self.write_finalize(),
            IoStage::Complete => {}
        }
        self.state.write_stage == IoStage::Complete
    }

    /// Computes the digest over the work buffer payload and stores it in
    /// front, completing the on-device instance image.
    fn seal_work_buffer(&mut self) {
        let digest_len = C::DIGEST_SIZE;
        let payload_len = self.state.io.len - digest_len;
        let (digest, payload) = self.work.split_at_mut(digest_len);
        self.checksum.compute(&payload[..payload_len], digest);
    }

    /// Pushes the prepared instance image to the bus driver.
    fn write_initiate(&mut self) {
        let offset = self.state.io.offset;
        let len = self.state.io.len;
        if self.bus.begin_write(offset, &self.work[..len]) {
            self.state.write_stage = IoStage::Waiting;
        } else {
            log::error!("block {}: bus rejected write request", self.state.block_id);
            debug_assert!(false, "bus rejected a write while believed idle");
            let block = &mut self.blocks[self.state.block_id];
            block
                .flags
                .insert(BlockFlags::WRITE_FAILED | BlockFlags::WRITE_COMPLETE);
            self.state.write_stage = IoStage::Complete;
        }
    }

    /// Polls the driver for the outcome of the in-flight write.
    fn write_wait(&mut self) {
        match self.bus.status() {
            BusStatus::Ok => self.state.write_stage = IoStage::Finalize,
            BusStatus::Nok => {
                let block_id = self.state.block_id;
                log::warn!("block {block_id}: write failed");
                self.blocks[block_id].flags.insert(BlockFlags::WRITE_FAILED);
                self.state.write_stage = IoStage::Finalize;
            }
            _ => {} // still busy
        }
    }

    /// Post-write actions specific to backup-copy and wear-leveling blocks.
    fn write_finalize(&mut self) {
        let block_id = self.state.block_id;
        let policy = self.blocks[block_id].config.policy;
        let instance_len = self.blocks[block_id].config.data_size + C::DIGEST_SIZE;

        // Most expected outcome; the backup-copy arm takes it back while
        // the second instance is still outstanding.
        self.blocks[block_id].flags.insert(BlockFlags::WRITE_COMPLETE);
        self.state.write_stage = IoStage::Complete;

        match policy {
            ManagementPolicy::BackupCopy => {
                let next = self.blocks[block_id].active_instance + 1;
                self.blocks[block_id].active_instance = next;
                if usize::from(next) < BACKUP_COPY_INSTANCES {
                    self.blocks[block_id].flags.remove(BlockFlags::WRITE_COMPLETE);
                    self.state.io.offset += instance_len;
                    self.write_initiate();
                }
            }
            ManagementPolicy::WearLeveling { instance_count } => {
                // A failed slot is still burned: the counter and the slot
                // advance regardless of the write outcome.
                let block = &mut self.blocks[block_id];
                block.cache[0] = wrap_inc(block.cache[0], SEQUENCE_MODULUS);
                block.active_instance = wrap_inc(block.active_instance, instance_count);
            }
            ManagementPolicy::Basic | ManagementPolicy::MultiProfile { .. } => {}
        }
    }
}
