//! Backup-copy blocks: one parameter cache and two identical checksummed
//! instances on the device. The first valid instance found at init
//! populates the cache; every write refreshes both instances back-to-back.

use nvparam_hal::{Checksum, EepromBus, EngineCallbacks};

use crate::engine::io::{IoStatus, ReadTarget};
use crate::engine::Engine;
use crate::status::{BlockFlags, BACKUP_COPY_INSTANCES};

impl<B: EepromBus, C: Checksum, U: EngineCallbacks> Engine<B, C, U> {
    /// Initializes a backup-copy block. Synchronous.
    pub(crate) fn init_backup_copy_block(&mut self, block_id: usize) {
        let digest_len = C::DIGEST_SIZE;
        let data_len = self.blocks[block_id].config.data_size;
        let base = self.blocks[block_id].config.offset_in_eeprom;
        let instance_len = data_len + digest_len;

        // Bit i records whether instance i carried a valid digest.
        let mut validity_mask = 0u8;
        let mut cache_loaded = false;

        for instance in 0..BACKUP_COPY_INSTANCES {
            let offset = base + instance * instance_len;
            let read = self.blocking_read(block_id, offset, instance_len, ReadTarget::WorkBuffer);
            if read == IoStatus::Ok && self.work_digest_valid(block_id) {
                validity_mask |= 1 << instance;
                if !cache_loaded {
                    cache_loaded = true;
                    let block = &mut self.blocks[block_id];
                    block
                        .cache
                        .copy_from_slice(&self.work[digest_len..instance_len]);
                }
            }
        }

        match validity_mask {
            0b11 => log::debug!("block {block_id}: both copies valid"),
            0b00 => self.recover_block(block_id),
            _ => {
                // One copy is damaged; the scheduled write refreshes both.
                log::warn!("block {block_id}: one copy invalid, scheduling repair");
                self.blocks[block_id].flags.insert(BlockFlags::WRITE_PENDING);
            }
        }
    }
}
