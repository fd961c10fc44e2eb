//! Basic blocks: one parameter cache and one checksummed instance on the
//! device. The instance is read and validated at init; writes overwrite it
//! in place.

use nvparam_hal::{Checksum, EepromBus, EngineCallbacks};

use crate::engine::io::{IoStatus, ReadTarget};
use crate::engine::Engine;

impl<B: EepromBus, C: Checksum, U: EngineCallbacks> Engine<B, C, U> {
    /// Initializes a basic block. Synchronous.
    pub(crate) fn init_basic_block(&mut self, block_id: usize) {
        let digest_len = C::DIGEST_SIZE;
        let data_len = self.blocks[block_id].config.data_size;
        let offset = self.blocks[block_id].config.offset_in_eeprom;
        let instance_len = data_len + digest_len;

        let read = self.blocking_read(block_id, offset, instance_len, ReadTarget::WorkBuffer);
        if read == IoStatus::Ok && self.work_digest_valid(block_id) {
            let block = &mut self.blocks[block_id];
            block
                .cache
                .copy_from_slice(&self.work[digest_len..instance_len]);
            log::debug!("block {block_id}: loaded");
        } else {
            self.recover_block(block_id);
        }
    }
}
