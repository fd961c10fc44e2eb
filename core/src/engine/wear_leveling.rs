//! Wear-leveling blocks: one parameter cache and N checksummed instances on
//! the device. Cache byte 0 is a one-byte sequence counter in the domain
//! `0..=254`; the stored byte `0xFF` marks an erased or corrupted instance.
//! At init the most recently written valid instance is located through the
//! counter and loaded; each write lands on the next slot in turn and bumps
//! the counter afterwards, so a failed slot is still burned.

use heapless::Vec as StackVec;

use nvparam_hal::{Checksum, EepromBus, EngineCallbacks};

use crate::engine::io::{IoStatus, ReadTarget};
use crate::engine::Engine;
use crate::status::{
    wrap_inc, MAX_WEAR_LEVELING_INSTANCES, SEQUENCE_INVALID, SEQUENCE_MODULUS,
};

impl<B: EepromBus, C: Checksum, U: EngineCallbacks> Engine<B, C, U> {
    /// Initializes a wear-leveling block. Synchronous.
    pub(crate) fn init_wear_leveling_block(&mut self, block_id: usize, instance_count: u8) {
        let digest_len = C::DIGEST_SIZE;
        let data_len = self.blocks[block_id].config.data_size;
        let base = self.blocks[block_id].config.offset_in_eeprom;
        let instance_len = data_len + digest_len;

        // Scan every instance and collect its sequence counter, marking
        // unreadable or corrupted ones invalid.
        let mut counters: StackVec<u8, MAX_WEAR_LEVELING_INSTANCES> = StackVec::new();
        for instance in 0..usize::from(instance_count) {
            let offset = base + instance * instance_len;
            let read = self.blocking_read(block_id, offset, instance_len, ReadTarget::WorkBuffer);
            let valid = read == IoStatus::Ok && self.work_digest_valid(block_id);
            // Instance counts are validated against the scan capacity.
            let _ = counters.push(if valid {
                self.work[digest_len]
            } else {
                SEQUENCE_INVALID
            });
        }

        match most_recent_instance(&counters) {
            Some(newest) => {
                self.blocks[block_id].active_instance = newest as u8;

                // Re-read the newest instance's payload straight into the
                // cache, skipping the digest bytes.
                let offset = base + newest * instance_len + digest_len;
                let read = self.blocking_read(block_id, offset, data_len, ReadTarget::BlockCache);
                if read == IoStatus::Ok {
                    // Pre-arm the next write: counter and slot one past the
                    // newest instance.
                    let block = &mut self.blocks[block_id];
                    block.cache[0] = wrap_inc(counters[newest], SEQUENCE_MODULUS);
                    block.active_instance = wrap_inc(newest as u8, instance_count);
                    log::debug!("block {block_id}: loaded instance {newest}");
                } else {
                    self.recover_wear_leveling_block(block_id);
                }
            }
            None => self.recover_wear_leveling_block(block_id),
        }
    }

    fn recover_wear_leveling_block(&mut self, block_id: usize) {
        let block = &mut self.blocks[block_id];
        block.active_instance = 0;
        block.cache[0] = 0;
        // Defaults restoration skips byte 0, so the counter stays at 0.
        self.recover_block(block_id);
    }
}

/// Locates the most recently written valid instance in a circular array of
/// sequence counters (`SEQUENCE_INVALID` entries are erased/corrupted).
///
/// A single pass of `len + 1` probes tracks the minimum, the maximum, and
/// the boundaries of a counter rollover: a valid entry smaller than its
/// valid predecessor by at least `len` opens the rollover region, one
/// larger by at least `len` closes it. The extra probe revisits index 0 so
/// a rollover spanning the array ends is still caught. Without a rollover
/// the maximum is the newest entry (ties resolve to the later index);
/// with one, the newest entry is the maximum within the pre-rollover
/// region.
///
/// Returns `None` when no instance is valid.
pub(crate) fn most_recent_instance(counters: &[u8]) -> Option<usize> {
    let len = counters.len();
    let mut previous_valid: Option<u8> = None;
    let mut min = SEQUENCE_INVALID;
    let mut max = 0u8;
    let mut min_index: Option<usize> = None;
    let mut max_index: Option<usize> = None;
    let mut rollover_start: Option<usize> = None;
    let mut rollover_end: Option<usize> = None;

    let mut index = 0;
    for _ in 0..=len {
        let current = counters[index];
        if current != SEQUENCE_INVALID {
            if current < min {
                min = current;
                min_index = Some(index);
            }
            if current >= max {
                max = current;
                max_index = Some(index);
            }

            if let Some(previous) = previous_valid {
                if rollover_start.is_none()
                    && current < previous
                    && previous - current >= len as u8
                {
                    rollover_start = Some(index);
                } else if rollover_end.is_none()
                    && current > previous
                    && current - previous >= len as u8
                {
                    rollover_end = Some(index);
                }
            }
            previous_valid = Some(current);
        }

        index = (index + 1) % len;
    }

    let max_index = max_index?;
    debug_assert!(min_index.is_some());

    if max - min < len as u8 {
        // No rollover occurred; the plain maximum is the newest.
        return Some(max_index);
    }

    let (Some(start), Some(end)) = (rollover_start, rollover_end) else {
        // A rollover-sized spread without both boundaries means the stored
        // counters are inconsistent; fall back to the plain maximum.
        debug_assert!(false, "rollover detected without both boundaries");
        return Some(max_index);
    };
    let window = if end > start {
        end - start
    } else {
        len - (start - end)
    };
    max_in_window(counters, start, window)
}

/// Index of the largest valid counter within `count` circular steps from
/// `start`. Ties resolve to the later index.
fn max_in_window(counters: &[u8], start: usize, count: usize) -> Option<usize> {
    let mut max = 0u8;
    let mut max_index = None;
    let mut index = start;
    for _ in 0..count {
        let current = counters[index];
        if current != SEQUENCE_INVALID && current >= max {
            max = current;
            max_index = Some(index);
        }
        index = (index + 1) % counters.len();
    }
    max_index
}

#[cfg(test)]
mod tests {
    use super::most_recent_instance;

    #[track_caller]
    fn expect(counters: &[u8], newest: Option<usize>) {
        assert_eq!(
            most_recent_instance(counters),
            newest,
            "counters: {counters:02X?}"
        );
    }

    #[test]
    fn two_instances() {
        expect(&[0xFF, 0xFF], None);
        expect(&[0x00, 0xFF], Some(0));
        expect(&[0x00, 0x01], Some(1));
        expect(&[0xFF, 0x01], Some(1));
        expect(&[0xFD, 0xFE], Some(1));
        // Counter wrapped between the slots.
        expect(&[0xFE, 0x00], Some(1));
        expect(&[0xFE, 0xFF], Some(0));
    }

    #[test]
    fn fifteen_instances_single_survivor() {
        let mut counters = [0xFFu8; 15];
        expect(&counters, None);

        counters[14] = 0x55;
        expect(&counters, Some(14));

        let mut counters = [0xFFu8; 15];
        counters[6] = 0x00;
        expect(&counters, Some(6));

        let mut counters = [0xFFu8; 15];
        counters[7] = 0xFE;
        expect(&counters, Some(7));
    }

    #[test]
    fn fifteen_instances_partial_population() {
        expect(
            &[
                0xFF, 0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF,
            ],
            Some(2),
        );
        expect(
            &[
                0xFF, 0xFF, 0x02, 0x03, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF,
            ],
            Some(3),
        );
        expect(
            &[
                0xFF, 0xFF, 0x02, 0x03, 0xFF, 0xFF, 0xFF, 0x07, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF,
            ],
            Some(7),
        );
    }

    #[test]
    fn fifteen_instances_rollover_and_runs() {
        // Newest is the pre-rollover maximum at index 0.
        expect(
            &[
                0x16, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13,
                0x14, 0x15,
            ],
            Some(0),
        );
        // Same shape with invalid gaps inside the run.
        expect(
            &[
                0x16, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0xFF, 0x12, 0xFF,
                0xFF, 0x15,
            ],
            Some(0),
        );
        // Plain ascending run, no rollover.
        expect(
            &[
                0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
                0x0D, 0x0E,
            ],
            Some(14),
        );
        // Run wrapping the array boundary.
        expect(
            &[
                0x0E, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
                0x0C, 0x0D,
            ],
            Some(0),
        );
    }

    #[test]
    fn fifteen_instances_counter_wrap_with_gaps() {
        // Counter wrapped through 254 -> 0 with heavily skipped increments.
        expect(
            &[
                0xFF, 0xFF, 0xFF, 0x00, 0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
                0xFF, 0xFF,
            ],
            Some(3),
        );
        expect(
            &[
                0xFF, 0xFF, 0xAA, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFF, 0xFB, 0xFC, 0xFD,
                0xFE, 0xFF,
            ],
            Some(2),
        );
        expect(
            &[
                0x01, 0x02, 0x03, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFF, 0xFB, 0xFC, 0xFD,
                0xFE, 0x00,
            ],
            Some(2),
        );
        expect(
            &[
                0xFF, 0x00, 0x01, 0xF5, 0xF6, 0xF7, 0xF8, 0xF9, 0xFA, 0xFF, 0xFB, 0xFC, 0xFD,
                0xFE, 0xFF,
            ],
            Some(2),
        );
    }
}
