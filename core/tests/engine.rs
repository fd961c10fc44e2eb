//! Engine-wide integration tests: startup, scheduling fairness, request
//! gating, and failure reporting, driven against the RAM simulator.

mod common;

use common::{blocks_of_kind, region, PolicyKind, Rig, BLOCKS, MULTI_PROFILE_BLOCK};
use nvparam_core::BlockFlags;
use nvparam_sim::CallbackEvent;

#[test]
fn init_from_blank_eeprom_recovers_every_block() {
    let mut rig = Rig::new();
    rig.engine.init();

    for block in 0..BLOCKS.len() {
        assert!(
            rig.engine.block_status(block).contains(BlockFlags::RECOVERED),
            "block {block} should be recovered on a blank device"
        );
    }

    // Init callbacks fire once per block, in ascending ID order.
    let inits: Vec<CallbackEvent> = rig
        .journal
        .events()
        .into_iter()
        .filter(|e| matches!(e, CallbackEvent::InitComplete(_)))
        .collect();
    let expected: Vec<CallbackEvent> = (0..BLOCKS.len()).map(CallbackEvent::InitComplete).collect();
    assert_eq!(inits, expected);

    // Scheduled repair writes drain without user intervention.
    rig.pump_until_idle();
    assert!(!rig.engine.is_busy());
}

#[test]
fn init_from_previously_valid_eeprom_recovers_nothing() {
    let mut rig = Rig::new();
    rig.start();

    for block in 0..BLOCKS.len() {
        rig.engine.restore_defaults(block);
        assert!(rig.engine.initiate_block_write(block));
    }
    rig.pump_until_idle();

    rig.engine.deinit();
    rig.engine.init();

    for block in 0..BLOCKS.len() {
        assert!(
            !rig.engine.block_status(block).contains(BlockFlags::RECOVERED),
            "block {block} should come up clean from a valid device"
        );
    }
}

#[test]
fn written_payload_survives_reinit() {
    let mut rig = Rig::new();
    rig.start_clean();
    let mut rng = common::Rng::new(0x1234);

    let mut payloads = Vec::new();
    for block in 0..BLOCKS.len() {
        // Cache byte 0 of wear-leveling blocks belongs to the engine.
        let skip = usize::from(BLOCKS[block].kind == PolicyKind::WearLeveling);
        let payload = rng.bytes(BLOCKS[block].data_size - skip);
        rig.engine.cache_mut(block)[skip..].copy_from_slice(&payload);
        payloads.push((skip, payload));
        assert!(rig.engine.initiate_block_write(block));
    }
    rig.pump_until_idle();

    rig.engine.deinit();
    rig.engine.init();

    for block in 0..BLOCKS.len() {
        let (skip, ref payload) = payloads[block];
        assert_eq!(
            &rig.engine.cache(block)[skip..],
            &payload[..],
            "block {block} cache should match the written payload"
        );
    }
}

#[test]
fn round_robin_starts_at_block_0() {
    let mut rig = Rig::new();
    rig.start_clean();

    // Request writes for every block in descending ID order.
    for block in (0..BLOCKS.len()).rev() {
        assert!(rig.engine.initiate_block_write(block));
        assert!(rig
            .engine
            .block_status(block)
            .contains(BlockFlags::WRITE_PENDING));
    }

    // The first tick must dispatch block 0 regardless of request order.
    rig.engine.periodic_task();
    assert_eq!(rig.journal.events().first(), Some(&CallbackEvent::WriteStarted(0)));

    rig.pump_until_idle();

    let mut expected = Vec::new();
    for block in 0..BLOCKS.len() {
        expected.push(CallbackEvent::WriteStarted(block));
        expected.push(CallbackEvent::WriteComplete(block));
    }
    assert_eq!(rig.journal.take(), expected);
}

#[test]
fn requests_are_rejected_until_resumed() {
    let mut rig = Rig::new();
    rig.engine.init();

    for block in 0..BLOCKS.len() {
        assert!(!rig.engine.initiate_block_write(block));
    }
    let active = rig.engine.active_profile(MULTI_PROFILE_BLOCK);
    let other = (active + 1) % BLOCKS[MULTI_PROFILE_BLOCK].instances as u8;
    assert!(!rig.engine.initiate_switch_to_profile(MULTI_PROFILE_BLOCK, other));

    // Suspend closes the gate again.
    rig.pump_until_idle();
    rig.engine.resume();
    assert!(rig.engine.initiate_block_write(0));
    rig.engine.suspend();
    assert!(!rig.engine.initiate_block_write(1));

    // The request queued before the suspend still drains.
    rig.pump_until_idle();
    assert!(rig
        .engine
        .block_status(0)
        .contains(BlockFlags::WRITE_COMPLETE));
}

#[test]
fn write_changes_only_the_owning_block_region() {
    let mut rig = Rig::new();
    rig.start_clean();

    for block in 0..BLOCKS.len() {
        let before = rig.eeprom.snapshot();

        rig.bump_cache(block);
        assert!(rig.engine.initiate_block_write(block));
        rig.pump_until_idle();

        let after = rig.eeprom.snapshot();
        let (start, end) = region(block);
        assert_eq!(before[..start], after[..start], "bytes below block {block}");
        assert_eq!(before[end..], after[end..], "bytes above block {block}");
    }
}

#[test]
fn driver_failure_marks_every_write_failed() {
    let mut rig = Rig::new();
    rig.start_clean();

    for block in 0..BLOCKS.len() {
        assert!(rig.engine.initiate_block_write(block));
    }

    rig.eeprom.fail_next_requests(true);
    rig.pump_until_idle();
    rig.eeprom.fail_next_requests(false);

    for block in 0..BLOCKS.len() {
        let status = rig.engine.block_status(block);
        assert!(
            status.contains(BlockFlags::WRITE_FAILED),
            "block {block} should report the failed write"
        );
        assert!(
            status.contains(BlockFlags::WRITE_COMPLETE),
            "block {block} should still complete"
        );
    }

    // A subsequent successful write clears the failure flag.
    assert!(rig.engine.initiate_block_write(0));
    rig.pump_until_idle();
    assert!(!rig
        .engine
        .block_status(0)
        .contains(BlockFlags::WRITE_FAILED));
}

#[test]
fn every_block_is_served_under_sustained_load() {
    let mut rig = Rig::new();
    rig.start_clean();

    let block_count = BLOCKS.len();
    let target = 3 * block_count as u32;
    let mut writes_accepted = vec![0u32; block_count];
    let mut switches_accepted = 0u32;

    let mut guard = 0u32;
    loop {
        let mut more_needed = false;
        for block in 0..block_count {
            if writes_accepted[block] < target {
                rig.bump_cache(block);
                if rig.engine.initiate_block_write(block) {
                    writes_accepted[block] += 1;
                }
            }
            if BLOCKS[block].kind == PolicyKind::MultiProfile
                && rig.engine.is_multi_profile_block_ready(block)
            {
                let next = (rig.engine.active_profile(block) + 1) % BLOCKS[block].instances as u8;
                if rig.engine.initiate_switch_to_profile(block, next) {
                    switches_accepted += 1;
                }
            }
            more_needed |= writes_accepted[block] < target;
        }
        if !more_needed {
            break;
        }
        rig.engine.periodic_task();

        guard += 1;
        assert!(guard < 1_000_000, "request flood failed to drain");
    }
    rig.pump_until_idle();

    for block in 0..block_count {
        let status = rig.engine.block_status(block);
        assert!(!status.contains(BlockFlags::WRITE_FAILED), "block {block}");
        assert!(!status.contains(BlockFlags::WRITE_PENDING), "block {block}");
        assert!(!status.contains(BlockFlags::FETCH_PENDING), "block {block}");
        assert_eq!(writes_accepted[block], target, "block {block} starved");
    }
    assert!(switches_accepted >= blocks_of_kind(PolicyKind::MultiProfile).len() as u32);
    assert!(!rig.engine.is_busy());
}

#[test]
fn deinit_clears_caches_and_status() {
    let mut rig = Rig::new();
    rig.start_clean();

    rig.bump_cache(0);
    assert!(rig.engine.initiate_block_write(0));
    rig.pump_until_idle();

    rig.engine.deinit();
    assert!(!rig.engine.is_busy());
    for block in 0..BLOCKS.len() {
        assert_eq!(rig.engine.block_status(block), BlockFlags::empty());
        assert!(rig.engine.cache(block).iter().all(|&b| b == 0));
    }
}
