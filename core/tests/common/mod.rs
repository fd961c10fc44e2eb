//! Shared harness for the engine integration tests: a standard block table
//! covering every policy, an engine wired to the RAM simulator, and small
//! helpers for driving and inspecting it.

// Each test binary uses its own slice of the harness.
#![allow(dead_code)]

use nvparam_core::{
    BlockConfig, DefaultsPattern, Engine, ManagementPolicy, RecoveryStrategy,
};
use nvparam_crc8::Crc8;
use nvparam_sim::{CallbackJournal, RecordingCallbacks, SimBus, SimHandle};

pub const DIGEST_SIZE: usize = 1;
pub const EEPROM_SIZE: usize = 0x200;

pub type TestEngine = Engine<SimBus, Crc8, RecordingCallbacks>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Basic,
    BackupCopy,
    WearLeveling,
    MultiProfile,
}

/// Geometry of one test block, mirrored by `block_table()`.
pub struct BlockSpec {
    pub kind: PolicyKind,
    pub offset: usize,
    pub data_size: usize,
    pub instances: usize,
}

/// The standard table: every policy, including the wear-leveling extremes
/// (2 and 15 instances) and a defaults-only recovery block.
pub const BLOCKS: &[BlockSpec] = &[
    BlockSpec { kind: PolicyKind::Basic, offset: 0x00, data_size: 16, instances: 1 },
    BlockSpec { kind: PolicyKind::BackupCopy, offset: 0x20, data_size: 12, instances: 2 },
    BlockSpec { kind: PolicyKind::WearLeveling, offset: 0x40, data_size: 8, instances: 2 },
    BlockSpec { kind: PolicyKind::WearLeveling, offset: 0x60, data_size: 6, instances: 15 },
    BlockSpec { kind: PolicyKind::MultiProfile, offset: 0xD0, data_size: 10, instances: 4 },
    BlockSpec { kind: PolicyKind::Basic, offset: 0x100, data_size: 4, instances: 1 },
];

pub const MULTI_PROFILE_BLOCK: usize = 4;
pub const BACKUP_COPY_BLOCK: usize = 1;

/// Defaults image of the multi-profile test block.
pub fn profile_defaults() -> Vec<u8> {
    (0u8..10).map(|i| 0x30 + i).collect()
}

pub fn block_table() -> Vec<BlockConfig> {
    vec![
        BlockConfig {
            offset_in_eeprom: BLOCKS[0].offset,
            data_size: BLOCKS[0].data_size,
            policy: ManagementPolicy::Basic,
            defaults: DefaultsPattern::Fill(0x00),
            recovery: RecoveryStrategy::DefaultsAndRepair,
        },
        BlockConfig {
            offset_in_eeprom: BLOCKS[1].offset,
            data_size: BLOCKS[1].data_size,
            policy: ManagementPolicy::BackupCopy,
            defaults: DefaultsPattern::Fill(0xA5),
            recovery: RecoveryStrategy::DefaultsAndRepair,
        },
        BlockConfig {
            offset_in_eeprom: BLOCKS[2].offset,
            data_size: BLOCKS[2].data_size,
            policy: ManagementPolicy::WearLeveling { instance_count: 2 },
            defaults: DefaultsPattern::Fill(0x00),
            recovery: RecoveryStrategy::DefaultsAndRepair,
        },
        BlockConfig {
            offset_in_eeprom: BLOCKS[3].offset,
            data_size: BLOCKS[3].data_size,
            policy: ManagementPolicy::WearLeveling { instance_count: 15 },
            defaults: DefaultsPattern::Tile(vec![0xDE, 0xAD]),
            recovery: RecoveryStrategy::DefaultsAndRepair,
        },
        BlockConfig {
            offset_in_eeprom: BLOCKS[4].offset,
            data_size: BLOCKS[4].data_size,
            policy: ManagementPolicy::MultiProfile { instance_count: 4 },
            defaults: DefaultsPattern::Image(profile_defaults()),
            recovery: RecoveryStrategy::DefaultsAndRepair,
        },
        BlockConfig {
            offset_in_eeprom: BLOCKS[5].offset,
            data_size: BLOCKS[5].data_size,
            policy: ManagementPolicy::Basic,
            defaults: DefaultsPattern::Fill(0x5A),
            recovery: RecoveryStrategy::DefaultsOnly,
        },
    ]
}

pub fn instance_len(block: usize) -> usize {
    BLOCKS[block].data_size + DIGEST_SIZE
}

pub fn instance_offset(block: usize, instance: usize) -> usize {
    BLOCKS[block].offset + instance * instance_len(block)
}

/// Device region `[start, end)` owned by `block`.
pub fn region(block: usize) -> (usize, usize) {
    let start = BLOCKS[block].offset;
    (start, start + BLOCKS[block].instances * instance_len(block))
}

pub fn blocks_of_kind(kind: PolicyKind) -> Vec<usize> {
    (0..BLOCKS.len()).filter(|&b| BLOCKS[b].kind == kind).collect()
}

/// Engine plus the test-side handles onto its collaborators.
pub struct Rig {
    pub engine: TestEngine,
    pub eeprom: SimHandle,
    pub journal: CallbackJournal,
}

impl Rig {
    /// A fresh engine over a fully erased device. Not yet initialized.
    pub fn new() -> Self {
        let bus = SimBus::new(EEPROM_SIZE);
        let eeprom = bus.handle();
        let callbacks = RecordingCallbacks::new();
        let journal = callbacks.journal();
        let engine = Engine::new(bus, Crc8::new(), callbacks, block_table())
            .expect("test block table is valid");
        Self {
            engine,
            eeprom,
            journal,
        }
    }

    /// Init, pump recovery writes to completion, resume, drop the events
    /// recorded so far.
    pub fn start(&mut self) {
        self.engine.init();
        self.pump_until_idle();
        self.engine.resume();
        self.journal.clear();
    }

    /// Like [`start`], but leaves the device holding a valid image of every
    /// block and the engine freshly re-initialized from it - so nothing is
    /// pending and the round-robin cursor sits at its post-init position.
    ///
    /// [`start`]: Rig::start
    pub fn start_clean(&mut self) {
        self.start();
        for block in 0..BLOCKS.len() {
            self.engine.restore_defaults(block);
            assert!(self.engine.initiate_block_write(block));
        }
        self.pump_until_idle();
        self.engine.deinit();
        self.engine.init();
        self.engine.resume();
        self.journal.clear();
    }

    /// Runs the periodic task until the engine reports idle.
    pub fn pump_until_idle(&mut self) {
        for _ in 0..100_000 {
            self.engine.periodic_task();
            if !self.engine.is_busy() {
                return;
            }
        }
        panic!("engine failed to go idle");
    }

    /// Perturbs every application-owned cache byte of `block`.
    pub fn bump_cache(&mut self, block: usize) {
        let skip = usize::from(BLOCKS[block].kind == PolicyKind::WearLeveling);
        for byte in self.engine.cache_mut(block)[skip..].iter_mut() {
            *byte = byte.wrapping_add(0x11);
        }
    }
}

/// Small deterministic RNG (xorshift32) for payload generation.
pub struct Rng(u32);

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self(if seed == 0 { 0xBAD_5EED } else { seed })
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    pub fn fill(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = (self.next_u32() >> 24) as u8;
        }
    }

    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.fill(&mut buf);
        buf
    }
}
