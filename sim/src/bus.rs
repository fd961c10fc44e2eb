//! RAM-backed EEPROM simulator.
//!
//! Transfers complete data-wise during the `begin_*` call (per the bus
//! contract); *completion* is postponed: [`SimBus::status`] reports
//! [`BusStatus::Busy`] for a configurable number of polls after each
//! accepted request, mimicking a serial device that takes several ticks to
//! finish. Fault injection flips the final status to [`BusStatus::Nok`].

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use nvparam_hal::{BusStatus, EepromBus};

/// Byte value of erased EEPROM cells.
pub const ERASED_BYTE: u8 = 0xFF;

const DEFAULT_LATENCY_POLLS: u8 = 2;

struct SimState {
    memory: Vec<u8>,
    /// Busy polls reported after each accepted request.
    latency_polls: u8,
    busy_polls_left: u8,
    /// When set, completed requests report `Nok`.
    fail_requests: bool,
    /// `status()` reports `Idle` until the first accepted request.
    request_seen: bool,
}

/// The simulated EEPROM device. Implements [`EepromBus`]; move it into the
/// engine and keep a [`SimHandle`] for test-side access.
pub struct SimBus {
    shared: Arc<Mutex<SimState>>,
}

impl SimBus {
    /// Creates a simulator of `size` erased bytes with the default
    /// completion latency.
    pub fn new(size: usize) -> Self {
        Self::with_latency(size, DEFAULT_LATENCY_POLLS)
    }

    /// Creates a simulator reporting `latency_polls` busy polls per
    /// request. Zero makes every request complete on the first poll.
    pub fn with_latency(size: usize, latency_polls: u8) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SimState {
                memory: vec![ERASED_BYTE; size],
                latency_polls,
                busy_polls_left: 0,
                fail_requests: false,
                request_seen: false,
            })),
        }
    }

    /// A shared handle onto the device image and fault controls.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl EepromBus for SimBus {
    fn init(&mut self) {}

    fn deinit(&mut self) {}

    fn task(&mut self) {}

    fn begin_read(&mut self, offset: usize, dest: &mut [u8]) -> bool {
        let mut state = self.shared.lock();
        let Some(end) = offset.checked_add(dest.len()) else {
            return false;
        };
        if end > state.memory.len() {
            return false;
        }
        dest.copy_from_slice(&state.memory[offset..end]);
        state.busy_polls_left = state.latency_polls;
        state.request_seen = true;
        true
    }

    fn begin_write(&mut self, offset: usize, src: &[u8]) -> bool {
        let mut state = self.shared.lock();
        let Some(end) = offset.checked_add(src.len()) else {
            return false;
        };
        if end > state.memory.len() {
            return false;
        }
        state.memory[offset..end].copy_from_slice(src);
        state.busy_polls_left = state.latency_polls;
        state.request_seen = true;
        true
    }

    fn status(&self) -> BusStatus {
        let mut state = self.shared.lock();
        if !state.request_seen {
            return BusStatus::Idle;
        }
        if state.busy_polls_left > 0 {
            state.busy_polls_left -= 1;
            return BusStatus::Busy;
        }
        if state.fail_requests {
            BusStatus::Nok
        } else {
            BusStatus::Ok
        }
    }
}

/// Test-side view onto a [`SimBus`]: inspect and manipulate the device
/// image and inject faults while the engine owns the bus.
#[derive(Clone)]
pub struct SimHandle {
    shared: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// Device size in bytes.
    pub fn len(&self) -> usize {
        self.shared.lock().memory.len()
    }

    /// Whether the device has zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the entire device image.
    pub fn snapshot(&self) -> Vec<u8> {
        self.shared.lock().memory.clone()
    }

    /// A copy of `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.shared.lock().memory[offset..offset + len].to_vec()
    }

    /// Overwrites the image at `offset` with `bytes`.
    pub fn poke(&self, offset: usize, bytes: &[u8]) {
        self.shared.lock().memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Flips the lowest bit of the byte at `offset`.
    pub fn corrupt(&self, offset: usize) {
        self.shared.lock().memory[offset] ^= 1;
    }

    /// Erases the entire device to [`ERASED_BYTE`].
    pub fn erase(&self) {
        self.shared.lock().memory.fill(ERASED_BYTE);
    }

    /// Erases `len` bytes starting at `offset`.
    pub fn erase_region(&self, offset: usize, len: usize) {
        self.shared.lock().memory[offset..offset + len].fill(ERASED_BYTE);
    }

    /// When `fail` is set, every subsequently completed request reports
    /// [`BusStatus::Nok`]. Writes still land in the image, mirroring a
    /// device whose verify step fails after the transfer.
    pub fn fail_next_requests(&self, fail: bool) {
        self.shared.lock().fail_requests = fail;
    }
}
