//! Recording callback sink.
//!
//! Journals every engine notification so tests can assert presence and
//! ordering, and serves preconfigured initial-profile selections.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::Mutex;

use nvparam_hal::EngineCallbacks;

/// One recorded engine notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackEvent {
    /// `on_block_init_complete`
    InitComplete(usize),
    /// `on_block_write_started`
    WriteStarted(usize),
    /// `on_block_write_complete`
    WriteComplete(usize),
    /// `on_profile_fetch_started`
    FetchStarted(usize),
    /// `on_profile_fetch_complete`
    FetchComplete(usize),
}

struct RecorderState {
    events: Vec<CallbackEvent>,
    initial_profiles: BTreeMap<usize, u8>,
}

/// An [`EngineCallbacks`] sink that records every notification. Move it
/// into the engine and keep a [`CallbackJournal`] for assertions.
pub struct RecordingCallbacks {
    shared: Arc<Mutex<RecorderState>>,
}

impl RecordingCallbacks {
    /// Creates an empty recorder. Initial-profile queries default to 0.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(RecorderState {
                events: Vec::new(),
                initial_profiles: BTreeMap::new(),
            })),
        }
    }

    /// A shared handle onto the recorded events and profile presets.
    pub fn journal(&self) -> CallbackJournal {
        CallbackJournal {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for RecordingCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCallbacks for RecordingCallbacks {
    fn select_initial_profile(&mut self, block_id: usize) -> u8 {
        self.shared
            .lock()
            .initial_profiles
            .get(&block_id)
            .copied()
            .unwrap_or(0)
    }

    fn on_block_init_complete(&mut self, block_id: usize) {
        self.shared
            .lock()
            .events
            .push(CallbackEvent::InitComplete(block_id));
    }

    fn on_block_write_started(&mut self, block_id: usize) {
        self.shared
            .lock()
            .events
            .push(CallbackEvent::WriteStarted(block_id));
    }

    fn on_block_write_complete(&mut self, block_id: usize) {
        self.shared
            .lock()
            .events
            .push(CallbackEvent::WriteComplete(block_id));
    }

    fn on_profile_fetch_started(&mut self, block_id: usize) {
        self.shared
            .lock()
            .events
            .push(CallbackEvent::FetchStarted(block_id));
    }

    fn on_profile_fetch_complete(&mut self, block_id: usize) {
        self.shared
            .lock()
            .events
            .push(CallbackEvent::FetchComplete(block_id));
    }
}

/// Test-side view onto a [`RecordingCallbacks`] sink.
#[derive(Clone)]
pub struct CallbackJournal {
    shared: Arc<Mutex<RecorderState>>,
}

impl CallbackJournal {
    /// A copy of all events recorded so far.
    pub fn events(&self) -> Vec<CallbackEvent> {
        self.shared.lock().events.clone()
    }

    /// Removes and returns all recorded events.
    pub fn take(&self) -> Vec<CallbackEvent> {
        core::mem::take(&mut self.shared.lock().events)
    }

    /// Discards all recorded events.
    pub fn clear(&self) {
        self.shared.lock().events.clear();
    }

    /// Presets the initial profile the recorder reports for `block_id`.
    pub fn set_initial_profile(&self, block_id: usize, profile: u8) {
        self.shared.lock().initial_profiles.insert(block_id, profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_takes() {
        let mut recorder = RecordingCallbacks::new();
        let journal = recorder.journal();

        recorder.on_block_init_complete(0);
        recorder.on_block_write_started(1);
        recorder.on_block_write_complete(1);

        assert_eq!(
            journal.take(),
            [
                CallbackEvent::InitComplete(0),
                CallbackEvent::WriteStarted(1),
                CallbackEvent::WriteComplete(1),
            ]
        );
        assert!(journal.events().is_empty());
    }

    #[test]
    fn initial_profiles_default_to_zero() {
        let mut recorder = RecordingCallbacks::new();
        let journal = recorder.journal();
        journal.set_initial_profile(3, 2);

        assert_eq!(recorder.select_initial_profile(0), 0);
        assert_eq!(recorder.select_initial_profile(3), 2);
    }
}
