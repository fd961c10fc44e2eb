//! # nvparam Simulator
//!
//! Host-side collaborators for exercising the engine without hardware:
//!
//! - [`SimBus`]: a RAM-backed EEPROM behind the [`EepromBus`] interface,
//!   with configurable completion latency and fault injection
//! - [`RecordingCallbacks`]: an [`EngineCallbacks`] sink that journals
//!   every notification
//!
//! Both hand out shared handles ([`SimHandle`], [`CallbackJournal`]), so a
//! test keeps full visibility and control over the device image and the
//! callback stream after moving the collaborators into the engine.
//!
//! [`EepromBus`]: nvparam_hal::EepromBus
//! [`EngineCallbacks`]: nvparam_hal::EngineCallbacks

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

mod bus;
mod recorder;

pub use bus::{SimBus, SimHandle, ERASED_BYTE};
pub use recorder::{CallbackEvent, CallbackJournal, RecordingCallbacks};
