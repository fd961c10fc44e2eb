//! # nvparam Core
//!
//! The block-management engine of nvparam: a parameter-persistence core for
//! microcontrollers with a byte-addressable, EEPROM-style non-volatile
//! device.
//!
//! Applications declare named *blocks* of parameters; the engine keeps a
//! RAM-resident cache of each block's current values, validates stored
//! instances against checksums at startup, and persists updates back to the
//! device under one of four durability policies:
//!
//! - **Basic**: one instance, overwritten in place
//! - **Backup copy**: two identical instances, both refreshed on every write
//! - **Wear leveling**: N instances written round-robin, tracked through a
//!   one-byte sequence counter
//! - **Multi profile**: N independent profiles, one active at a time
//!
//! ## Execution model
//!
//! Cooperative and single-threaded: all persistence work is driven by
//! [`Engine::periodic_task`] from the application's super-loop. Long
//! operations are explicit state machines advanced one transition per tick,
//! so a tick is bounded and predictable. There are no internal threads, no
//! interrupt handlers, and no allocation outside construction.
//!
//! ## Collaborators
//!
//! The storage driver, the checksum, and the callback sink are trait
//! objects of the application's choosing, injected at construction; see
//! [`nvparam_hal`].

#![no_std]
#![warn(missing_docs)]

extern crate alloc;

mod config;
mod engine;
mod error;
mod status;

pub use config::{BlockConfig, DefaultsPattern, ManagementPolicy, RecoveryStrategy};
pub use engine::Engine;
pub use error::{ConfigError, ConfigResult};
pub use status::{
    BlockFlags, INVALID_PROFILE_INSTANCE, MAX_BLOCK_COUNT, MAX_PROFILE_INSTANCES,
    MAX_WEAR_LEVELING_INSTANCES,
};

pub use nvparam_hal::{BusStatus, Checksum, EepromBus, EngineCallbacks};
