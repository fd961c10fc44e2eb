//! # nvparam HAL
//!
//! Interface traits between the nvparam engine and its environment.
//!
//! The engine core is hardware-agnostic: everything it needs from the
//! outside world is injected at construction through the traits defined
//! here.
//!
//! ## Components
//!
//! - **EepromBus**: asynchronous access to an offset-addressed byte device
//! - **Checksum**: pure byte-array -> fixed-width digest
//! - **EngineCallbacks**: lifecycle notifications produced by the engine
//!
//! ## Design
//!
//! The engine is monomorphized over its collaborators, so a release build
//! for a concrete target carries no dynamic dispatch on the tick path.

#![no_std]
#![warn(missing_docs)]

pub mod bus;
pub mod callbacks;
pub mod checksum;

pub use bus::{BusStatus, EepromBus};
pub use callbacks::EngineCallbacks;
pub use checksum::Checksum;
