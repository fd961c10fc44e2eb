//! # EEPROM Bus Interface
//!
//! The engine drives one serial, byte-addressed non-volatile device through
//! this trait. Transfers are request/poll shaped: a `begin_*` call enqueues
//! exactly one operation, and completion is observed by polling [`status`]
//! from the periodic tick.
//!
//! [`status`]: EepromBus::status

/// Status of the last request accepted by the bus driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusStatus {
    /// No request has been accepted since [`EepromBus::init`].
    Idle,
    /// The last request completed successfully.
    Ok,
    /// The last request failed (bus fault, or write verify exhausted its
    /// retries).
    Nok,
    /// A request is currently executing.
    Busy,
}

/// Asynchronous access to an offset-addressed byte device.
///
/// ## Contract
///
/// - At most one outstanding request: a `begin_*` call is made only when
///   [`status`] is not [`BusStatus::Busy`]. A driver may still reject a
///   request (return `false`) if its queue is unexpectedly occupied; the
///   engine treats that as a development error.
/// - Offsets are relative to the device's own namespace; mapping to absolute
///   bus addresses is the driver's job.
/// - The `dest`/`src` borrows end when the call returns, so the driver
///   captures the transfer during the call: `begin_read` fills `dest`
///   before returning, `begin_write` copies `src` into its own staging
///   area. *Completion* - simulated or real bus latency, and the outcome of
///   the driver's verify-and-retry cycle - is reported later through
///   [`status`]. The contents delivered by a read are authoritative only
///   once [`status`] reports [`BusStatus::Ok`].
/// - Writes are verified by the driver (read-back compare, with retries);
///   a verify failure surfaces as [`BusStatus::Nok`].
///
/// [`status`]: EepromBus::status
pub trait EepromBus {
    /// Initializes the driver. Synchronous; called once from engine init.
    fn init(&mut self);

    /// De-initializes the driver.
    fn deinit(&mut self);

    /// Advances the driver's internal jobs by one tick.
    ///
    /// Called once per engine tick. Interrupt-driven drivers may leave this
    /// empty.
    fn task(&mut self);

    /// Enqueues an asynchronous read of `dest.len()` bytes at `offset`.
    ///
    /// Returns `true` if the request was accepted.
    fn begin_read(&mut self, offset: usize, dest: &mut [u8]) -> bool;

    /// Enqueues an asynchronous write of `src` at `offset`.
    ///
    /// Returns `true` if the request was accepted.
    fn begin_write(&mut self, offset: usize, src: &[u8]) -> bool;

    /// Reports the status of the last accepted request.
    fn status(&self) -> BusStatus;
}
