//! Transport contracts and adapters.
//!
//! The controller consumes a narrow, write-only contract: "write these
//! bytes to consecutive registers starting at this address, then tell me
//! exactly once how it went". [`RegisterBus`] is that contract.
//! [`BlockingI2cBus`] adapts any [`embedded_hal::i2c::I2c`] implementation
//! to it for applications that have no interrupt-driven transport.

use embedded_hal::i2c::I2c;

use crate::{Error, Result};

/// Default 7-bit device address, all address pins strapped low.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Outcome of one asynchronous register write, as reported by the
/// transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusStatus {
    /// The write reached the device.
    Ok,
    /// The transport reported an error; device state is unknown.
    Failed,
}

/// Asynchronous, write-only register transport.
///
/// [`start_write`](Self::start_write) begins one write of `payload` to
/// consecutive register addresses starting at `register` (the controller
/// keeps the chip's auto-increment mode enabled) and returns without
/// waiting. The transport must capture the payload during the call; the
/// slice is not guaranteed to outlive it.
///
/// Exactly one completion per accepted write must reach the controller:
/// either the application's completion handler calls
/// [`Pca9685::bus_write_complete`], or the transport parks the outcome and
/// hands it back from [`poll_complete`](Self::poll_complete) when the
/// application pumps [`Pca9685::poll`].
///
/// [`Pca9685::bus_write_complete`]: crate::Pca9685::bus_write_complete
/// [`Pca9685::poll`]: crate::Pca9685::poll
pub trait RegisterBus {
    /// Begin an asynchronous register write.
    ///
    /// # Errors
    ///
    /// An error means the write was not accepted and no completion will
    /// follow.
    fn start_write(&mut self, register: u8, payload: &[u8]) -> Result<()>;

    /// Hand back a completion the transport has already observed.
    ///
    /// Transports that deliver completions externally (interrupt service
    /// continuations, executor tasks) keep the default.
    fn poll_complete(&mut self) -> Option<BusStatus> {
        None
    }
}

/// Drives the [`RegisterBus`] contract over a blocking I2C bus.
///
/// The register write happens synchronously inside
/// [`start_write`](RegisterBus::start_write); the outcome is parked and
/// handed back through [`poll_complete`](RegisterBus::poll_complete), so
/// [`Pca9685::poll`](crate::Pca9685::poll) advances the state machine one
/// completed write at a time.
pub struct BlockingI2cBus<I2C> {
    i2c: I2C,
    address: u8,
    parked: Option<BusStatus>,
}

impl<I2C: I2c> BlockingI2cBus<I2C> {
    /// Wrap `i2c`, addressing the device at [`DEFAULT_ADDRESS`].
    pub fn new(i2c: I2C) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    /// Wrap `i2c` with an explicit 7-bit device address.
    pub fn with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            parked: None,
        }
    }

    /// Release the wrapped bus.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> RegisterBus for BlockingI2cBus<I2C> {
    fn start_write(&mut self, register: u8, payload: &[u8]) -> Result<()> {
        // Register address byte plus the largest payload the controller
        // issues (the 64-byte commit image).
        let mut frame = [0u8; 65];
        let end = payload
            .len()
            .checked_add(1)
            .filter(|end| *end <= frame.len())
            .ok_or(Error::TransportFailure)?;
        frame[0] = register;
        frame[1..end].copy_from_slice(payload);
        let status = match self.i2c.write(self.address, &frame[..end]) {
            Ok(()) => BusStatus::Ok,
            Err(_) => BusStatus::Failed,
        };
        self.parked = Some(status);
        Ok(())
    }

    fn poll_complete(&mut self) -> Option<BusStatus> {
        self.parked.take()
    }
}
