//! Crate-wide error and result types.

use derive_more::{Display, Error};

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the driver.
///
/// The precondition errors ([`InvalidState`](Error::InvalidState),
/// [`InvalidFrequency`](Error::InvalidFrequency),
/// [`InvalidChannel`](Error::InvalidChannel)) are returned synchronously,
/// before any bus traffic. [`TransportFailure`](Error::TransportFailure)
/// travels through the asynchronous completion path once an operation is
/// under way.
#[derive(Clone, Copy, Debug, Display, Eq, Error, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The operation is not allowed in the controller's current state, or a
    /// bus write is still in flight.
    #[display("operation not allowed in the current controller state")]
    InvalidState,

    /// The requested PWM frequency has no valid prescale divisor.
    #[display("PWM frequency outside the supported range")]
    InvalidFrequency,

    /// Channel index outside `0..=15`.
    #[display("channel index outside 0..=15")]
    InvalidChannel,

    /// The bus transport rejected or failed a register write.
    #[display("bus transport reported a write failure")]
    TransportFailure,
}
