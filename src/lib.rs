//! Driver for the PCA9685 16-channel, 12-bit PWM LED/servo controller.
//!
//! The driver speaks a narrow asynchronous transport contract — "write
//! these bytes starting at this register address, report exactly one
//! completion" ([`RegisterBus`]) — and never blocks: chip bring-up and
//! configuration run as a state machine resumed by write completions, and
//! at most one bus write is in flight per controller.
//!
//! Per-output control goes through [`Channel`] views; batches of channel
//! updates can be flushed to the chip in a single 64-byte burst with the
//! transaction operations, so outputs that must change in lockstep (for
//! example, synchronized servo moves) never show a partial update.
//!
//! # Glossary
//!
//! - **Tick**: one step of the chip's 4096-step PWM period.
//! - **Prescale**: divisor of the 25 MHz internal oscillator that selects
//!   the PWM base frequency.
//! - **Full on/off override**: per-channel flag that pins an output high
//!   or low regardless of its programmed tick counts.
//! - **Transaction**: a batch of channel updates flushed to the chip in
//!   one bus write — not a database transaction.
//!
//! # Example
//!
//! Bring the chip up over a blocking I2C bus, select a 50 Hz servo frame,
//! and program channel 0:
//!
//! ```rust
//! # use critical_section as _;
//! use pca9685_envoy::{BlockingI2cBus, ChannelId, DoneSignal, Pca9685, Result};
//!
//! # struct LoopbackI2c;
//! # impl embedded_hal::i2c::ErrorType for LoopbackI2c {
//! #     type Error = core::convert::Infallible;
//! # }
//! # impl embedded_hal::i2c::I2c for LoopbackI2c {
//! #     fn transaction(
//! #         &mut self,
//! #         _address: u8,
//! #         _operations: &mut [embedded_hal::i2c::Operation<'_>],
//! #     ) -> core::result::Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! fn example(i2c: impl embedded_hal::i2c::I2c) -> Result<()> {
//!     static INIT_DONE: DoneSignal = DoneSignal::new();
//!     static CONFIG_DONE: DoneSignal = DoneSignal::new();
//!
//!     let mut pwm = Pca9685::new(BlockingI2cBus::new(i2c));
//!
//!     // A blocking bus completes each write in-line, so `poll` drives
//!     // every phase of the sequence to `Ready`. Interrupt-driven
//!     // transports call `bus_write_complete` instead.
//!     pwm.initialize(&INIT_DONE)?;
//!     pwm.poll();
//!
//!     pwm.configure(50, &CONFIG_DONE)?;
//!     pwm.poll();
//!
//!     let mut servo = pwm.channel(ChannelId::new(0)?);
//!     servo.set_pulse_us(1_500)?; // center position
//!     pwm.poll();
//!     Ok(())
//! }
//! # example(LoopbackI2c).unwrap();
//! ```
#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod controller;
mod error;
pub mod prescale;
pub mod registers;

pub use crate::bus::{BlockingI2cBus, BusStatus, DEFAULT_ADDRESS, RegisterBus};
pub use crate::controller::{Channel, ChannelId, DoneSignal, Pca9685};
pub use crate::error::{Error, Result};
