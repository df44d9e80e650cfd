//! Per-output channel adapter.

use core::time::Duration;

use crate::bus::RegisterBus;
use crate::controller::{ChannelId, Pca9685, ReadyOp};
use crate::registers::{LedQuad, Register, TICKS_PER_PERIOD};
use crate::Result;

/// A borrowed view of one PWM output.
///
/// Channels own no register state: the controller's shadow buffer is
/// authoritative, and the view only translates on/off/duty requests into
/// writes of its channel's 4-byte register block. Obtain one with
/// [`Pca9685::channel`].
pub struct Channel<'a, B> {
    controller: &'a mut Pca9685<B>,
    id: ChannelId,
}

impl<'a, B: RegisterBus> Channel<'a, B> {
    pub(crate) fn new(controller: &'a mut Pca9685<B>, id: ChannelId) -> Self {
        Self { controller, id }
    }

    /// This channel's identifier.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Hold the output high, ignoring the programmed tick counts.
    ///
    /// Writes immediately, even inside a transaction.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`](crate::Error::InvalidState) outside `Ready`
    /// or while a write is in flight;
    /// [`Error::TransportFailure`](crate::Error::TransportFailure) if the
    /// transport rejects the write.
    pub fn on(&mut self) -> Result<()> {
        self.write_override(LedQuad::FULL_ON)
    }

    /// Hold the output low, ignoring the programmed tick counts.
    ///
    /// Writes immediately, even inside a transaction.
    ///
    /// # Errors
    ///
    /// Same as [`on`](Self::on).
    pub fn off(&mut self) -> Result<()> {
        self.write_override(LedQuad::FULL_OFF)
    }

    /// Program the on/off ticks for this output (masked to 12 bits).
    ///
    /// Outside a transaction the four register bytes are written
    /// immediately. Inside one, only the shadow buffer changes and the bus
    /// stays quiet until
    /// [`Pca9685::commit_transaction`](crate::Pca9685::commit_transaction).
    ///
    /// # Errors
    ///
    /// Same as [`on`](Self::on).
    pub fn set(&mut self, on_tick: u16, off_tick: u16) -> Result<()> {
        self.controller.ensure_idle()?;
        let quad = LedQuad::new(on_tick, off_tick);
        *self.slot() = quad;
        if self.controller.in_transaction {
            return Ok(());
        }
        self.controller
            .quad_write(Register::led_on_l(self.id.index()), quad, ReadyOp::Channel)
    }

    /// Program a pulse width, servo-style: the width is translated into
    /// ticks of the current PWM period (clamped to the 12-bit range) and
    /// applied as `set(0, ticks)`.
    ///
    /// # Errors
    ///
    /// Same as [`on`](Self::on).
    pub fn set_pulse_us(&mut self, width_us: u32) -> Result<()> {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "clamped to the 12-bit tick range"
        )]
        let ticks = (u64::from(width_us) * 1_000 / self.tick_ns())
            .min(u64::from(TICKS_PER_PERIOD) - 1) as u16;
        self.set(0, ticks)
    }

    /// The shadowed register quad for this output.
    #[must_use]
    pub fn shadow(&self) -> LedQuad {
        self.controller.shadow[usize::from(self.id.index())]
    }

    /// Real length of one PWM tick under the controller's cached prescale
    /// divisor. Read-only; no bus traffic.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        self.controller.tick_duration()
    }

    fn tick_ns(&self) -> u64 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "at most 10240 ns (prescale 255)"
        )]
        let tick_ns = self.controller.tick_duration().as_nanos() as u64;
        tick_ns
    }

    fn slot(&mut self) -> &mut LedQuad {
        &mut self.controller.shadow[usize::from(self.id.index())]
    }

    fn write_override(&mut self, quad: LedQuad) -> Result<()> {
        self.controller.ensure_idle()?;
        *self.slot() = quad;
        self.controller
            .quad_write(Register::led_on_l(self.id.index()), quad, ReadyOp::Channel)
    }
}
