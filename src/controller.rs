//! The PCA9685 controller: chip bring-up, configuration, broadcast
//! overrides, and the multi-channel transaction protocol.
//!
//! Bring-up and configuration are asynchronous: each entry point issues
//! the first register write of its sequence and returns; every completed
//! write resumes the sequence exactly where it left off via
//! [`Pca9685::bus_write_complete`]. The controller never blocks and keeps
//! at most one bus write in flight.
//!
//! See the [crate-level example](crate#example) for a full bring-up.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::bus::{BusStatus, RegisterBus};
use crate::prescale::{self, PRESCALE_DEFAULT};
use crate::registers::{CHANNEL_COUNT, LedQuad, Mode1, Mode2, OVERRIDE_BIT, Register};
use crate::{Error, Result};

mod channel;

pub use channel::Channel;

/// Completion notification armed by [`Pca9685::initialize`],
/// [`Pca9685::configure`], and [`Pca9685::commit_transaction`].
///
/// The signal delivers the outcome exactly once to whoever awaits it, and
/// firing it with nobody waiting is a safe no-op.
pub type DoneSignal = Signal<CriticalSectionRawMutex, Result<()>>;

/// Identifies one of the chip's sixteen PWM outputs.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(u8);

impl ChannelId {
    /// Wrap a raw output index.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidChannel`] for indices above 15.
    pub const fn new(index: u8) -> Result<Self> {
        if index < CHANNEL_COUNT as u8 {
            Ok(Self(index))
        } else {
            Err(Error::InvalidChannel)
        }
    }

    /// The raw index, `0..=15`.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// All sixteen channels in register order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHANNEL_COUNT as u8).map(Self)
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self> {
        Self::new(index)
    }
}

// ============================================================================
// State machine
// ============================================================================

/// Bring-up/configuration phase. Outside `Initial` and `Ready`, the state
/// names the write currently in flight, so a completion always resumes in
/// the correct phase. The state is advanced before each write is
/// dispatched.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    /// Constructed; `initialize` has not run.
    Initial,
    /// Initialization: broadcast full-off write in flight.
    ShutdownAll,
    /// Initialization: mode-register write in flight.
    InitMode,
    /// Idle. The only state that accepts channel, transaction, and
    /// `configure` operations.
    Ready,
    /// Configuration: sleep-mode write in flight.
    ConfigMode,
    /// Configuration: prescale write in flight.
    ConfigPrescale,
    /// Configuration: wake-up write in flight.
    ConfigWakeup,
}

/// What a completion arriving in `Ready` belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadyOp {
    /// Immediate single-channel write; nobody is waiting on it.
    Channel,
    /// Broadcast all-channel override write; nobody is waiting on it.
    Broadcast,
    /// Transaction commit; the outcome goes to the armed completion.
    Commit,
}

const SCRATCH_LEN: usize = CHANNEL_COUNT * 4;

// ============================================================================
// Pca9685 - the controller
// ============================================================================

/// Driver for the PCA9685 controller chip.
///
/// Owns the transport, the shadow copy of all sixteen channel register
/// blocks, and the bring-up state machine. Per-output control goes through
/// the [`Channel`] views returned by [`channel`](Self::channel).
///
/// The controller is single-threaded and cooperative: every operation
/// either completes locally or issues one asynchronous bus write, and the
/// transport's completion resumes the sequence. Only one write is in
/// flight at any time; operations that would need the bus while it is busy
/// fail with [`Error::InvalidState`].
pub struct Pca9685<B> {
    bus: B,
    state: State,
    ready_op: Option<ReadyOp>,
    shadow: [LedQuad; CHANNEL_COUNT],
    scratch: [u8; SCRATCH_LEN],
    in_transaction: bool,
    prescale: u8,
    done: Option<&'static DoneSignal>,
}

impl<B: RegisterBus> Pca9685<B> {
    /// Wrap a transport. The controller starts in the pre-initialization
    /// state; call [`initialize`](Self::initialize) before anything else.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            state: State::Initial,
            ready_op: None,
            shadow: [LedQuad::new(0, 0); CHANNEL_COUNT],
            scratch: [0; SCRATCH_LEN],
            in_transaction: false,
            prescale: PRESCALE_DEFAULT,
            done: None,
        }
    }

    /// Begin chip bring-up: force every output off, then program the mode
    /// registers (auto-increment on, oscillator asleep, all-call
    /// addressing off). Exactly two bus writes; `done` fires once when the
    /// controller reaches `Ready`, or with
    /// [`Error::TransportFailure`] if the bus fails.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] unless this is the first operation on the
    /// controller.
    pub fn initialize(&mut self, done: &'static DoneSignal) -> Result<()> {
        if self.state != State::Initial {
            return Err(Error::InvalidState);
        }
        self.done = Some(done);
        self.scratch[0] = OVERRIDE_BIT;
        self.phase_write(Register::ALL_LED_OFF_H, 1, State::ShutdownAll, State::Initial);
        Ok(())
    }

    /// Set the PWM base frequency: re-enter sleep, program the prescale
    /// divisor, wake the oscillator. Exactly three bus writes; `done`
    /// fires once when the controller is back in `Ready`.
    ///
    /// The divisor is cached, so [`tick_duration`](Self::tick_duration)
    /// reflects the new frequency as soon as the call is accepted.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside `Ready` or while a write is in
    /// flight; [`Error::InvalidFrequency`] if `frequency_hz` has no valid
    /// divisor. Neither touches the bus.
    pub fn configure(&mut self, frequency_hz: u32, done: &'static DoneSignal) -> Result<()> {
        self.ensure_idle()?;
        self.prescale = prescale::prescale_for_hz(frequency_hz)?;
        self.done = Some(done);
        self.scratch[0] = Mode1::SLEEP.bits();
        self.scratch[1] = Mode2::TOTEM_POLE.bits();
        self.phase_write(Register::MODE1, 2, State::ConfigMode, State::Ready);
        Ok(())
    }

    /// Deliver one write completion from the transport.
    ///
    /// This is the state-transition function: each completion resumes the
    /// bring-up or configuration sequence exactly where it left off, or
    /// closes out a write issued from `Ready`. A transport failure ends
    /// the in-flight operation, resets the state machine to the phase's
    /// entry state, and fires the armed completion with
    /// [`Error::TransportFailure`].
    ///
    /// # Panics
    ///
    /// If no write is in flight. A completion can only follow a write;
    /// anything else is a defect in the transport glue.
    pub fn bus_write_complete(&mut self, status: BusStatus) {
        match self.state {
            State::ShutdownAll => match status {
                BusStatus::Ok => {
                    self.scratch[0] = Mode1::SLEEP.bits();
                    self.scratch[1] = Mode2::TOTEM_POLE.bits();
                    self.phase_write(Register::MODE1, 2, State::InitMode, State::Initial);
                }
                BusStatus::Failed => self.fail_phase(State::Initial),
            },
            State::InitMode => match status {
                BusStatus::Ok => {
                    self.state = State::Ready;
                    #[cfg(feature = "defmt")]
                    defmt::trace!("pca9685: initialized");
                    self.finish(Ok(()));
                }
                BusStatus::Failed => self.fail_phase(State::Initial),
            },
            State::ConfigMode => match status {
                BusStatus::Ok => {
                    self.scratch[0] = self.prescale;
                    self.phase_write(Register::PRESCALE, 1, State::ConfigPrescale, State::Ready);
                }
                BusStatus::Failed => self.fail_phase(State::Ready),
            },
            State::ConfigPrescale => match status {
                BusStatus::Ok => {
                    self.scratch[0] = Mode1::WAKE.bits();
                    self.phase_write(Register::MODE1, 1, State::ConfigWakeup, State::Ready);
                }
                BusStatus::Failed => self.fail_phase(State::Ready),
            },
            State::ConfigWakeup => {
                self.state = State::Ready;
                match status {
                    BusStatus::Ok => {
                        #[cfg(feature = "defmt")]
                        defmt::trace!("pca9685: configured, prescale {=u8}", self.prescale);
                        self.finish(Ok(()));
                    }
                    BusStatus::Failed => self.finish(Err(Error::TransportFailure)),
                }
            }
            State::Ready => match self.ready_op.take() {
                Some(ReadyOp::Commit) => match status {
                    BusStatus::Ok => self.finish(Ok(())),
                    BusStatus::Failed => self.finish(Err(Error::TransportFailure)),
                },
                Some(ReadyOp::Channel | ReadyOp::Broadcast) => {
                    // Nobody waits on immediate writes; a failure only
                    // leaves the shadow buffer ahead of the chip.
                    if matches!(status, BusStatus::Failed) {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("pca9685: immediate write failed");
                    }
                }
                None => unreachable!("write completion with no write in flight"),
            },
            State::Initial => unreachable!("write completion before initialization"),
        }
    }

    /// Pump completions out of transports that learn outcomes in-line
    /// (see [`RegisterBus::poll_complete`]).
    pub fn poll(&mut self) {
        while let Some(status) = self.bus.poll_complete() {
            self.bus_write_complete(status);
        }
    }

    // ------------------------------------------------------------------------
    // Channel and broadcast operations
    // ------------------------------------------------------------------------

    /// Borrow the adapter for one output.
    #[must_use]
    pub fn channel(&mut self, id: ChannelId) -> Channel<'_, B> {
        Channel::new(self, id)
    }

    /// Force every output high in one 4-byte write to the broadcast
    /// register block. Ignores transaction mode.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside `Ready` or while a write is in
    /// flight; [`Error::TransportFailure`] if the transport rejects the
    /// write.
    pub fn all_on(&mut self) -> Result<()> {
        self.all_override(LedQuad::FULL_ON)
    }

    /// Force every output low in one 4-byte write to the broadcast
    /// register block. Ignores transaction mode.
    ///
    /// # Errors
    ///
    /// Same as [`all_on`](Self::all_on).
    pub fn all_off(&mut self) -> Result<()> {
        self.all_override(LedQuad::FULL_OFF)
    }

    /// Enter transaction mode: subsequent per-channel
    /// [`set`](Channel::set) calls update only the shadow buffer until
    /// [`commit_transaction`](Self::commit_transaction) flushes them.
    /// Local and synchronous; no bus traffic.
    pub fn start_transaction(&mut self) {
        self.in_transaction = true;
    }

    /// Flush a batch of channel updates in one 64-byte bus write.
    ///
    /// The whole shadow image is written starting at the first channel's
    /// register block; with auto-increment the chip applies it in a single
    /// burst, so grouped channels never show a partial update. The write
    /// happens even if nothing changed since
    /// [`start_transaction`](Self::start_transaction) — commit is
    /// idempotent with respect to chip state. Without an active
    /// transaction there is no bus traffic and `done` fires immediately
    /// with success.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] outside `Ready` or while a write is in
    /// flight.
    pub fn commit_transaction(&mut self, done: &'static DoneSignal) -> Result<()> {
        self.ensure_idle()?;
        if !self.in_transaction {
            done.signal(Ok(()));
            return Ok(());
        }
        self.in_transaction = false;
        for (slot, quad) in self.scratch.chunks_exact_mut(4).zip(self.shadow) {
            slot.copy_from_slice(&quad.encode());
        }
        self.done = Some(done);
        self.ready_op = Some(ReadyOp::Commit);
        if self.bus.start_write(Register::LED0_ON_L, &self.scratch).is_err() {
            self.ready_op = None;
            self.finish(Err(Error::TransportFailure));
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The cached prescale divisor (power-on default until the first
    /// successful [`configure`](Self::configure)).
    #[must_use]
    pub fn prescale(&self) -> u8 {
        self.prescale
    }

    /// Real length of one PWM tick under the cached prescale divisor.
    ///
    /// Use it to translate pulse widths into tick counts.
    #[must_use]
    pub fn tick_duration(&self) -> core::time::Duration {
        prescale::tick_duration(self.prescale)
    }

    /// Whether the controller is idle in `Ready` and accepts operations.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == State::Ready && self.ready_op.is_none()
    }

    /// Whether a transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Shared access to the transport.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Consume the controller and release the transport.
    pub fn release(self) -> B {
        self.bus
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn ensure_idle(&self) -> Result<()> {
        if self.state == State::Ready && self.ready_op.is_none() {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    /// Dispatch the next bring-up write from the scratch buffer. The state
    /// is advanced to `next` before dispatch so the completion resumes in
    /// the correct phase; a synchronous rejection resets to `recover` and
    /// finishes the armed completion.
    fn phase_write(&mut self, register: u8, len: usize, next: State, recover: State) {
        self.state = next;
        if self.bus.start_write(register, &self.scratch[..len]).is_err() {
            self.state = recover;
            self.finish(Err(Error::TransportFailure));
        }
    }

    fn fail_phase(&mut self, recover: State) {
        #[cfg(feature = "defmt")]
        defmt::warn!("pca9685: transport failure during bring-up");
        self.state = recover;
        self.finish(Err(Error::TransportFailure));
    }

    /// Fire the armed completion exactly once; a no-op if nothing is
    /// armed.
    fn finish(&mut self, outcome: Result<()>) {
        if let Some(done) = self.done.take() {
            done.signal(outcome);
        }
    }

    /// Immediate 4-byte write of one quad, issued from `Ready`. The
    /// `ready_op` tag routes the eventual completion.
    fn quad_write(&mut self, register: u8, quad: LedQuad, op: ReadyOp) -> Result<()> {
        self.ready_op = Some(op);
        self.scratch[..4].copy_from_slice(&quad.encode());
        if self.bus.start_write(register, &self.scratch[..4]).is_err() {
            self.ready_op = None;
            return Err(Error::TransportFailure);
        }
        Ok(())
    }

    fn all_override(&mut self, quad: LedQuad) -> Result<()> {
        self.ensure_idle()?;
        self.shadow = [quad; CHANNEL_COUNT];
        self.quad_write(Register::ALL_LED_ON_L, quad, ReadyOp::Broadcast)
    }
}
