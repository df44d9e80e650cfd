#![allow(missing_docs, clippy::unwrap_used, clippy::indexing_slicing)]
//! Host tests for the bring-up and configuration sequences.

use critical_section as _;

use pca9685_envoy::{
    BlockingI2cBus, BusStatus, DoneSignal, Error, Pca9685, RegisterBus, Result,
};

/// Records every accepted write; writes numbered `reject_from` onward are
/// rejected synchronously.
struct RecordingBus {
    writes: Vec<(u8, Vec<u8>)>,
    reject_from: usize,
}

impl RecordingBus {
    fn new() -> Self {
        Self {
            writes: Vec::new(),
            reject_from: usize::MAX,
        }
    }

    fn rejecting_from(reject_from: usize) -> Self {
        Self {
            writes: Vec::new(),
            reject_from,
        }
    }
}

impl RegisterBus for RecordingBus {
    fn start_write(&mut self, register: u8, payload: &[u8]) -> Result<()> {
        if self.writes.len() >= self.reject_from {
            return Err(Error::TransportFailure);
        }
        self.writes.push((register, payload.to_vec()));
        Ok(())
    }
}

fn initialized() -> Pca9685<RecordingBus> {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::new());
    pwm.initialize(&DONE).unwrap();
    pwm.bus_write_complete(BusStatus::Ok);
    pwm.bus_write_complete(BusStatus::Ok);
    assert!(pwm.is_ready());
    pwm
}

#[test]
fn initialize_performs_two_writes_in_register_order() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::new());
    pwm.initialize(&DONE).unwrap();

    // Broadcast full-off first, then the mode registers.
    assert_eq!(pwm.bus().writes, [(0xFD, vec![0x10])]);
    pwm.bus_write_complete(BusStatus::Ok);
    assert_eq!(pwm.bus().writes[1], (0x00, vec![0x30, 0x04]));
    assert!(DONE.try_take().is_none(), "done must wait for the last write");

    pwm.bus_write_complete(BusStatus::Ok);
    assert_eq!(pwm.bus().writes.len(), 2);
    assert!(pwm.is_ready());
    assert_eq!(DONE.try_take(), Some(Ok(())));
    assert!(DONE.try_take().is_none(), "done fires exactly once");
}

#[test]
fn configure_before_initialize_fails_without_bus_traffic() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::new());
    assert_eq!(pwm.configure(50, &DONE), Err(Error::InvalidState));
    assert!(pwm.bus().writes.is_empty());
    assert!(DONE.try_take().is_none());
}

#[test]
fn initialize_twice_is_rejected() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = initialized();
    assert_eq!(pwm.initialize(&DONE), Err(Error::InvalidState));
    assert_eq!(pwm.bus().writes.len(), 2);
}

#[test]
fn configure_performs_three_writes_in_register_order() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = initialized();
    pwm.configure(50, &DONE).unwrap();

    // Sleep first so the prescale register is writable, then wake.
    assert_eq!(pwm.bus().writes[2], (0x00, vec![0x30, 0x04]));
    pwm.bus_write_complete(BusStatus::Ok);
    assert_eq!(pwm.bus().writes[3], (0xFE, vec![121]));
    pwm.bus_write_complete(BusStatus::Ok);
    assert_eq!(pwm.bus().writes[4], (0x00, vec![0x20]));
    assert!(DONE.try_take().is_none(), "done must wait for the last write");

    pwm.bus_write_complete(BusStatus::Ok);
    assert_eq!(pwm.bus().writes.len(), 5);
    assert!(pwm.is_ready());
    assert_eq!(DONE.try_take(), Some(Ok(())));
    assert_eq!(pwm.prescale(), 121);
    assert_eq!(pwm.tick_duration(), core::time::Duration::from_nanos(4880));
}

#[test]
fn configure_rejects_unusable_frequencies_without_bus_traffic() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = initialized();
    assert_eq!(pwm.configure(0, &DONE), Err(Error::InvalidFrequency));
    assert_eq!(pwm.configure(5_000, &DONE), Err(Error::InvalidFrequency));
    assert_eq!(pwm.bus().writes.len(), 2);
    assert!(pwm.is_ready());
}

#[test]
fn transport_failure_during_initialize_resets_to_initial() {
    static DONE: DoneSignal = DoneSignal::new();
    static RETRY_DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::new());
    pwm.initialize(&DONE).unwrap();
    pwm.bus_write_complete(BusStatus::Failed);
    assert_eq!(DONE.try_take(), Some(Err(Error::TransportFailure)));
    assert!(!pwm.is_ready());

    // The phase can be retried from scratch.
    pwm.initialize(&RETRY_DONE).unwrap();
    pwm.bus_write_complete(BusStatus::Ok);
    pwm.bus_write_complete(BusStatus::Ok);
    assert_eq!(RETRY_DONE.try_take(), Some(Ok(())));
    assert!(pwm.is_ready());
}

#[test]
fn transport_failure_during_configure_returns_to_ready() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = initialized();
    pwm.configure(200, &DONE).unwrap();
    pwm.bus_write_complete(BusStatus::Ok);
    pwm.bus_write_complete(BusStatus::Failed); // prescale write failed
    assert_eq!(DONE.try_take(), Some(Err(Error::TransportFailure)));
    assert!(pwm.is_ready());
}

#[test]
fn wakeup_failure_reaches_the_completion() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = initialized();
    pwm.configure(200, &DONE).unwrap();
    pwm.bus_write_complete(BusStatus::Ok);
    pwm.bus_write_complete(BusStatus::Ok);
    pwm.bus_write_complete(BusStatus::Failed); // wake-up write failed
    assert_eq!(DONE.try_take(), Some(Err(Error::TransportFailure)));
    assert!(pwm.is_ready());
}

#[test]
fn operations_are_rejected_while_a_write_is_in_flight() {
    static DONE: DoneSignal = DoneSignal::new();
    static OTHER: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::new());
    pwm.initialize(&DONE).unwrap();

    assert_eq!(pwm.configure(50, &OTHER), Err(Error::InvalidState));
    assert_eq!(pwm.all_on(), Err(Error::InvalidState));
    assert_eq!(pwm.commit_transaction(&OTHER), Err(Error::InvalidState));
    assert_eq!(pwm.bus().writes.len(), 1);
}

#[test]
fn synchronous_rejection_is_delivered_through_the_completion() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::rejecting_from(0));
    pwm.initialize(&DONE).unwrap();
    assert_eq!(DONE.try_take(), Some(Err(Error::TransportFailure)));
    assert!(pwm.bus().writes.is_empty());
}

#[test]
fn rejection_of_a_follow_up_write_ends_the_phase() {
    static DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(RecordingBus::rejecting_from(1));
    pwm.initialize(&DONE).unwrap();
    assert!(DONE.try_take().is_none());
    pwm.bus_write_complete(BusStatus::Ok); // mode write gets rejected
    assert_eq!(DONE.try_take(), Some(Err(Error::TransportFailure)));
    assert!(!pwm.is_ready());
}

#[test]
#[should_panic(expected = "before initialization")]
fn completion_with_no_write_in_flight_is_a_defect() {
    let mut pwm = Pca9685::new(RecordingBus::new());
    pwm.bus_write_complete(BusStatus::Ok);
}

// ============================================================================
// BlockingI2cBus adapter
// ============================================================================

#[derive(Default)]
struct MockI2c {
    frames: Vec<(u8, Vec<u8>)>,
}

impl embedded_hal::i2c::ErrorType for MockI2c {
    type Error = core::convert::Infallible;
}

impl embedded_hal::i2c::I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [embedded_hal::i2c::Operation<'_>],
    ) -> core::result::Result<(), Self::Error> {
        for op in operations.iter() {
            if let embedded_hal::i2c::Operation::Write(data) = op {
                self.frames.push((address, data.to_vec()));
            }
        }
        Ok(())
    }
}

#[test]
fn poll_drives_a_blocking_bus_through_the_whole_sequence() {
    static INIT_DONE: DoneSignal = DoneSignal::new();
    static CONFIG_DONE: DoneSignal = DoneSignal::new();
    let mut pwm = Pca9685::new(BlockingI2cBus::new(MockI2c::default()));

    pwm.initialize(&INIT_DONE).unwrap();
    pwm.poll();
    assert_eq!(INIT_DONE.try_take(), Some(Ok(())));

    pwm.configure(50, &CONFIG_DONE).unwrap();
    pwm.poll();
    assert_eq!(CONFIG_DONE.try_take(), Some(Ok(())));
    assert!(pwm.is_ready());

    let i2c = pwm.release().release();
    let expected: Vec<(u8, Vec<u8>)> = vec![
        (0x40, vec![0xFD, 0x10]),
        (0x40, vec![0x00, 0x30, 0x04]),
        (0x40, vec![0x00, 0x30, 0x04]),
        (0x40, vec![0xFE, 121]),
        (0x40, vec![0x00, 0x20]),
    ];
    assert_eq!(i2c.frames, expected);
}
