//! PWM frequency to prescale-divisor translation.
//!
//! The chip derives its PWM base frequency by dividing the 25 MHz internal
//! oscillator: `update_rate = OSC / (4096 × (prescale + 1))`. The nominal
//! inverse, `prescale = OSC / (4096 × freq) − 1` rounded to nearest, is
//! computed here in unsigned integer arithmetic only: doubling the dividend
//! folds the ½ rounding term into the final halving.

use core::time::Duration;

use crate::registers::TICKS_PER_PERIOD;
use crate::{Error, Result};

/// Internal oscillator frequency.
pub const OSC_FREQ_HZ: u32 = 25_000_000;

/// One oscillator period; the prescale stretches this into the PWM tick.
const OSC_PERIOD_NS: u64 = 1_000_000_000 / OSC_FREQ_HZ as u64;

/// Lowest divisor the chip accepts (highest PWM frequency).
pub const PRESCALE_MIN: u8 = 3;

/// Highest divisor the chip accepts (lowest PWM frequency).
pub const PRESCALE_MAX: u8 = 255;

/// Power-on divisor, before any [`configure`](crate::Pca9685::configure).
pub const PRESCALE_DEFAULT: u8 = PRESCALE_MIN;

/// Translate a requested PWM frequency into the 8-bit prescale divisor.
///
/// # Errors
///
/// [`Error::InvalidFrequency`] for 0 Hz and for frequencies whose divisor
/// falls outside `3..=255` (24 Hz..=1743 Hz with the internal
/// oscillator).
pub fn prescale_for_hz(freq_hz: u32) -> Result<u8> {
    if freq_hz == 0 {
        return Err(Error::InvalidFrequency);
    }
    let doubled_rate = 2 * OSC_FREQ_HZ / u32::from(TICKS_PER_PERIOD);
    let scale = (doubled_rate / freq_hz).saturating_sub(1) / 2;
    if scale < u32::from(PRESCALE_MIN) || scale > u32::from(PRESCALE_MAX) {
        return Err(Error::InvalidFrequency);
    }
    #[allow(clippy::cast_possible_truncation, reason = "bounds checked above")]
    let scale = scale as u8;
    Ok(scale)
}

/// Real length of one PWM tick for a given prescale divisor.
///
/// Exact: the oscillator period is a whole number of nanoseconds, so no
/// precision is lost.
#[must_use]
pub fn tick_duration(prescale: u8) -> Duration {
    Duration::from_nanos(OSC_PERIOD_NS * (u64::from(prescale) + 1))
}
