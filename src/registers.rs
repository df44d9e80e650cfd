//! Bit-exact model of the PCA9685 register file.
//!
//! Every value written to the chip is produced here: the per-channel
//! ON/OFF register quad ([`LedQuad`]), the two mode registers ([`Mode1`],
//! [`Mode2`]), and the register address map ([`Register`]). Encodings are
//! total and branch-free; reserved bits are always written as zero.
//!
//! Register table: <https://cdn-shop.adafruit.com/datasheets/PCA9685.pdf>

/// Number of independent PWM outputs on the chip.
pub const CHANNEL_COUNT: usize = 16;

/// Ticks in one PWM period (12-bit counter).
pub const TICKS_PER_PERIOD: u16 = 4096;

/// Flag bit in the `ON_H`/`OFF_H` registers that overrides the tick counts
/// and pins the output high/low.
pub const OVERRIDE_BIT: u8 = 1 << 4;

const COUNT_MASK: u16 = 0x0FFF;

/// PCA9685 register addresses.
pub struct Register;

#[allow(missing_docs, reason = "names follow the datasheet register table")]
impl Register {
    pub const MODE1: u8 = 0x00;
    pub const MODE2: u8 = 0x01;
    pub const SUBADR1: u8 = 0x02;
    pub const SUBADR2: u8 = 0x03;
    pub const SUBADR3: u8 = 0x04;
    pub const ALLCALLADR: u8 = 0x05;
    pub const LED0_ON_L: u8 = 0x06;

    /// First register of one channel's 4-byte ON/OFF block.
    #[must_use]
    pub const fn led_on_l(channel: u8) -> u8 {
        Self::LED0_ON_L + 4 * channel
    }

    /// Broadcast block: a 4-byte write here is applied to every channel.
    pub const ALL_LED_ON_L: u8 = 0xFA;
    pub const ALL_LED_ON_H: u8 = 0xFB;
    pub const ALL_LED_OFF_L: u8 = 0xFC;
    pub const ALL_LED_OFF_H: u8 = 0xFD;
    pub const PRESCALE: u8 = 0xFE;
}

// ============================================================================
// LedQuad - one channel's ON/OFF register block
// ============================================================================

/// One channel's 4-byte ON/OFF register block.
///
/// The two 12-bit counts place the rising and falling edge within the
/// 4096-tick PWM period. The override flags pin the output high
/// ([`full_on`](Self::full_on)) or low ([`full_off`](Self::full_off))
/// regardless of the counts; the chip gives full-off priority when both
/// are set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedQuad {
    /// Tick (0..=4095) at which the output switches on.
    pub on: u16,
    /// Tick (0..=4095) at which the output switches off.
    pub off: u16,
    /// Hold the output high, ignoring the counts.
    pub full_on: bool,
    /// Hold the output low, ignoring the counts.
    pub full_off: bool,
}

impl LedQuad {
    /// Override pattern that holds the output high.
    pub const FULL_ON: Self = Self {
        on: 0,
        off: 0,
        full_on: true,
        full_off: false,
    };

    /// Override pattern that holds the output low.
    pub const FULL_OFF: Self = Self {
        on: 0,
        off: 0,
        full_on: false,
        full_off: true,
    };

    /// Plain duty-cycle quad with both override flags clear.
    ///
    /// Counts are masked to 12 bits.
    #[must_use]
    pub const fn new(on: u16, off: u16) -> Self {
        Self {
            on: on & COUNT_MASK,
            off: off & COUNT_MASK,
            full_on: false,
            full_off: false,
        }
    }

    /// Serialize in chip memory order: `[ON_L, ON_H, OFF_L, OFF_H]`.
    ///
    /// Reserved bits (5..=7 of the `*_H` bytes) are written as zero.
    #[must_use]
    pub const fn encode(self) -> [u8; 4] {
        [
            (self.on & 0xFF) as u8,
            ((self.on >> 8) & 0x0F) as u8 | ((self.full_on as u8) << 4),
            (self.off & 0xFF) as u8,
            ((self.off >> 8) & 0x0F) as u8 | ((self.full_off as u8) << 4),
        ]
    }

    /// Rebuild a quad from chip memory order. Reserved bits are ignored.
    #[must_use]
    pub const fn decode(bytes: [u8; 4]) -> Self {
        Self {
            on: bytes[0] as u16 | (((bytes[1] & 0x0F) as u16) << 8),
            off: bytes[2] as u16 | (((bytes[3] & 0x0F) as u16) << 8),
            full_on: bytes[1] & OVERRIDE_BIT != 0,
            full_off: bytes[3] & OVERRIDE_BIT != 0,
        }
    }
}

// ============================================================================
// Mode registers
// ============================================================================

/// MODE1: oscillator, addressing, and auto-increment configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mode1 {
    /// Respond to the all-call I2C address.
    pub allcall: bool,
    /// Respond to I2C subaddress 3.
    pub sub3: bool,
    /// Respond to I2C subaddress 2.
    pub sub2: bool,
    /// Respond to I2C subaddress 1.
    pub sub1: bool,
    /// Oscillator off; required while writing the prescale register.
    pub sleep: bool,
    /// Register auto-increment for multi-byte bus writes.
    pub auto_increment: bool,
    /// Use the EXTCLK pin instead of the internal oscillator.
    pub extclk: bool,
    /// Restart the PWM cycle after a sleep period.
    pub restart: bool,
}

impl Mode1 {
    /// Bring-up configuration: auto-increment on, oscillator asleep,
    /// sub/all-call addressing disabled.
    pub const SLEEP: Self = Self {
        allcall: false,
        sub3: false,
        sub2: false,
        sub1: false,
        sleep: true,
        auto_increment: true,
        extclk: false,
        restart: false,
    };

    /// Running configuration: auto-increment on, oscillator awake.
    pub const WAKE: Self = Self {
        sleep: false,
        ..Self::SLEEP
    };

    /// The register byte for this configuration.
    #[must_use]
    pub const fn bits(self) -> u8 {
        (self.allcall as u8)
            | ((self.sub3 as u8) << 1)
            | ((self.sub2 as u8) << 2)
            | ((self.sub1 as u8) << 3)
            | ((self.sleep as u8) << 4)
            | ((self.auto_increment as u8) << 5)
            | ((self.extclk as u8) << 6)
            | ((self.restart as u8) << 7)
    }
}

/// What the outputs drive while the chip's OE pin disables them
/// (the MODE2 OUTNE field).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputDisable {
    /// Outputs are driven low.
    #[default]
    Low = 0,
    /// Outputs are driven high (high-impedance for open-drain outputs).
    High = 1,
    /// Outputs are high-impedance.
    HighZ = 2,
}

/// MODE2: output driver configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mode2 {
    /// OUTNE field: output behavior while disabled via OE.
    pub output_disable: OutputDisable,
    /// OUTDRV: totem-pole outputs instead of open-drain.
    pub totem_pole: bool,
    /// OCH: outputs change on I2C ACK instead of on STOP.
    pub change_on_ack: bool,
    /// INVRT: invert the output logic state.
    pub invert: bool,
}

impl Mode2 {
    /// Bring-up configuration: totem-pole outputs, everything else at the
    /// chip default.
    pub const TOTEM_POLE: Self = Self {
        output_disable: OutputDisable::Low,
        totem_pole: true,
        change_on_ack: false,
        invert: false,
    };

    /// The register byte for this configuration. Bits 5..=7 are reserved
    /// and written as zero.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.output_disable as u8
            | ((self.totem_pole as u8) << 2)
            | ((self.change_on_ack as u8) << 3)
            | ((self.invert as u8) << 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_addresses_match_datasheet() {
        assert_eq!(Register::MODE1, 0x00);
        assert_eq!(Register::MODE2, 0x01);
        assert_eq!(Register::LED0_ON_L, 0x06);
        assert_eq!(Register::ALL_LED_ON_L, 0xFA);
        assert_eq!(Register::ALL_LED_OFF_H, 0xFD);
        assert_eq!(Register::PRESCALE, 0xFE);
    }

    #[test]
    fn channel_blocks_are_4_bytes_apart() {
        assert_eq!(Register::led_on_l(0), 0x06);
        assert_eq!(Register::led_on_l(1), 0x0A);
        assert_eq!(Register::led_on_l(15), 0x42);
    }

    #[test]
    fn quad_encodes_counts_in_chip_order() {
        let quad = LedQuad::new(0x123, 0xABC);
        assert_eq!(quad.encode(), [0x23, 0x01, 0xBC, 0x0A]);
    }

    #[test]
    fn quad_round_trips_every_count() {
        for tick in 0..TICKS_PER_PERIOD {
            let quad = LedQuad::new(tick, TICKS_PER_PERIOD - 1 - tick);
            assert_eq!(LedQuad::decode(quad.encode()), quad);
        }
    }

    #[test]
    fn quad_masks_counts_to_12_bits() {
        let quad = LedQuad::new(0x1FFF, 0xF234);
        assert_eq!(quad.on, 0x0FFF);
        assert_eq!(quad.off, 0x0234);
    }

    #[test]
    fn override_patterns_zero_the_counts() {
        assert_eq!(LedQuad::FULL_ON.encode(), [0x00, 0x10, 0x00, 0x00]);
        assert_eq!(LedQuad::FULL_OFF.encode(), [0x00, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn decode_ignores_reserved_bits() {
        let quad = LedQuad::decode([0x55, 0xE2, 0xAA, 0xC1]);
        assert_eq!(quad.on, 0x255);
        assert_eq!(quad.off, 0x1AA);
        assert!(!quad.full_on);
        assert!(!quad.full_off);
    }

    #[test]
    fn mode1_bring_up_values() {
        assert_eq!(Mode1::SLEEP.bits(), 0x30);
        assert_eq!(Mode1::WAKE.bits(), 0x20);
    }

    #[test]
    fn mode1_bits_match_datasheet_positions() {
        let allcall = Mode1 {
            allcall: true,
            ..Mode1::default()
        };
        assert_eq!(allcall.bits(), 0x01);
        let restart = Mode1 {
            restart: true,
            ..Mode1::default()
        };
        assert_eq!(restart.bits(), 0x80);
        let extclk = Mode1 {
            extclk: true,
            ..Mode1::default()
        };
        assert_eq!(extclk.bits(), 0x40);
    }

    #[test]
    fn mode2_bring_up_value() {
        assert_eq!(Mode2::TOTEM_POLE.bits(), 0x04);
    }

    #[test]
    fn mode2_bits_match_datasheet_positions() {
        let invert = Mode2 {
            invert: true,
            ..Mode2::default()
        };
        assert_eq!(invert.bits(), 0x10);
        let high_z = Mode2 {
            output_disable: OutputDisable::HighZ,
            ..Mode2::default()
        };
        assert_eq!(high_z.bits(), 0x02);
        assert_eq!(Mode2::default().bits(), 0x00);
    }
}
