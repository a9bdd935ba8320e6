//! Register encoding for the PCA9685 16-channel PWM chip.
//!
//! Everything here is pure: functions turn an angle, a motor speed or an on/off state into the
//! `(register, value)` writes the chip expects. [`MotorDriver`](crate::motor_driver::MotorDriver)
//! sends them over I2C.
//!
//! Each channel owns four registers starting at `LED0_ON_L + 4 * channel`: the 12-bit count at
//! which the output turns on (`ON_L`, `ON_H`) and the count at which it turns off (`OFF_L`,
//! `OFF_H`). The driver keeps every start count at zero, so the stop count alone sets the pulse
//! width.

/// Default 7-bit I2C address of the chip on the motor driver board.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// MODE1 register.
pub const MODE1: u8 = 0x00;

/// PRE_SCALE register. The chip only accepts writes here while its oscillator sleeps.
pub const PRESCALE: u8 = 0xFE;

/// `LED0_ON_L`, the first channel register.
pub const LED0_ON_L: u8 = 0x06;

/// MODE1 value that puts the oscillator to sleep.
pub const MODE1_SLEEP: u8 = 0x10;

/// MODE1 value that wakes the chip: restart with all-call addressing enabled.
pub const MODE1_RESTART: u8 = 0x81;

/// Prescaler giving a ~60 Hz pulse repetition from the 25 MHz internal oscillator.
pub const PRESCALE_DEFAULT: u8 = 101;

/// Bit 4 of an `ON_H`/`OFF_H` register holds the output fully on or fully off.
pub const FULL_BIT: u8 = 0x10;

/// Number of PWM outputs on the chip.
pub const CHANNEL_COUNT: u8 = 16;

/// Smallest servo angle, in degrees.
pub const SERVO_MIN_DEGREES: i16 = -90;

/// Largest servo angle, in degrees.
pub const SERVO_MAX_DEGREES: i16 = 90;

/// Largest motor speed magnitude (percent).
pub const MOTOR_MAX_SPEED: i16 = 100;

/// Smallest accepted servo trim multiplier.
pub const SERVO_MULTIPLIER_MIN: u8 = 113;

/// Largest accepted servo trim multiplier (also the default).
pub const SERVO_MULTIPLIER_MAX: u8 = 226;

/// Smallest accepted servo trim zero offset (also the default).
pub const SERVO_ZERO_OFFSET_MIN: u8 = 0x66;

/// Largest accepted servo trim zero offset.
pub const SERVO_ZERO_OFFSET_MAX: u8 = 0xCC;

/// Number of writes in [`init_sequence`]: sleep, prescale, wake, then two per channel.
pub const INIT_SEQUENCE_LEN: usize = 3 + 2 * CHANNEL_COUNT as usize;

// Stop count at 0° and the count swing to either end of travel.
const SERVO_CENTER_COUNT: i32 = 369;
const SERVO_HALF_SPAN_COUNT: i32 = 223;

/// One PWM output of the chip (0..=15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Create a channel. Panics (at compile time in const contexts) if `index` is 16 or more.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        assert!(index < CHANNEL_COUNT, "channel index must be 0..=15");
        Self(index)
    }

    /// Channel number on the chip.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Address of the low byte of the start count.
    #[must_use]
    pub const fn on_l(self) -> u8 {
        LED0_ON_L + 4 * self.0
    }

    /// Address of the high byte of the start count.
    #[must_use]
    pub const fn on_h(self) -> u8 {
        self.on_l() + 1
    }

    /// Address of the low byte of the stop count.
    #[must_use]
    pub const fn off_l(self) -> u8 {
        self.on_l() + 2
    }

    /// Address of the high byte of the stop count.
    #[must_use]
    pub const fn off_h(self) -> u8 {
        self.on_l() + 3
    }
}

/// A single-register write: one byte to one register address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterWrite {
    /// Register address on the chip.
    pub register: u8,
    /// Byte written to it.
    pub value: u8,
}

impl RegisterWrite {
    /// Pair a register address with a value.
    #[must_use]
    pub const fn new(register: u8, value: u8) -> Self {
        Self { register, value }
    }
}

/// Calibration applied to every speed-to-duty conversion.
///
/// Both fields are clamped on construction, so a `Trim` is always within the ranges the
/// board tolerates. Out-of-range requests are corrected, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Trim {
    multiplier: u8,
    zero_offset: u8,
}

impl Trim {
    /// Trim for servos expecting 0.5–2.5 ms pulses: multiplier 226, zero offset `0x66`.
    pub const DEFAULT: Self = Self {
        multiplier: SERVO_MULTIPLIER_MAX,
        zero_offset: SERVO_ZERO_OFFSET_MIN,
    };

    /// Build a trim, clamping both values into range.
    #[must_use]
    pub const fn new(multiplier: u16, zero_offset: u16) -> Self {
        Self {
            multiplier: clamp_multiplier(multiplier),
            zero_offset: clamp_zero_offset(zero_offset),
        }
    }

    /// Effective multiplier.
    #[must_use]
    pub const fn multiplier(self) -> u8 {
        self.multiplier
    }

    /// Effective zero offset.
    #[must_use]
    pub const fn zero_offset(self) -> u8 {
        self.zero_offset
    }

    /// Copy of this trim with a new (clamped) multiplier.
    #[must_use]
    pub const fn with_multiplier(self, multiplier: u16) -> Self {
        Self {
            multiplier: clamp_multiplier(multiplier),
            zero_offset: self.zero_offset,
        }
    }

    /// Copy of this trim with a new (clamped) zero offset.
    #[must_use]
    pub const fn with_zero_offset(self, zero_offset: u16) -> Self {
        Self {
            multiplier: self.multiplier,
            zero_offset: clamp_zero_offset(zero_offset),
        }
    }
}

impl Default for Trim {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Clamp a raw multiplier to [113, 226].
#[must_use]
pub const fn clamp_multiplier(value: u16) -> u8 {
    if value < SERVO_MULTIPLIER_MIN as u16 {
        SERVO_MULTIPLIER_MIN
    } else if value > SERVO_MULTIPLIER_MAX as u16 {
        SERVO_MULTIPLIER_MAX
    } else {
        value as u8
    }
}

/// Clamp a raw zero offset to [0x66, 0xCC].
#[must_use]
pub const fn clamp_zero_offset(value: u16) -> u8 {
    if value < SERVO_ZERO_OFFSET_MIN as u16 {
        SERVO_ZERO_OFFSET_MIN
    } else if value > SERVO_ZERO_OFFSET_MAX as u16 {
        SERVO_ZERO_OFFSET_MAX
    } else {
        value as u8
    }
}

/// Clamp an angle to [-90, 90] degrees.
#[must_use]
pub const fn clamp_angle(degrees: i16) -> i16 {
    if degrees < SERVO_MIN_DEGREES {
        SERVO_MIN_DEGREES
    } else if degrees > SERVO_MAX_DEGREES {
        SERVO_MAX_DEGREES
    } else {
        degrees
    }
}

/// Clamp a signed motor speed to [-100, 100].
#[must_use]
pub const fn clamp_speed(speed: i16) -> i16 {
    if speed < -MOTOR_MAX_SPEED {
        -MOTOR_MAX_SPEED
    } else if speed > MOTOR_MAX_SPEED {
        MOTOR_MAX_SPEED
    } else {
        speed
    }
}

/// Stop count for a servo angle: `369 + angle * 223 / 90`, with the division rounding down.
///
/// Negative angles round toward -90, so -1° gives 366 rather than 367. The angle is clamped
/// first, so the result always lies in 146..=592.
#[must_use]
pub const fn servo_stop_count(degrees: i16) -> u16 {
    let degrees = clamp_angle(degrees) as i32;
    (SERVO_CENTER_COUNT + (degrees * SERVO_HALF_SPAN_COUNT).div_euclid(90)) as u16
}

/// Stop count for a servo angle as `[low, high]` register bytes.
#[must_use]
pub const fn encode_servo_angle(degrees: i16) -> [u8; 2] {
    split_count(servo_stop_count(degrees))
}

/// Duty count for a motor speed magnitude:
/// `magnitude * 100 * multiplier / 10000 + zero_offset`, dividing with truncation.
///
/// Magnitudes above 100 are clamped. With the widest trim the count reaches 430, so it needs
/// nine bits: anything above 255 carries into bit 0 of the high byte.
#[must_use]
pub const fn speed_duty(magnitude: u8, trim: Trim) -> u16 {
    let magnitude = if magnitude > MOTOR_MAX_SPEED as u8 {
        MOTOR_MAX_SPEED as u32
    } else {
        magnitude as u32
    };
    (magnitude * 100 * trim.multiplier as u32 / 10_000 + trim.zero_offset as u32) as u16
}

/// Duty count for a motor speed magnitude as `[low, high]` register bytes.
#[must_use]
pub const fn encode_speed_to_pwm(magnitude: u8, trim: Trim) -> [u8; 2] {
    split_count(speed_duty(magnitude, trim))
}

/// Writes that set a channel's stop count to the pulse for `degrees`.
#[must_use]
pub const fn servo_angle_writes(channel: Channel, degrees: i16) -> [RegisterWrite; 2] {
    stop_count_writes(channel, encode_servo_angle(degrees))
}

/// Writes that set a channel's stop count to the duty for a speed magnitude.
#[must_use]
pub const fn duty_writes(channel: Channel, magnitude: u8, trim: Trim) -> [RegisterWrite; 2] {
    stop_count_writes(channel, encode_speed_to_pwm(magnitude, trim))
}

/// Writes that hold a channel fully on. Full-off takes priority on the chip, so it is cleared.
#[must_use]
pub const fn full_on_writes(channel: Channel) -> [RegisterWrite; 2] {
    [
        RegisterWrite::new(channel.on_h(), FULL_BIT),
        RegisterWrite::new(channel.off_h(), 0x00),
    ]
}

/// Writes that hold a channel fully off.
#[must_use]
pub const fn full_off_writes(channel: Channel) -> [RegisterWrite; 2] {
    [
        RegisterWrite::new(channel.on_h(), 0x00),
        RegisterWrite::new(channel.off_h(), FULL_BIT),
    ]
}

/// The power-up sequence: sleep, set the prescaler, wake, then zero every start count.
#[must_use]
#[expect(
    clippy::indexing_slicing,
    reason = "const fn; every slot stays below INIT_SEQUENCE_LEN"
)]
pub const fn init_sequence(prescale: u8) -> [RegisterWrite; INIT_SEQUENCE_LEN] {
    let mut writes = [RegisterWrite::new(0, 0); INIT_SEQUENCE_LEN];
    writes[0] = RegisterWrite::new(MODE1, MODE1_SLEEP);
    writes[1] = RegisterWrite::new(PRESCALE, prescale);
    writes[2] = RegisterWrite::new(MODE1, MODE1_RESTART);
    let mut index = 0;
    while index < CHANNEL_COUNT {
        let channel = Channel::new(index);
        let slot = 3 + 2 * index as usize;
        writes[slot] = RegisterWrite::new(channel.on_l(), 0x00);
        writes[slot + 1] = RegisterWrite::new(channel.on_h(), 0x00);
        index += 1;
    }
    writes
}

const fn stop_count_writes(channel: Channel, [low, high]: [u8; 2]) -> [RegisterWrite; 2] {
    [
        RegisterWrite::new(channel.off_l(), low),
        RegisterWrite::new(channel.off_h(), high),
    ]
}

const fn split_count(count: u16) -> [u8; 2] {
    [(count & 0xFF) as u8, (count >> 8) as u8]
}
