//! DC motor speed and direction.
//!
//! A motor speed is a signed percentage: positive turns forward, negative turns in reverse.
//! Direction comes from which H-bridge input is held fully on; the magnitude becomes the duty
//! count on the motor's speed output.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::I2c;

use crate::Result;
use crate::board::{MOTOR_ENABLE_CHANNELS, Motor, MotorChannels};
use crate::codec::{RegisterWrite, clamp_speed, duty_writes, full_off_writes, full_on_writes};
use crate::motor_driver::MotorDriver;

/// H-bridge state for a signed speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drive {
    /// Forward input on, reverse input off.
    Forward,
    /// Reverse input on, forward input off.
    Reverse,
    /// Both inputs on: the bridge shorts the motor and it stops quickly.
    Brake,
}

impl Drive {
    /// Direction for a signed speed. Zero brakes.
    #[must_use]
    pub const fn from_speed(speed: i16) -> Self {
        match speed.signum() {
            1 => Self::Forward,
            -1 => Self::Reverse,
            _ => Self::Brake,
        }
    }

    /// Writes setting the motor's two direction inputs.
    #[must_use]
    pub const fn writes(self, channels: MotorChannels) -> [[RegisterWrite; 2]; 2] {
        match self {
            Self::Forward => [
                full_on_writes(channels.forward),
                full_off_writes(channels.reverse),
            ],
            Self::Reverse => [
                full_off_writes(channels.forward),
                full_on_writes(channels.reverse),
            ],
            Self::Brake => [
                full_on_writes(channels.forward),
                full_on_writes(channels.reverse),
            ],
        }
    }
}

impl<I2C: I2c, M: RawMutex> MotorDriver<I2C, M> {
    /// Drive a DC motor at a signed speed percentage.
    ///
    /// The speed is clamped to [-100, 100]. Zero brakes the motor rather than letting it coast.
    /// The direction inputs, both H-bridge enables and the duty count go out as one locked
    /// sequence. The duty count uses the current trim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`](crate::Error::I2c) if initialization or any write fails. Writes
    /// before the failing one have already reached the chip.
    pub fn drive_motor(&self, motor: Motor, speed: i16) -> Result<()> {
        let speed = clamp_speed(speed);
        self.ensure_initialized()?;

        let channels = motor.channels();
        let drive = Drive::from_speed(speed);
        // Clamped to 100, so it fits.
        let magnitude = speed.unsigned_abs() as u8;
        info!("{:?}: {:?} at {}%", motor, drive, magnitude);

        self.write_registers(
            drive
                .writes(channels)
                .into_iter()
                .chain(MOTOR_ENABLE_CHANNELS.map(full_on_writes))
                .flatten()
                .chain(duty_writes(channels.pwm, magnitude, self.trim())),
        )
    }

    /// Brake every motor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`](crate::Error::I2c) from the first motor that fails.
    pub fn stop_motors(&self) -> Result<()> {
        Motor::ALL
            .into_iter()
            .try_for_each(|motor| self.drive_motor(motor, 0))
    }
}
