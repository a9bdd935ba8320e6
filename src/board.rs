//! Fixed channel assignments on the motor driver board.
//!
//! The two servo headers sit on the last two chip outputs. Each DC motor uses three outputs:
//! two direction inputs of its H-bridge and one speed (PWM) input. Outputs 12 and 13 enable the
//! H-bridge chips.

use crate::codec::Channel;

/// Number of servo headers on the board.
pub const SERVO_COUNT: usize = 2;

/// Number of DC motor outputs on the board.
pub const MOTOR_COUNT: usize = 4;

/// H-bridge enable outputs, held fully on while motors are driven.
pub const MOTOR_ENABLE_CHANNELS: [Channel; 2] = [Channel::new(12), Channel::new(13)];

/// A servo header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Servo {
    /// Header 1 (chip output 15).
    Servo1,
    /// Header 2 (chip output 14).
    Servo2,
}

impl Servo {
    /// Every servo header, in index order.
    pub const ALL: [Self; SERVO_COUNT] = [Self::Servo1, Self::Servo2];

    /// Chip output driving this header.
    #[must_use]
    pub const fn channel(self) -> Channel {
        match self {
            Self::Servo1 => Channel::new(15),
            Self::Servo2 => Channel::new(14),
        }
    }
}

/// A DC motor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Motor {
    /// Motor 1 (outputs 0, 1, 2).
    Motor1,
    /// Motor 2 (outputs 3, 4, 5).
    Motor2,
    /// Motor 3 (outputs 6, 7, 8).
    Motor3,
    /// Motor 4 (outputs 9, 10, 11).
    Motor4,
}

/// The three chip outputs behind one motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorChannels {
    /// Held on to turn forward.
    pub forward: Channel,
    /// Held on to turn in reverse.
    pub reverse: Channel,
    /// Duty cycle sets the speed.
    pub pwm: Channel,
}

impl Motor {
    /// Every motor output, in board order.
    pub const ALL: [Self; MOTOR_COUNT] = [Self::Motor1, Self::Motor2, Self::Motor3, Self::Motor4];

    /// Chip outputs driving this motor.
    #[must_use]
    pub const fn channels(self) -> MotorChannels {
        let first = match self {
            Self::Motor1 => 0,
            Self::Motor2 => 3,
            Self::Motor3 => 6,
            Self::Motor4 => 9,
        };
        MotorChannels {
            forward: Channel::new(first),
            reverse: Channel::new(first + 1),
            pwm: Channel::new(first + 2),
        }
    }
}
