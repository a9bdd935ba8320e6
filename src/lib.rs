//! Servo and DC motor control through a PCA9685 16-channel I2C PWM chip, for Pico 1 and 2.
//!
//! The board this targets carries two servo headers and four DC motor outputs (through two
//! H-bridge chips), all fed by one PCA9685. [`MotorDriver`](motor_driver::MotorDriver) owns the
//! bus and offers:
//!
//! - immediate servo positioning ([`set_servo_angle`](motor_driver::MotorDriver::set_servo_angle)),
//! - speed-limited, cancellable servo moves ([`move_servo`](motor_driver::MotorDriver::move_servo)),
//! - signed-percentage motor drive ([`drive_motor`](motor_driver::MotorDriver::drive_motor)),
//! - trim of the speed-to-duty conversion.
//!
//! The chip is initialized lazily on first use, or eagerly with
//! [`MotorDriver::open`](motor_driver::MotorDriver::open).
//!
//! # Glossary
//!
//! - **Stop count:** the 12-bit count within one PWM cycle at which an output turns off. Start
//!   counts are kept at zero, so the stop count is the pulse width.
//! - **Step:** a one-degree change of a servo's angle during a move.
//! - **Trim:** the multiplier and zero offset applied when turning a motor speed into a duty count.
#![cfg_attr(not(feature = "host"), no_std)]

// Compile-time checks: an ARM build needs exactly one board
#[cfg(all(feature = "arm", not(any(feature = "pico1", feature = "pico2"))))]
compile_error!("The 'arm' feature needs a board feature: 'pico1' or 'pico2'");

#[cfg(all(feature = "pico1", feature = "pico2"))]
compile_error!("Cannot enable both 'pico1' and 'pico2' features simultaneously");

#[cfg(all(feature = "host", feature = "arm"))]
compile_error!("The 'host' feature cannot be combined with 'arm'");

// Must come first so the logging macros are visible in every module below.
#[macro_use]
mod fmt;

pub mod board;
pub mod codec;
mod error;
pub mod motor;
pub mod motor_driver;
pub mod servo_motion;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
