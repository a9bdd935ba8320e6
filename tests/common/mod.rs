//! Shared host fixtures: a recording I2C bus and a runner for the servo stepper loops.
#![allow(dead_code, reason = "each test file uses a different subset")]

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use embassy_futures::block_on;
use embassy_futures::select::{Either3, select3};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use motor_driver_envoy::board::Servo;
use motor_driver_envoy::codec::{
    Channel, RegisterWrite, SERVO_MAX_DEGREES, SERVO_MIN_DEGREES, servo_stop_count,
};
use motor_driver_envoy::motor_driver::MotorDriver;

/// Records every two-byte register write. Clones share the same record.
#[derive(Clone, Default)]
pub struct MockBus {
    writes: Rc<RefCell<Vec<(u8, RegisterWrite)>>>,
    fail_from: Rc<Cell<Option<usize>>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every write once `count` writes have been recorded.
    pub fn fail_from(&self, count: usize) {
        self.fail_from.set(Some(count));
    }

    pub fn recover(&self) {
        self.fail_from.set(None);
    }

    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.writes.borrow().iter().map(|(_, write)| *write).collect()
    }

    pub fn addresses(&self) -> Vec<u8> {
        self.writes
            .borrow()
            .iter()
            .map(|(address, _)| *address)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.writes.borrow().len()
    }

    /// Writes recorded after the first `skip`.
    pub fn writes_after(&self, skip: usize) -> Vec<RegisterWrite> {
        self.writes().into_iter().skip(skip).collect()
    }

    /// Stop counts written to `channel`, pairing each `OFF_L` write with the `OFF_H` after it.
    pub fn stop_counts(&self, channel: Channel) -> Vec<u16> {
        let writes = self.writes();
        writes
            .windows(2)
            .filter(|pair| {
                pair[0].register == channel.off_l() && pair[1].register == channel.off_h()
            })
            .map(|pair| u16::from(pair[0].value) | (u16::from(pair[1].value) << 8))
            .collect()
    }

    /// Angles written to a servo, decoded from its stop counts.
    pub fn servo_angles(&self, servo: Servo) -> Vec<i16> {
        self.stop_counts(servo.channel())
            .into_iter()
            .map(angle_for_stop_count)
            .collect()
    }
}

pub fn angle_for_stop_count(count: u16) -> i16 {
    (SERVO_MIN_DEGREES..=SERVO_MAX_DEGREES)
        .find(|&degrees| servo_stop_count(degrees) == count)
        .unwrap_or_else(|| panic!("{count} is not a servo stop count"))
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            if let Operation::Write(bytes) = operation {
                if self
                    .fail_from
                    .get()
                    .is_some_and(|count| self.len() >= count)
                {
                    return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data));
                }
                let [register, value] = bytes else {
                    panic!("expected a two-byte register write, got {bytes:?}");
                };
                self.writes
                    .borrow_mut()
                    .push((address, RegisterWrite::new(*register, *value)));
            }
        }
        Ok(())
    }
}

/// Run `body` to completion with both servo stepper loops running beside it.
pub fn run_with_steppers<M: RawMutex, F: Future>(
    motor_driver: &MotorDriver<MockBus, M>,
    body: F,
) -> F::Output {
    block_on(async {
        match select3(
            motor_driver.run_servo_stepper(Servo::Servo1),
            motor_driver.run_servo_stepper(Servo::Servo2),
            body,
        )
        .await
        {
            Either3::First(never) | Either3::Second(never) => match never {},
            Either3::Third(output) => output,
        }
    })
}
