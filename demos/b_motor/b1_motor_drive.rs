#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::{convert::Infallible, panic};
use motor_driver_envoy::{Result, board::Motor, motor_driver::motor_driver};
use embassy_executor::Spawner;
use embassy_time::Timer;
use {defmt::info, defmt_rtt as _, panic_probe as _};

motor_driver! {
    Board {
        i2c: I2C0,
        scl: PIN_9,
        sda: PIN_8,
        address: 0x40,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    info!("Starting motor drive demo");
    let board = Board::new(p.I2C0, p.PIN_9, p.PIN_8, spawner)?;

    loop {
        // Ramp every motor up forward, brake, then ramp up in reverse.
        for speed in (0..=100).step_by(25) {
            info!("All motors forward at {}%", speed);
            for motor in Motor::ALL {
                board.drive_motor(motor, speed)?;
            }
            Timer::after_millis(800).await;
        }
        board.stop_motors()?;
        Timer::after_millis(1000).await;

        for speed in (0..=100).step_by(25) {
            info!("Motor 1 reverse at {}%", speed);
            board.drive_motor(Motor::Motor1, -speed)?;
            Timer::after_millis(800).await;
        }
        board.stop_motors()?;
        Timer::after_millis(1000).await;
    }
}
