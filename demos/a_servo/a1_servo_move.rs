#![no_std]
#![no_main]
#![cfg(not(feature = "host"))]

use core::{convert::Infallible, panic};
use motor_driver_envoy::{Result, board::Servo, motor_driver::motor_driver};
use embassy_executor::Spawner;
use embassy_time::Timer;
use {defmt::info, defmt_rtt as _, panic_probe as _};

motor_driver! {
    Board {
        i2c: I2C0,
        scl: PIN_9,
        sda: PIN_8,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    let p = embassy_rp::init(Default::default());

    // PCA9685 board on I2C0 (SDA GPIO 8, SCL GPIO 9)
    info!("Starting servo move demo");
    let board = Board::new(p.I2C0, p.PIN_9, p.PIN_8, spawner)?;

    board.centre_servos()?;
    Timer::after_millis(500).await;

    // Sweep servo 1 end to end, slow one way and fast the other.
    loop {
        info!("Servo 1 to 90 at 45 deg/s");
        board.move_servo(Servo::Servo1, 90, 45).await?;
        board.wait_servo_done(Servo::Servo1).await;
        Timer::after_millis(300).await;

        info!("Servo 1 to -90 at 180 deg/s");
        board.move_servo(Servo::Servo1, -90, 180).await?;
        board.wait_servo_done(Servo::Servo1).await;
        Timer::after_millis(300).await;
    }
}
