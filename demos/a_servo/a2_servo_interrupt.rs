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

    info!("Starting servo interrupt demo");
    let board = Board::new(p.I2C0, p.PIN_9, p.PIN_8, spawner)?;
    board.centre_servos()?;

    loop {
        // A slow move that never finishes: each new move stops the servo where it is.
        board.move_servo(Servo::Servo2, 90, 20).await?;
        Timer::after_millis(1500).await;
        info!(
            "Interrupted at {} on the way to {}",
            board.servo_actual(Servo::Servo2),
            board.servo_target(Servo::Servo2)
        );

        board.move_servo(Servo::Servo2, -90, 20).await?;
        Timer::after_millis(3000).await;
        info!("Interrupted at {}", board.servo_actual(Servo::Servo2));

        // Back to centre quickly and wait for it.
        board.move_servo(Servo::Servo2, 0, 300).await?;
        board.wait_servo_done(Servo::Servo2).await;
    }
}
