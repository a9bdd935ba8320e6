#![cfg(not(feature = "host"))]
#![no_std]
#![no_main]
#![allow(dead_code, reason = "Compile-time verification only")]

use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_time::Timer;
use motor_driver_envoy::Result;
use motor_driver_envoy::board::{Motor, Servo};
use motor_driver_envoy::motor_driver::motor_driver;

// Private, all defaults
motor_driver! {
    FrontBoard {
        i2c: I2C0,
        scl: PIN_9,
        sda: PIN_8,
    }
}

// Public, fields in a different order, address and prescale overridden
motor_driver! {
    pub RearBoard {
        sda: PIN_6,
        prescale: 121,
        scl: PIN_7,
        address: 0x41,
        i2c: I2C1,
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    if let Err(err) = inner_main(spawner).await {
        panic!("Initialization failed: {:?}", err);
    }
}

async fn inner_main(spawner: Spawner) -> Result<()> {
    let p = embassy_rp::init(Default::default());

    let front_board = FrontBoard::new(p.I2C0, p.PIN_9, p.PIN_8, spawner)?;
    let rear_board = RearBoard::new(p.I2C1, p.PIN_7, p.PIN_6, spawner)?;

    info!(
        "Boards at {} and {}",
        front_board.address(),
        rear_board.address()
    );

    rear_board.trim_servo_multiplier(180);
    front_board.move_servo(Servo::Servo1, 45, 90).await?;
    rear_board.move_servo(Servo::Servo2, -45, 90).await?;
    front_board.drive_motor(Motor::Motor2, 60)?;
    rear_board.drive_motor(Motor::Motor3, -60)?;

    front_board.wait_servo_done(Servo::Servo1).await;
    rear_board.wait_servo_done(Servo::Servo2).await;
    Timer::after_millis(500).await;

    front_board.stop_motors()?;
    rear_board.stop_motors()?;
    Ok(())
}

// panic_probe provides a panic handler for host, but we need one for embedded
#[cfg(target_arch = "arm")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo<'_>) -> ! {
    loop {}
}
