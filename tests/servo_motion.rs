#![allow(missing_docs)]
//! Host-level tests for immediate servo positioning and speed-limited moves.

mod common;

use common::{MockBus, run_with_steppers};
use embassy_time::{Duration, Instant, Timer};
use motor_driver_envoy::board::Servo;
use motor_driver_envoy::codec::{INIT_SEQUENCE_LEN, servo_angle_writes};
use motor_driver_envoy::motor_driver::{Config, MotorDriver};

fn open() -> (MockBus, MotorDriver<MockBus>) {
    let bus = MockBus::new();
    let motor_driver = MotorDriver::<MockBus>::open(bus.clone(), Config::default()).expect("open");
    (bus, motor_driver)
}

fn is_one_degree_path(angles: &[i16]) -> bool {
    angles
        .windows(2)
        .all(|pair| (pair[1] - pair[0]).abs() == 1)
}

#[test]
fn set_servo_angle_writes_once_and_is_done() {
    let (bus, motor_driver) = open();

    motor_driver.set_servo_angle(Servo::Servo1, 45).expect("set");

    assert_eq!(
        bus.writes_after(INIT_SEQUENCE_LEN),
        servo_angle_writes(Servo::Servo1.channel(), 45)
    );
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), 45);
    assert_eq!(motor_driver.servo_target(Servo::Servo1), 45);
    assert!(motor_driver.is_servo_done(Servo::Servo1));
}

#[test]
fn set_servo_angle_twice_writes_the_same_bytes() {
    let (bus, motor_driver) = open();

    motor_driver.set_servo_angle(Servo::Servo2, -30).expect("set");
    let first = bus.writes_after(INIT_SEQUENCE_LEN);
    motor_driver.set_servo_angle(Servo::Servo2, -30).expect("set again");
    let second = bus.writes_after(INIT_SEQUENCE_LEN + first.len());

    assert_eq!(first, second);
    assert_eq!(motor_driver.servo_actual(Servo::Servo2), -30);
}

#[test]
fn set_servo_angle_clamps() {
    let (bus, motor_driver) = open();

    motor_driver.set_servo_angle(Servo::Servo1, 500).expect("set");
    motor_driver.set_servo_angle(Servo::Servo2, -500).expect("set");

    assert_eq!(motor_driver.servo_actual(Servo::Servo1), 90);
    assert_eq!(motor_driver.servo_target(Servo::Servo2), -90);
    assert_eq!(bus.servo_angles(Servo::Servo1), [90]);
    assert_eq!(bus.servo_angles(Servo::Servo2), [-90]);
}

#[test]
fn centre_servos_puts_both_at_zero() {
    let (bus, motor_driver) = open();
    motor_driver.set_servo_angle(Servo::Servo1, 20).expect("set");
    motor_driver.set_servo_angle(Servo::Servo2, -20).expect("set");

    motor_driver.centre_servos().expect("centre");

    for servo in Servo::ALL {
        assert_eq!(motor_driver.servo_actual(servo), 0);
        assert!(motor_driver.is_servo_done(servo));
        assert_eq!(bus.servo_angles(servo).last(), Some(&0));
    }
}

#[test]
fn move_servo_steps_one_degree_at_a_time_to_the_target() {
    let (bus, motor_driver) = open();

    let elapsed = run_with_steppers(&motor_driver, async {
        let start = Instant::now();
        motor_driver
            .move_servo(Servo::Servo1, 30, 60)
            .await
            .expect("move");
        motor_driver.wait_servo_done(Servo::Servo1).await;
        start.elapsed()
    });

    // 60 deg/s is a 17 ms step delay; the last of 30 writes follows 29 delays.
    assert!(elapsed >= Duration::from_millis(29 * 17), "{elapsed:?}");
    let expected: Vec<i16> = (1..=30).collect();
    assert_eq!(bus.servo_angles(Servo::Servo1), expected);
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), 30);
    assert_eq!(motor_driver.servo_target(Servo::Servo1), 30);
    assert!(motor_driver.is_servo_done(Servo::Servo1));
    assert!(bus.servo_angles(Servo::Servo2).is_empty());
}

#[test]
fn move_servo_steps_downward() {
    let (bus, motor_driver) = open();
    motor_driver.set_servo_angle(Servo::Servo2, 5).expect("set");

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo2, -5, 1000)
            .await
            .expect("move");
        motor_driver.wait_servo_done(Servo::Servo2).await;
    });

    let expected: Vec<i16> = (-5..=5).rev().collect();
    assert_eq!(bus.servo_angles(Servo::Servo2), expected);
    assert_eq!(motor_driver.servo_actual(Servo::Servo2), -5);
}

#[test]
fn move_servo_returns_before_the_move_completes() {
    let (_bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 10, 100)
            .await
            .expect("move");
        assert_eq!(motor_driver.servo_target(Servo::Servo1), 10);
        assert_eq!(motor_driver.servo_actual(Servo::Servo1), 0);
        assert!(!motor_driver.is_servo_done(Servo::Servo1));
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    assert_eq!(motor_driver.servo_actual(Servo::Servo1), 10);
}

#[test]
fn move_to_the_current_angle_writes_nothing() {
    let (bus, motor_driver) = open();
    motor_driver.set_servo_angle(Servo::Servo1, 12).expect("set");
    let before = bus.len();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 12, 50)
            .await
            .expect("move");
        assert!(motor_driver.is_servo_done(Servo::Servo1));
        Timer::after(Duration::from_millis(50)).await;
    });

    assert_eq!(bus.len(), before);
}

#[test]
fn move_servo_clamps_the_target() {
    let (bus, motor_driver) = open();
    motor_driver.set_servo_angle(Servo::Servo1, 85).expect("set");

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 120, 1000)
            .await
            .expect("move");
        assert_eq!(motor_driver.servo_target(Servo::Servo1), 90);
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    assert_eq!(bus.servo_angles(Servo::Servo1), [85, 86, 87, 88, 89, 90]);
}

#[test]
fn step_rate_follows_the_speed() {
    let (_bus, motor_driver) = open();

    let elapsed = run_with_steppers(&motor_driver, async {
        let start = Instant::now();
        motor_driver
            .move_servo(Servo::Servo1, 5, 100)
            .await
            .expect("move");
        motor_driver.wait_servo_done(Servo::Servo1).await;
        start.elapsed()
    });

    // Five steps with 10 ms between them; the last write lands after four delays.
    assert!(elapsed >= Duration::from_millis(40), "{elapsed:?}");
}

#[test]
fn a_new_move_cancels_the_old_one_where_it_stands() {
    let (bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 60, 20)
            .await
            .expect("first move");
        Timer::after(Duration::from_millis(180)).await;
        assert!(!motor_driver.is_servo_done(Servo::Servo1));

        motor_driver
            .move_servo(Servo::Servo1, -10, 1000)
            .await
            .expect("second move");
        assert_eq!(motor_driver.servo_target(Servo::Servo1), -10);
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    let angles = bus.servo_angles(Servo::Servo1);
    let peak = angles.iter().copied().max().expect("some steps");
    assert!(peak > 0 && peak < 60, "first move should stop early: {angles:?}");
    assert!(is_one_degree_path(&angles), "{angles:?}");
    assert_eq!(angles.last(), Some(&-10));
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), -10);
}

#[test]
fn an_immediate_second_move_starts_from_where_the_first_left_off() {
    let (bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 30, 10)
            .await
            .expect("first move");
        motor_driver
            .move_servo(Servo::Servo1, -10, 100)
            .await
            .expect("second move");
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    // The first move was cancelled before its first step, and nothing snapped back.
    let expected: Vec<i16> = (-10..=-1).rev().collect();
    assert_eq!(bus.servo_angles(Servo::Servo1), expected);
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), -10);
}

#[test]
fn a_move_issued_during_the_last_step_delay_never_steps_toward_a_cancelled_target() {
    let (bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        // At 1 deg/s the only step lands at once and is followed by a 1 s delay.
        motor_driver
            .move_servo(Servo::Servo1, 1, 1)
            .await
            .expect("first move");
        Timer::after(Duration::from_millis(20)).await;
        assert!(motor_driver.is_servo_done(Servo::Servo1));

        // Queued while the stepper still sleeps, then replaced before it wakes.
        motor_driver
            .move_servo(Servo::Servo1, 20, 1000)
            .await
            .expect("second move");
        motor_driver
            .move_servo(Servo::Servo1, -5, 1000)
            .await
            .expect("third move");
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    assert_eq!(bus.servo_angles(Servo::Servo1), [1, 0, -1, -2, -3, -4, -5]);
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), -5);
}

#[test]
fn three_rapid_moves_leave_only_the_last_one_running() {
    let (bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        for degrees in [10, 20, -3] {
            motor_driver
                .move_servo(Servo::Servo1, degrees, 1000)
                .await
                .expect("move");
        }
        assert_eq!(motor_driver.servo_target(Servo::Servo1), -3);
        motor_driver.wait_servo_done(Servo::Servo1).await;
        // Nothing left queued to run after arrival.
        Timer::after(Duration::from_millis(30)).await;
    });

    assert_eq!(bus.servo_angles(Servo::Servo1), [-1, -2, -3]);
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), -3);
}

#[test]
fn cancelling_to_the_stopped_angle_just_stops() {
    let (bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 90, 20)
            .await
            .expect("first move");
        Timer::after(Duration::from_millis(120)).await;
        // Whatever angle the stepper stopped at becomes the start of the new move.
        let angle = motor_driver.servo_actual(Servo::Servo1);
        motor_driver
            .move_servo(Servo::Servo1, angle, 1000)
            .await
            .expect("second move");
        Timer::after(Duration::from_millis(200)).await;
    });

    let angles = bus.servo_angles(Servo::Servo1);
    assert!(is_one_degree_path(&angles), "{angles:?}");
    assert!(motor_driver.is_servo_done(Servo::Servo1));
    assert!(motor_driver.servo_actual(Servo::Servo1) < 90);
}

#[test]
fn servos_move_independently() {
    let (bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 15, 1000)
            .await
            .expect("move 1");
        motor_driver
            .move_servo(Servo::Servo2, -15, 500)
            .await
            .expect("move 2");
        motor_driver.wait_servo_done(Servo::Servo1).await;
        motor_driver.wait_servo_done(Servo::Servo2).await;
    });

    let up: Vec<i16> = (1..=15).collect();
    let down: Vec<i16> = (-15..=-1).rev().collect();
    assert_eq!(bus.servo_angles(Servo::Servo1), up);
    assert_eq!(bus.servo_angles(Servo::Servo2), down);
}

#[test]
fn done_always_means_target_equals_actual() {
    let (_bus, motor_driver) = open();

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo2, 20, 200)
            .await
            .expect("move");
        while !motor_driver.is_servo_done(Servo::Servo2) {
            assert_ne!(
                motor_driver.servo_target(Servo::Servo2),
                motor_driver.servo_actual(Servo::Servo2)
            );
            Timer::after(Duration::from_millis(2)).await;
        }
        assert_eq!(
            motor_driver.servo_target(Servo::Servo2),
            motor_driver.servo_actual(Servo::Servo2)
        );
    });
}

#[test]
fn a_failed_step_abandons_the_move_where_it_stands() {
    let (bus, motor_driver) = open();
    // Five steps of two writes each succeed, then the bus stops answering.
    bus.fail_from(INIT_SEQUENCE_LEN + 10);

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 30, 1000)
            .await
            .expect("move");
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    assert_eq!(bus.servo_angles(Servo::Servo1), [1, 2, 3, 4, 5]);
    assert_eq!(motor_driver.servo_actual(Servo::Servo1), 5);
    assert_eq!(motor_driver.servo_target(Servo::Servo1), 5);
}

#[test]
fn wait_servo_done_returns_at_once_when_idle() {
    let (_bus, motor_driver) = open();
    embassy_futures::block_on(motor_driver.wait_servo_done(Servo::Servo1));
    assert!(motor_driver.is_servo_done(Servo::Servo1));
}

#[test]
fn move_servo_initializes_lazily() {
    let bus = MockBus::new();
    let motor_driver = MotorDriver::<MockBus>::new(bus.clone(), Config::default());

    run_with_steppers(&motor_driver, async {
        motor_driver
            .move_servo(Servo::Servo1, 3, 1000)
            .await
            .expect("move");
        motor_driver.wait_servo_done(Servo::Servo1).await;
    });

    assert!(motor_driver.is_initialized());
    assert_eq!(bus.len(), INIT_SEQUENCE_LEN + 6);
}
