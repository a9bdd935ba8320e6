//! Speed-limited servo motion with cancellation.
//!
//! Each servo has a target angle (where a move is heading) and an actual angle (the last value
//! written to the chip). [`MotorDriver::move_servo`] records a target and hands a step plan to
//! that servo's stepper loop, [`MotorDriver::run_servo_stepper`], which writes one degree at a
//! time with a fixed delay between steps.
//!
//! A new move on a servo that is still moving first cancels the old one and waits until the
//! stepper acknowledges, so the servo stops where it is and the new move starts from there.

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use embedded_hal::i2c::I2c;
use portable_atomic::{AtomicI16, Ordering};

use crate::Result;
use crate::board::Servo;
use crate::codec::{clamp_angle, servo_angle_writes};
use crate::motor_driver::MotorDriver;

/// Slowest accepted step rate, in degrees per second.
pub const SERVO_SPEED_MIN: u16 = 1;

/// Fastest accepted step rate, in degrees per second.
pub const SERVO_SPEED_MAX: u16 = 1000;

/// How often [`MotorDriver::wait_servo_done`] checks for arrival.
pub const DONE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Clamp a speed to [1, 1000] degrees per second.
#[must_use]
pub const fn clamp_servo_speed(speed: u16) -> u16 {
    if speed < SERVO_SPEED_MIN {
        SERVO_SPEED_MIN
    } else if speed > SERVO_SPEED_MAX {
        SERVO_SPEED_MAX
    } else {
        speed
    }
}

/// Delay between one-degree steps: `1000 / speed` ms, rounded half up.
///
/// The speed is clamped first, so the delay is 1 ms at the fastest and 1000 ms at the slowest.
#[must_use]
pub const fn step_delay(speed: u16) -> Duration {
    let speed = clamp_servo_speed(speed) as u64;
    Duration::from_millis((2000 + speed) / (2 * speed))
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    direction: i16,
    step_delay: Duration,
}

/// Per-servo motion state shared between callers and the stepper loop.
pub(crate) struct ServoState {
    target: AtomicI16,
    actual: AtomicI16,
    pending: Signal<CriticalSectionRawMutex, StepPlan>,
    cancel: Signal<CriticalSectionRawMutex, ()>,
    stopped: Signal<CriticalSectionRawMutex, ()>,
}

impl ServoState {
    pub(crate) const fn new() -> Self {
        Self {
            target: AtomicI16::new(0),
            actual: AtomicI16::new(0),
            pending: Signal::new(),
            cancel: Signal::new(),
            stopped: Signal::new(),
        }
    }

    /// Back to the power-up state: both angles zero, nothing queued.
    pub(crate) fn reset(&self) {
        self.target.store(0, Ordering::Relaxed);
        self.actual.store(0, Ordering::Relaxed);
        self.pending.reset();
        self.cancel.reset();
        self.stopped.reset();
    }

    fn target(&self) -> i16 {
        self.target.load(Ordering::Relaxed)
    }

    fn actual(&self) -> i16 {
        self.actual.load(Ordering::Relaxed)
    }

    fn is_done(&self) -> bool {
        self.target() == self.actual()
    }

    async fn cancel_and_wait(&self) {
        self.stopped.reset();
        self.cancel.signal(());
        self.stopped.wait().await;
    }

    /// Drop the cancel request and any plan queued behind it, then release the canceller.
    fn acknowledge_cancel(&self) {
        self.cancel.reset();
        self.pending.reset();
        self.stopped.signal(());
    }
}

impl<I2C: I2c, M: RawMutex> MotorDriver<I2C, M> {
    /// Write a servo angle immediately, with no stepping.
    ///
    /// The angle is clamped to [-90, 90]. Target and actual both become the clamped angle, so
    /// the servo reports done. Writing the same angle twice sends the same bytes twice.
    ///
    /// Do not call this while a move on the same servo is in progress; use
    /// [`MotorDriver::move_servo`], which cancels first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`](crate::Error::I2c) if initialization or the write fails.
    pub fn set_servo_angle(&self, servo: Servo, degrees: i16) -> Result<()> {
        let degrees = clamp_angle(degrees);
        self.ensure_initialized()?;
        debug!("{:?}: set to {}", servo, degrees);
        self.write_servo_angle(servo, degrees)?;
        self.servo_state(servo)
            .target
            .store(degrees, Ordering::Relaxed);
        Ok(())
    }

    /// Put every servo at 0°.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`](crate::Error::I2c) from the first servo write that fails.
    pub fn centre_servos(&self) -> Result<()> {
        Servo::ALL
            .into_iter()
            .try_for_each(|servo| self.set_servo_angle(servo, 0))
    }

    /// Start moving a servo toward `degrees` at `speed` degrees per second.
    ///
    /// The angle is clamped to [-90, 90] and the speed to [1, 1000]. If the servo is still
    /// moving, that move is cancelled first and this waits until the stepper has stopped; the
    /// new move then starts from wherever the servo got to. Otherwise this returns without
    /// waiting, and a move to the current angle writes nothing.
    ///
    /// The servo's stepper loop ([`MotorDriver::run_servo_stepper`]) must be running or a
    /// cancellation will never be acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`](crate::Error::I2c) if initialization fails.
    pub async fn move_servo(&self, servo: Servo, degrees: i16, speed: u16) -> Result<()> {
        let degrees = clamp_angle(degrees);
        let speed = clamp_servo_speed(speed);
        self.ensure_initialized()?;
        let state = self.servo_state(servo);

        if !state.is_done() {
            debug!(
                "{:?}: cancelling move to {} at {}",
                servo,
                state.target(),
                state.actual()
            );
            state.cancel_and_wait().await;
        }

        let actual = state.actual();
        state.target.store(degrees, Ordering::Relaxed);
        if degrees == actual {
            return Ok(());
        }
        info!(
            "{:?}: moving {} -> {} at {} deg/s",
            servo, actual, degrees, speed
        );
        state.pending.signal(StepPlan {
            direction: if degrees > actual { 1 } else { -1 },
            step_delay: step_delay(speed),
        });
        Ok(())
    }

    /// Last angle written to the servo.
    #[must_use]
    pub fn servo_actual(&self, servo: Servo) -> i16 {
        self.servo_state(servo).actual()
    }

    /// Angle the servo is heading to (equal to the actual angle when idle).
    #[must_use]
    pub fn servo_target(&self, servo: Servo) -> i16 {
        self.servo_state(servo).target()
    }

    /// Whether the servo has reached its target.
    #[must_use]
    pub fn is_servo_done(&self, servo: Servo) -> bool {
        self.servo_state(servo).is_done()
    }

    /// Wait until the servo reaches its target, checking every 10 ms.
    ///
    /// There is no timeout. If the stepper loop is not running, or a step write failed and the
    /// move was abandoned, this still returns once target and actual agree; a target that can
    /// never be reached would wait forever.
    pub async fn wait_servo_done(&self, servo: Servo) {
        while !self.is_servo_done(servo) {
            Timer::after(DONE_POLL_INTERVAL).await;
        }
    }

    /// The stepper loop for one servo. Run exactly one per servo for the driver's lifetime.
    ///
    /// [`motor_driver!`](macro@crate::motor_driver) spawns these for you.
    pub async fn run_servo_stepper(&self, servo: Servo) -> ! {
        let state = self.servo_state(servo);
        debug!("{:?}: stepper running", servo);
        loop {
            let plan = state.pending.wait().await;
            self.step_toward_target(servo, plan).await;
        }
    }

    async fn step_toward_target(&self, servo: Servo, plan: StepPlan) {
        let state = self.servo_state(servo);
        loop {
            if state.cancel.try_take().is_some() {
                debug!("{:?}: stopped at {}", servo, state.actual());
                state.acknowledge_cancel();
                return;
            }
            // A newer move replaces this one.
            if state.pending.signaled() {
                return;
            }

            let actual = state.actual();
            if actual == state.target() {
                debug!("{:?}: reached {}", servo, actual);
                return;
            }

            let next = actual + plan.direction;
            if self.write_servo_angle(servo, next).is_err() {
                warn!("{:?}: step write failed, holding at {}", servo, actual);
                state.target.store(actual, Ordering::Relaxed);
                return;
            }
            trace!("{:?}: {}", servo, next);

            if let Either::Second(()) =
                select(Timer::after(plan.step_delay), state.cancel.wait()).await
            {
                debug!("{:?}: stopped at {}", servo, next);
                state.acknowledge_cancel();
                return;
            }
        }
    }

    fn write_servo_angle(&self, servo: Servo, degrees: i16) -> Result<()> {
        let degrees = clamp_angle(degrees);
        self.write_registers(servo_angle_writes(servo.channel(), degrees))?;
        self.servo_state(servo)
            .actual
            .store(degrees, Ordering::Relaxed);
        Ok(())
    }
}
