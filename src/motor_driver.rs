//! A device abstraction for the PCA9685 motor driver board.
//!
//! [`MotorDriver`] is the one owned instance per chip. It holds the I2C bus, the trim, the
//! initialization flag and the per-servo motion state, and every operation takes `&self` so the
//! foreground code and the background servo steppers can share it.
//!
//! On a Pico, use the [`motor_driver!`](macro@crate::motor_driver) macro: it opens the bus,
//! initializes the chip, and spawns one stepper task per servo. On any other
//! `embedded_hal::i2c::I2c` bus, build a [`MotorDriver`] directly and run
//! [`MotorDriver::run_servo_stepper`] for each [`Servo`](crate::board::Servo) alongside your code.
//!
//! # Example
//!
//! ```rust,ignore
//! use core::convert::Infallible;
//! use motor_driver_envoy::{Result, board::{Motor, Servo}, motor_driver::motor_driver};
//!
//! motor_driver! {
//!     Board {
//!         i2c: I2C0,
//!         scl: PIN_5,
//!         sda: PIN_4,
//!         // address and prescale set to their defaults
//!     }
//! }
//!
//! async fn example(p: embassy_rp::Peripherals, spawner: embassy_executor::Spawner) -> Result<Infallible> {
//!     let board = Board::new(p.I2C0, p.PIN_5, p.PIN_4, spawner)?;
//!
//!     board.move_servo(Servo::Servo1, 45, 60).await?; // 45° at 60°/s, returns at once
//!     board.drive_motor(Motor::Motor1, 75)?;          // forward at 75 %
//!     board.wait_servo_done(Servo::Servo1).await;
//!     board.drive_motor(Motor::Motor1, 0)?;           // brake
//!
//!     core::future::pending().await
//! }
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embedded_hal::i2c::{Error as _, I2c};
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::board::{SERVO_COUNT, Servo};
use crate::codec::{DEFAULT_ADDRESS, PRESCALE_DEFAULT, RegisterWrite, Trim, init_sequence};
use crate::servo_motion::ServoState;
use crate::{Error, Result};

#[cfg(feature = "arm")]
#[doc(hidden)]
pub use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
#[doc(hidden)]
pub use paste;
#[doc(hidden)]
pub use static_cell;

/// Settings fixed when a [`MotorDriver`] is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// 7-bit I2C address of the chip.
    pub address: u8,
    /// PRE_SCALE value written during initialization.
    pub prescale: u8,
    /// Initial trim. Change it later with [`MotorDriver::trim_servo_multiplier`] and
    /// [`MotorDriver::trim_servo_zero_offset`].
    pub trim: Trim,
}

impl Config {
    /// Address `0x40`, ~60 Hz, default trim.
    pub const DEFAULT: Self = Self {
        address: DEFAULT_ADDRESS,
        prescale: PRESCALE_DEFAULT,
        trim: Trim::DEFAULT,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The PCA9685 motor driver board: two servos and four DC motors behind one I2C address.
///
/// `M` guards the bus for the length of each register sequence. The default,
/// [`CriticalSectionRawMutex`], masks interrupts on a board for the whole (blocking) transfer;
/// [`motor_driver!`](macro@crate::motor_driver) uses `ThreadModeRawMutex` instead, which only
/// allows locking from thread mode and leaves interrupts running.
///
/// See the [module documentation](mod@crate::motor_driver) for usage.
pub struct MotorDriver<I2C, M = CriticalSectionRawMutex> {
    bus: Mutex<M, RefCell<I2C>>,
    address: u8,
    prescale: u8,
    initialized: AtomicBool,
    servo_multiplier: AtomicU8,
    servo_zero_offset: AtomicU8,
    servos: [ServoState; SERVO_COUNT],
}

impl<I2C, M: RawMutex> MotorDriver<I2C, M> {
    /// Wrap a bus without touching the chip.
    ///
    /// The chip is initialized by the first operation that writes to it, or explicitly with
    /// [`MotorDriver::ensure_initialized`]. Prefer [`MotorDriver::open`] when you can handle the
    /// error up front.
    #[must_use]
    pub const fn new(i2c: I2C, config: Config) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(i2c)),
            address: config.address,
            prescale: config.prescale,
            initialized: AtomicBool::new(false),
            servo_multiplier: AtomicU8::new(config.trim.multiplier()),
            servo_zero_offset: AtomicU8::new(config.trim.zero_offset()),
            servos: [ServoState::new(), ServoState::new()],
        }
    }

    /// 7-bit I2C address this driver writes to.
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Whether the power-up sequence has been issued. Never goes back to `false`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Current trim.
    #[must_use]
    pub fn trim(&self) -> Trim {
        Trim::new(
            u16::from(self.servo_multiplier()),
            u16::from(self.servo_zero_offset()),
        )
    }

    /// Effective trim multiplier, always in [113, 226].
    #[must_use]
    pub fn servo_multiplier(&self) -> u8 {
        self.servo_multiplier.load(Ordering::Relaxed)
    }

    /// Effective trim zero offset, always in [0x66, 0xCC].
    #[must_use]
    pub fn servo_zero_offset(&self) -> u8 {
        self.servo_zero_offset.load(Ordering::Relaxed)
    }

    /// Set the trim multiplier. Values outside [113, 226] are clamped to the nearest end.
    pub fn trim_servo_multiplier(&self, value: u16) {
        let trim = self.trim().with_multiplier(value);
        self.servo_multiplier
            .store(trim.multiplier(), Ordering::Relaxed);
        info!("trim multiplier {} -> {}", value, trim.multiplier());
    }

    /// Set the trim zero offset. Values outside [0x66, 0xCC] are clamped to the nearest end.
    pub fn trim_servo_zero_offset(&self, value: u16) {
        let trim = self.trim().with_zero_offset(value);
        self.servo_zero_offset
            .store(trim.zero_offset(), Ordering::Relaxed);
        info!("trim zero offset {} -> {}", value, trim.zero_offset());
    }

    /// Give the bus back. Any stepper still borrowing the driver must be gone.
    pub fn destroy(self) -> I2C {
        self.bus.into_inner().into_inner()
    }

    pub(crate) const fn servo_state(&self, servo: Servo) -> &ServoState {
        let [servo1, servo2] = &self.servos;
        match servo {
            Servo::Servo1 => servo1,
            Servo::Servo2 => servo2,
        }
    }
}

impl<I2C: I2c, M: RawMutex> MotorDriver<I2C, M> {
    /// Create the driver and run the power-up sequence now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`] if any initialization write fails.
    pub fn open(i2c: I2C, config: Config) -> Result<Self> {
        let motor_driver = Self::new(i2c, config);
        motor_driver.ensure_initialized()?;
        Ok(motor_driver)
    }

    /// Issue the power-up sequence once: sleep, prescaler, wake, zero start counts.
    ///
    /// Later calls do nothing. The flag is set before the writes go out, so a failed sequence
    /// is not retried; power-cycle the board and create a new driver instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::I2c`] from the first write that fails.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(
            "initializing PCA9685 at address {} (prescale {})",
            self.address, self.prescale
        );
        for servo_state in &self.servos {
            servo_state.reset();
        }
        self.write_registers(init_sequence(self.prescale))
    }

    /// Write registers in order while holding the bus, so no other writer can interleave.
    ///
    /// The lock is held for every blocking transfer in the sequence. With a critical-section
    /// mutex that keeps interrupts off for roughly 0.2 ms per write at 100 kHz.
    pub(crate) fn write_registers(
        &self,
        writes: impl IntoIterator<Item = RegisterWrite>,
    ) -> Result<()> {
        self.bus.lock(|bus| {
            let mut bus = bus.borrow_mut();
            writes.into_iter().try_for_each(|write| {
                trace!("write {} <- {}", write.register, write.value);
                bus.write(self.address, &[write.register, write.value])
                    .map_err(|err| Error::I2c(err.kind()))
            })
        })
    }
}

/// Create a motor driver board type with keyword arguments.
///
/// Required fields: `i2c`, `scl`, `sda` (peripheral names, e.g. `I2C0`, `PIN_5`, `PIN_4`).
///
/// Optional fields: `address` (default [`DEFAULT_ADDRESS`](crate::codec::DEFAULT_ADDRESS)) and
/// `prescale` (default [`PRESCALE_DEFAULT`](crate::codec::PRESCALE_DEFAULT)).
///
/// The generated type has `new(i2c, scl, sda, spawner) -> Result<&'static Self>`, which opens a
/// blocking I2C bus, initializes the chip and spawns a stepper task for each servo. It derefs to
/// [`MotorDriver`].
///
/// See the [module documentation](mod@crate::motor_driver) for an example.
#[cfg(feature = "arm")]
#[macro_export]
macro_rules! motor_driver {
    ($($tt:tt)*) => { $crate::__motor_driver_impl! { $($tt)* } };
}
#[cfg(feature = "arm")]
#[doc(inline)]
pub use motor_driver;

// Public for macro expansion in downstream crates.
#[cfg(feature = "arm")]
#[doc(hidden)]
#[macro_export]
macro_rules! __motor_driver_impl {
    // Fill defaults: i2c
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:tt,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr,
        fields: [ i2c: $i2c_value:ident $(, $($rest:tt)* )? ]
    ) => {
        $crate::__motor_driver_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            i2c: $i2c_value,
            scl: $scl,
            sda: $sda,
            address: $address,
            prescale: $prescale,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: scl
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:tt,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr,
        fields: [ scl: $scl_value:ident $(, $($rest:tt)* )? ]
    ) => {
        $crate::__motor_driver_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            i2c: $i2c,
            scl: $scl_value,
            sda: $sda,
            address: $address,
            prescale: $prescale,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: sda
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:tt,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr,
        fields: [ sda: $sda_value:ident $(, $($rest:tt)* )? ]
    ) => {
        $crate::__motor_driver_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            i2c: $i2c,
            scl: $scl,
            sda: $sda_value,
            address: $address,
            prescale: $prescale,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: address
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:tt,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr,
        fields: [ address: $address_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__motor_driver_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            i2c: $i2c,
            scl: $scl,
            sda: $sda,
            address: $address_value,
            prescale: $prescale,
            fields: [ $($($rest)*)? ]
        }
    };

    // Fill defaults: prescale
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:tt,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr,
        fields: [ prescale: $prescale_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__motor_driver_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            i2c: $i2c,
            scl: $scl,
            sda: $sda,
            address: $address,
            prescale: $prescale_value,
            fields: [ $($($rest)*)? ]
        }
    };

    // All fields consumed
    (@__fill_defaults
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:tt,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr,
        fields: [ ]
    ) => {
        $crate::__motor_driver_impl! {
            @__build
            vis: $vis,
            name: $name,
            i2c: $i2c,
            scl: $scl,
            sda: $sda,
            address: $address,
            prescale: $prescale
        }
    };

    (@__build
        vis: $vis:vis,
        name: $name:ident,
        i2c: _UNSET_,
        scl: $scl:tt,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr
    ) => {
        compile_error!("motor_driver! requires `i2c: ...`");
    };

    (@__build
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:ident,
        scl: _UNSET_,
        sda: $sda:tt,
        address: $address:expr,
        prescale: $prescale:expr
    ) => {
        compile_error!("motor_driver! requires `scl: ...`");
    };

    (@__build
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:ident,
        scl: $scl:ident,
        sda: _UNSET_,
        address: $address:expr,
        prescale: $prescale:expr
    ) => {
        compile_error!("motor_driver! requires `sda: ...`");
    };

    (@__build
        vis: $vis:vis,
        name: $name:ident,
        i2c: $i2c:ident,
        scl: $scl:ident,
        sda: $sda:ident,
        address: $address:expr,
        prescale: $prescale:expr
    ) => {
        $crate::motor_driver::paste::paste! {
            /// Blocking I2C bus used by the generated motor driver type.
            $vis type [<$name Bus>] = ::embassy_rp::i2c::I2c<
                'static,
                ::embassy_rp::peripherals::$i2c,
                ::embassy_rp::i2c::Blocking,
            >;

            static [<$name:upper _MOTOR_DRIVER_CELL>]: $crate::motor_driver::static_cell::StaticCell<$name> =
                $crate::motor_driver::static_cell::StaticCell::new();

            $vis struct $name {
                motor_driver: $crate::motor_driver::MotorDriver<
                    [<$name Bus>],
                    $crate::motor_driver::ThreadModeRawMutex,
                >,
            }

            impl $name {
                /// Open the bus, initialize the chip and spawn the servo stepper tasks.
                ///
                /// # Errors
                ///
                /// Returns an error if initialization fails or a stepper task cannot be spawned.
                pub fn new(
                    i2c: impl Into<::embassy_rp::Peri<'static, ::embassy_rp::peripherals::$i2c>>,
                    scl: impl Into<::embassy_rp::Peri<'static, ::embassy_rp::peripherals::$scl>>,
                    sda: impl Into<::embassy_rp::Peri<'static, ::embassy_rp::peripherals::$sda>>,
                    spawner: ::embassy_executor::Spawner,
                ) -> $crate::Result<&'static Self> {
                    let bus = ::embassy_rp::i2c::I2c::new_blocking(
                        i2c.into(),
                        scl.into(),
                        sda.into(),
                        ::embassy_rp::i2c::Config::default(),
                    );
                    let config = $crate::motor_driver::Config {
                        address: $address,
                        prescale: $prescale,
                        ..$crate::motor_driver::Config::DEFAULT
                    };
                    let motor_driver = $crate::motor_driver::MotorDriver::open(bus, config)?;
                    let this: &'static Self =
                        [<$name:upper _MOTOR_DRIVER_CELL>].init(Self { motor_driver });
                    for servo in $crate::board::Servo::ALL {
                        let token = [<$name:snake _servo_stepper_task>](&this.motor_driver, servo)?;
                        spawner.spawn(token);
                    }
                    Ok(this)
                }
            }

            impl ::core::ops::Deref for $name {
                type Target = $crate::motor_driver::MotorDriver<
                    [<$name Bus>],
                    $crate::motor_driver::ThreadModeRawMutex,
                >;

                fn deref(&self) -> &Self::Target {
                    &self.motor_driver
                }
            }

            #[::embassy_executor::task(pool_size = 2)]
            async fn [<$name:snake _servo_stepper_task>](
                motor_driver: &'static $crate::motor_driver::MotorDriver<
                    [<$name Bus>],
                    $crate::motor_driver::ThreadModeRawMutex,
                >,
                servo: $crate::board::Servo,
            ) -> ! {
                motor_driver.run_servo_stepper(servo).await
            }
        }
    };

    // Entry point - name with optional visibility (defaults to private)
    (
        $vis:vis $name:ident {
            $($fields:tt)*
        }
    ) => {
        $crate::__motor_driver_impl! {
            @__fill_defaults
            vis: $vis,
            name: $name,
            i2c: _UNSET_,
            scl: _UNSET_,
            sda: _UNSET_,
            address: $crate::codec::DEFAULT_ADDRESS,
            prescale: $crate::codec::PRESCALE_DEFAULT,
            fields: [ $($fields)* ]
        }
    };
}
