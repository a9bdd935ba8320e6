use derive_more::derive::{Display, Error};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Define a unified error type for this crate.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// A register write on the I2C bus failed.
    ///
    /// The chip may now hold a partially written channel; the caller decides whether to retry.
    #[display("I2C register write failed: {_0:?}")]
    I2c(#[error(not(source))] embedded_hal::i2c::ErrorKind),

    // `#[error(not(source))]` below tells `derive_more` that `embassy_executor::SpawnError` does
    // not implement Rust's `core::error::Error` trait.
    /// A background stepper task could not be spawned.
    #[cfg(feature = "arm")]
    #[display("{_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),
}

#[cfg(feature = "arm")]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}
