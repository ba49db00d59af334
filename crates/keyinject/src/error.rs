//! Error types and result alias for the keyinject crate.
use std::result::Result as StdResult;

use thiserror::Error;

/// Crate-local `Result` alias using the injection error type.
pub type Result<T> = StdResult<T, Error>;

/// Errors that can occur while creating the virtual keyboard or posting events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Failure creating the uinput virtual device.
    #[error("Failed to create virtual keyboard: {0}")]
    DeviceCreate(String),
    /// Failure writing key events to the virtual device.
    #[error("Failed to emit key events: {0}")]
    Emit(String),
    /// Key injection is not available on this platform.
    #[error("Key injection is not supported on this platform")]
    Unsupported,
}
