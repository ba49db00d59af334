use std::result::Result as StdResult;

use thiserror::Error;

/// Convenient result type for MIDI input.
pub type Result<T> = StdResult<T, Error>;

/// Errors opening or listing MIDI input ports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The MIDI system could not be initialized.
    #[error("failed to initialize MIDI input: {0}")]
    Init(String),

    /// The requested port index does not exist.
    #[error("MIDI port {port} does not exist ({available} available)")]
    NoSuchPort {
        /// Requested index.
        port: usize,
        /// Number of ports found.
        available: usize,
    },

    /// Connecting to the port failed.
    #[error("failed to listen to MIDI port {port}: {message}")]
    Connect {
        /// Requested index.
        port: usize,
        /// Error reported by the MIDI system.
        message: String,
    },
}
