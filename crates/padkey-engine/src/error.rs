use std::result::Result as StdResult;

use linux_keycode::ComboError;
use thiserror::Error;

/// Convenient result type for the engine crate.
pub type Result<T> = StdResult<T, Error>;

/// Registration errors. A running engine never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Output keys do not form a valid combo.
    #[error("invalid key combo: {0}")]
    Combo(#[from] ComboError),

    /// A sequence was registered without any key group.
    #[error("a sequence needs at least one key group")]
    EmptySequence,

    /// A profile swap was registered without any profile name.
    #[error("a profile swap needs at least one profile name")]
    EmptyProfileList,
}
