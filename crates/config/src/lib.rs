//! Binding configuration for padkey.
//!
//! A configuration file holds one binding per line:
//!
//! ```text
//! # ch= ev= key= thres= ACTION args...
//! ch=9 ev=38 key=SPACE thres=20 BASIC 40
//! ch=9 ev=36 key=ctrl,z thres=30 VELOCITY 20 200
//! ch=9 ev=0x2a key=W thres=10 REPEAT 150 60
//! ```
//!
//! plus a small set of `@` directives controlling named profiles:
//!
//! ```text
//! @profile racing          # following bindings go into "racing"
//! ch=9 ev=38 key=UP thres=20 BASIC 40
//! @profile default         # back to the default set
//! @active racing           # "racing" is the initially active set
//! @swap ch=9 ev=49 thres=60 racing,menus
//! ```
//!
//! Parsing is strict: the first malformed line aborts loading with an
//! [`Error::Line`] that names the line, the token, and the [`LineError`] kind.
use std::{path::Path, result::Result as StdResult, time::Duration};

use linux_keycode::Combo;

mod error;
mod loader;
mod parse;

#[cfg(test)]
mod test_parse;

pub use error::{Error, LineError, excerpt_at};
pub use loader::{DEFAULT_CONFIG_PATH, load_from_path, load_from_str};

/// Result alias for configuration operations.
pub type Result<T> = StdResult<T, Error>;

/// Keyword that names the default set in `@profile` and `@active`.
pub const DEFAULT_PROFILE: &str = "default";

/// A parsed configuration: entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Entries in the order they appear in the file.
    pub entries: Vec<Entry>,
}

impl Config {
    /// Iterate over the bindings only.
    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Bind(b) => Some(b),
            _ => None,
        })
    }

    /// Whether the configuration holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        load_from_path(path)
    }
}

/// One meaningful line of a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// A trigger bound to an output action.
    Bind(Binding),
    /// `@profile`: switch the set subsequent bindings go into. `None` is the
    /// default set.
    Profile(Option<String>),
    /// `@active`: select the active named set. `None` deactivates named sets.
    Activate(Option<String>),
    /// `@swap`: a trigger that cycles the active set through a list.
    Swap(ProfileSwap),
}

/// A NoteOn trigger bound to an output key action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// MIDI channel, 0..=15.
    pub channel: u8,
    /// MIDI note number of the trigger.
    pub note: u8,
    /// Output keys.
    pub combo: Combo,
    /// Velocities at or below this are ignored.
    pub threshold: u8,
    /// What the trigger does.
    pub action: ActionSpec,
}

/// Action kinds and their arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    /// Press, then release after a fixed time.
    Basic {
        /// Time the keys stay down.
        release: Duration,
    },
    /// Press for a time scaled by velocity between `min_press` and `max_press`.
    Velocity {
        /// Hold time at velocity 0.
        min_press: Duration,
        /// Hold time at velocity 128.
        max_press: Duration,
    },
    /// Toggle the keys; soft hits below `accept_threshold` are quick taps.
    Toggle {
        /// Velocities at or above this latch the keys down.
        accept_threshold: u8,
        /// Hold time for a soft hit.
        quick_press: Duration,
    },
    /// Keep the keys down while hits keep repeating.
    Repeat {
        /// Maximum gap between hits that still counts as a repeat.
        max_repeat_delay: Duration,
        /// Hold time for an isolated hit.
        short_release: Duration,
    },
    /// Repeat-hold over a cyclic list of combos, navigated by three more notes.
    RepeatSequence {
        /// Maximum gap between hits that still counts as a repeat.
        max_repeat_delay: Duration,
        /// Hold time for an isolated hit.
        short_release: Duration,
        /// Note that moves to the previous group.
        prev: u8,
        /// Note that moves to the next group.
        next: u8,
        /// Note that returns to the first group.
        reset: u8,
        /// Groups after the binding's own combo, which is always group 0.
        groups: Vec<Combo>,
    },
}

impl ActionSpec {
    /// Config keyword for this action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "BASIC",
            Self::Velocity { .. } => "VELOCITY",
            Self::Toggle { .. } => "TOGGLE",
            Self::Repeat { .. } => "REPEAT",
            Self::RepeatSequence { .. } => "REPEAT-SEQUENCE",
        }
    }
}

/// A trigger that advances the active named set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSwap {
    /// MIDI channel, 0..=15.
    pub channel: u8,
    /// MIDI note number of the trigger.
    pub note: u8,
    /// Velocities at or below this are ignored.
    pub threshold: u8,
    /// Named sets, in cycling order.
    pub names: Vec<String>,
}
