use std::fmt;

use thiserror::Error;

use crate::Key;

/// Maximum number of keys pressed together by a single combo.
pub const MAX_COMBO_KEYS: usize = 4;

/// Errors produced while building or parsing a combo.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComboError {
    /// The combo lists no keys.
    #[error("empty key combo")]
    Empty,
    /// A component is not a known key spec.
    #[error("invalid key: '{0}'")]
    UnknownKey(String),
    /// More keys than `MAX_COMBO_KEYS`.
    #[error("a combo acts on at most {MAX_COMBO_KEYS} keys, got {0}")]
    TooManyKeys(usize),
}

/// Order-independent identity of a combo.
///
/// Two combos listing the same keys in a different order share an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComboId([u16; MAX_COMBO_KEYS]);

/// One or more keys that are pressed and released as a unit.
///
/// Keys keep their declared order, which is the order they are pressed in.
/// Repeated keys are dropped.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Combo {
    /// Keys in press order.
    keys: Vec<Key>,
}

impl Combo {
    /// Builds a combo from keys in press order.
    pub fn new<I>(keys: I) -> Result<Self, ComboError>
    where
        I: IntoIterator<Item = Key>,
    {
        let mut out: Vec<Key> = Vec::new();
        for key in keys {
            if !out.contains(&key) {
                out.push(key);
            }
        }
        if out.is_empty() {
            return Err(ComboError::Empty);
        }
        if out.len() > MAX_COMBO_KEYS {
            return Err(ComboError::TooManyKeys(out.len()));
        }
        Ok(Self { keys: out })
    }

    /// A combo made of a single key.
    pub fn single(key: Key) -> Self {
        Self { keys: vec![key] }
    }

    /// Parses a comma-separated list of key specs, e.g. `"ctrl,shift,a"`.
    pub fn parse(s: &str) -> Result<Self, ComboError> {
        let mut keys = Vec::new();
        for part in s.split(',') {
            let key = Key::from_spec(part).ok_or_else(|| ComboError::UnknownKey(part.to_string()))?;
            keys.push(key);
        }
        Self::new(keys)
    }

    /// Keys in press order.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Canonical names of the keys, in press order.
    pub fn names(&self) -> Vec<&'static str> {
        self.keys.iter().map(|k| k.name()).collect()
    }

    /// Order-independent identity used to deduplicate shared key state.
    pub fn id(&self) -> ComboId {
        let mut codes = [0u16; MAX_COMBO_KEYS];
        for (slot, key) in codes.iter_mut().zip(&self.keys) {
            *slot = key.code();
        }
        codes[..self.keys.len()].sort_unstable();
        ComboId(codes)
    }
}

impl From<Key> for Combo {
    fn from(key: Key) -> Self {
        Self::single(key)
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(","))
    }
}
