//! State document posted to the overlay endpoint.

use std::collections::BTreeMap;

use serde::Serialize;

/// Map key for a trigger: `0x` followed by channel and note as two hex bytes.
pub fn trigger_key(channel: u8, note: u8) -> String {
    format!("0x{channel:02x}{note:02x}")
}

/// One change reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Trigger `channel`/`note` was bound to `keys`.
    Binding {
        /// MIDI channel.
        channel: u8,
        /// Note number.
        note: u8,
        /// Comma-joined key names.
        keys: String,
    },
    /// Trigger `channel`/`note` was received.
    Trigger {
        /// MIDI channel.
        channel: u8,
        /// Note number.
        note: u8,
    },
    /// Keys were pressed or released.
    Keys {
        /// Key names.
        names: Vec<&'static str>,
        /// New state.
        pressed: bool,
    },
}

/// Accumulated state, serialized as `{ "map", "midi", "keys" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Trigger to bound key names.
    pub map: BTreeMap<String, String>,
    /// Trigger to the wall clock time it was last received, in Unix ms.
    pub midi: BTreeMap<String, i64>,
    /// Key name to pressed state.
    pub keys: BTreeMap<String, bool>,
}

impl Snapshot {
    /// Fold one update in. `now_ms` stamps trigger updates.
    pub fn apply(&mut self, update: Update, now_ms: i64) {
        match update {
            Update::Binding {
                channel,
                note,
                keys,
            } => {
                self.map.insert(trigger_key(channel, note), keys);
            }
            Update::Trigger { channel, note } => {
                self.midi.insert(trigger_key(channel, note), now_ms);
            }
            Update::Keys { names, pressed } => {
                for name in names {
                    self.keys.insert(name.to_string(), pressed);
                }
            }
        }
    }

    /// JSON body for the endpoint.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
