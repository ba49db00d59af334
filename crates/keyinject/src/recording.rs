//! Recording injector used by engine tests.

use std::collections::HashMap;

use linux_keycode::Key;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{KeyInjector, Result};

/// One recorded press or release of a single key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEdge {
    /// Affected key.
    pub key: Key,
    /// True for a press, false for a release.
    pub pressed: bool,
    /// Tokio clock reading when the edge was injected (follows paused time).
    pub at: Instant,
}

/// Injector that records every edge and the current state of each key.
#[derive(Default)]
pub struct RecordingInjector {
    /// Every edge in injection order.
    edges: Mutex<Vec<KeyEdge>>,
    /// Last known state per key.
    state: Mutex<HashMap<Key, bool>>,
}

impl RecordingInjector {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is currently held down.
    pub fn is_down(&self, key: Key) -> bool {
        self.state.lock().get(&key).copied().unwrap_or(false)
    }

    /// All recorded edges, oldest first.
    pub fn edges(&self) -> Vec<KeyEdge> {
        self.edges.lock().clone()
    }

    /// Recorded edges for a single key.
    pub fn edges_for(&self, key: Key) -> Vec<KeyEdge> {
        self.edges.lock().iter().filter(|e| e.key == key).copied().collect()
    }

    /// Number of presses recorded for `key`.
    pub fn presses(&self, key: Key) -> usize {
        self.edges_for(key).iter().filter(|e| e.pressed).count()
    }

    /// Forget all recorded edges, keeping current key state.
    pub fn clear_edges(&self) {
        self.edges.lock().clear();
    }

    /// Append one edge per key and update their state.
    fn record(&self, keys: &[Key], pressed: bool) {
        let at = Instant::now();
        let mut edges = self.edges.lock();
        let mut state = self.state.lock();
        for key in keys {
            edges.push(KeyEdge {
                key: *key,
                pressed,
                at,
            });
            state.insert(*key, pressed);
        }
    }
}

impl KeyInjector for RecordingInjector {
    fn press(&self, keys: &[Key]) -> Result<()> {
        self.record(keys, true);
        Ok(())
    }

    fn release(&self, keys: &[Key]) -> Result<()> {
        self.record(keys, false);
        Ok(())
    }
}
