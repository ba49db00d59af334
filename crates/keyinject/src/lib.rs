//! Injects synthetic key presses and releases into the system.
//!
//! A `VirtualKeyboard` registers a uinput device with the kernel and writes
//! key events to it, so every application sees them as real keyboard input.
//! Callers go through the `KeyInjector` trait so the engine can run against
//! a `NullInjector` or, with the `test-utils` feature, a
//! `RecordingInjector`.
//!
//! Keys in a combo are pressed in declared order and released in reverse
//! order, so modifiers wrap the keys they modify.
#![warn(missing_docs)]
use std::sync::Arc;

use linux_keycode::Key;
use tracing::{info, trace};

mod error;
#[cfg(target_os = "linux")]
mod sys;

pub use error::{Error, Result};

/// Name under which the virtual keyboard is registered.
pub const DEVICE_NAME: &str = "padkey virtual keyboard";

/// Presses and releases output keys.
///
/// Both calls are fire-and-forget from the engine's point of view: errors
/// are returned so the caller can log them, never retried.
pub trait KeyInjector: Send + Sync {
    /// Press `keys` in order.
    fn press(&self, keys: &[Key]) -> Result<()>;
    /// Release `keys` in reverse order.
    fn release(&self, keys: &[Key]) -> Result<()>;
}

/// Low-level event writer behind a `VirtualKeyboard`.
pub(crate) trait Poster: Send + Sync {
    /// Write one event per key, all with the same direction.
    fn post(&self, keys: &[Key], down: bool) -> Result<()>;
}

/// Key injector backed by a uinput virtual keyboard.
#[derive(Clone)]
pub struct VirtualKeyboard {
    /// Backend the events are written to.
    poster: Arc<dyn Poster>,
}

impl VirtualKeyboard {
    /// Register the virtual keyboard with the kernel.
    ///
    /// Requires write access to `/dev/uinput`. Desktop environments may take
    /// a moment to pick up the new device before injected keys are visible.
    #[cfg(target_os = "linux")]
    pub fn new() -> Result<Self> {
        let poster = sys::UinputPoster::open(DEVICE_NAME)?;
        info!(name = DEVICE_NAME, "virtual_keyboard_ready");
        Ok(Self {
            poster: Arc::new(poster),
        })
    }

    /// Key injection needs uinput, which only exists on Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn new() -> Result<Self> {
        Err(Error::Unsupported)
    }

    /// Test helper to inject a custom poster.
    #[cfg(test)]
    pub(crate) fn new_with_poster(poster: Arc<dyn Poster>) -> Self {
        Self { poster }
    }
}

impl KeyInjector for VirtualKeyboard {
    fn press(&self, keys: &[Key]) -> Result<()> {
        trace!(?keys, "press_keys");
        self.poster.post(keys, true)
    }

    fn release(&self, keys: &[Key]) -> Result<()> {
        trace!(?keys, "release_keys");
        let reversed: Vec<Key> = keys.iter().rev().copied().collect();
        self.poster.post(&reversed, false)
    }
}

/// Injector that discards every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullInjector;

impl KeyInjector for NullInjector {
    fn press(&self, _keys: &[Key]) -> Result<()> {
        Ok(())
    }

    fn release(&self, _keys: &[Key]) -> Result<()> {
        Ok(())
    }
}

#[cfg(feature = "test-utils")]
mod recording;

#[cfg(feature = "test-utils")]
pub use recording::{KeyEdge, RecordingInjector};
