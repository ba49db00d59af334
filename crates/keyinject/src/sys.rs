//! uinput backend: a virtual keyboard registered with the kernel.

use evdev::{
    AttributeSet, EventType, InputEvent, Key as EvKey,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};
use linux_keycode::Key;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{Error, Poster, Result};

/// Key event value for a press.
const KEY_DOWN: i32 = 1;
/// Key event value for a release.
const KEY_UP: i32 = 0;

/// Poster writing to a uinput device that advertises every `Key`.
pub struct UinputPoster {
    /// The registered device; writes are serialized.
    device: Mutex<VirtualDevice>,
}

impl UinputPoster {
    /// Register a new virtual keyboard named `name`.
    pub fn open(name: &str) -> Result<Self> {
        let mut keys = AttributeSet::<EvKey>::new();
        for key in Key::ALL {
            keys.insert(EvKey::new(key.code()));
        }
        let device = VirtualDeviceBuilder::new()
            .and_then(|b| b.name(name).with_keys(&keys))
            .and_then(|b| b.build())
            .map_err(|e| Error::DeviceCreate(e.to_string()))?;
        debug!(name, keys = Key::ALL.len(), "uinput_device_created");
        Ok(Self {
            device: Mutex::new(device),
        })
    }
}

impl Poster for UinputPoster {
    fn post(&self, keys: &[Key], down: bool) -> Result<()> {
        let value = if down { KEY_DOWN } else { KEY_UP };
        let events: Vec<InputEvent> = keys
            .iter()
            .map(|k| InputEvent::new(EventType::KEY, k.code(), value))
            .collect();
        trace!(?keys, down, "uinput_emit");
        self.device
            .lock()
            .emit(&events)
            .map_err(|e| Error::Emit(e.to_string()))
    }
}
