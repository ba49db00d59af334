//! linux-keycode: Key codes and key specs for Linux input devices.
//!
//! - `Key`: Enum of the keyboard keys that can be injected, assigned the
//!   exact codes from `linux/input-event-codes.h`.
//! - Spec helpers: `Key::from_spec` and `Key::to_spec` accept upper or
//!   lower case names plus a handful of aliases (ctrl, shift, esc, ...).
//! - `Combo`: up to four keys pressed and released together, with an
//!   order-independent identity used to share state between bindings.
//!
//! Key names follow the kernel's `KEY_*` constants with the prefix removed,
//! so `KEY_LEFTBRACE` is spelled `LEFTBRACE` and `KEY_1` is spelled `1`.

mod key;
pub use key::Key;

mod spec;

mod combo;
pub use combo::{Combo, ComboError, ComboId, MAX_COMBO_KEYS};
