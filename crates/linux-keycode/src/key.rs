use std::{fmt, str::FromStr};

/// Declares the `Key` enum together with its code and name tables.
///
/// Each row is `Variant = code => "NAME"`, where `code` is the kernel key
/// code and `NAME` the canonical (upper case) spelling.
macro_rules! define_keys {
    ( $( $variant:ident = $code:literal => $name:literal, )* ) => {
        /// A keyboard key identified by its Linux input-event code.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u16)]
        pub enum Key {
            $(
                #[allow(missing_docs)]
                $variant = $code,
            )*
        }

        impl Key {
            /// Every key known to this crate, in code order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Returns the kernel key code.
            pub const fn code(self) -> u16 {
                self as u16
            }

            /// Returns the canonical upper case name (e.g. `LEFTBRACE`).
            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Looks up a key by its canonical name, ignoring ASCII case.
            pub fn from_name(s: &str) -> Option<Self> {
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Some(Self::$variant);
                    }
                )*
                None
            }

            /// Looks up a key by its kernel code.
            pub const fn from_code(code: u16) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

define_keys! {
    Esc = 1 => "ESC",
    Digit1 = 2 => "1",
    Digit2 = 3 => "2",
    Digit3 = 4 => "3",
    Digit4 = 5 => "4",
    Digit5 = 6 => "5",
    Digit6 = 7 => "6",
    Digit7 = 8 => "7",
    Digit8 = 9 => "8",
    Digit9 = 10 => "9",
    Digit0 = 11 => "0",
    Minus = 12 => "MINUS",
    Equal = 13 => "EQUAL",
    Backspace = 14 => "BACKSPACE",
    Tab = 15 => "TAB",
    Q = 16 => "Q",
    W = 17 => "W",
    E = 18 => "E",
    R = 19 => "R",
    T = 20 => "T",
    Y = 21 => "Y",
    U = 22 => "U",
    I = 23 => "I",
    O = 24 => "O",
    P = 25 => "P",
    LeftBrace = 26 => "LEFTBRACE",
    RightBrace = 27 => "RIGHTBRACE",
    Enter = 28 => "ENTER",
    LeftCtrl = 29 => "LEFTCTRL",
    A = 30 => "A",
    S = 31 => "S",
    D = 32 => "D",
    F = 33 => "F",
    G = 34 => "G",
    H = 35 => "H",
    J = 36 => "J",
    K = 37 => "K",
    L = 38 => "L",
    Semicolon = 39 => "SEMICOLON",
    Apostrophe = 40 => "APOSTROPHE",
    Grave = 41 => "GRAVE",
    LeftShift = 42 => "LEFTSHIFT",
    Backslash = 43 => "BACKSLASH",
    Z = 44 => "Z",
    X = 45 => "X",
    C = 46 => "C",
    V = 47 => "V",
    B = 48 => "B",
    N = 49 => "N",
    M = 50 => "M",
    Comma = 51 => "COMMA",
    Dot = 52 => "DOT",
    Slash = 53 => "SLASH",
    RightShift = 54 => "RIGHTSHIFT",
    KpAsterisk = 55 => "KPASTERISK",
    LeftAlt = 56 => "LEFTALT",
    Space = 57 => "SPACE",
    CapsLock = 58 => "CAPSLOCK",
    F1 = 59 => "F1",
    F2 = 60 => "F2",
    F3 = 61 => "F3",
    F4 = 62 => "F4",
    F5 = 63 => "F5",
    F6 = 64 => "F6",
    F7 = 65 => "F7",
    F8 = 66 => "F8",
    F9 = 67 => "F9",
    F10 = 68 => "F10",
    NumLock = 69 => "NUMLOCK",
    ScrollLock = 70 => "SCROLLLOCK",
    Kp7 = 71 => "KP7",
    Kp8 = 72 => "KP8",
    Kp9 = 73 => "KP9",
    KpMinus = 74 => "KPMINUS",
    Kp4 = 75 => "KP4",
    Kp5 = 76 => "KP5",
    Kp6 = 77 => "KP6",
    KpPlus = 78 => "KPPLUS",
    Kp1 = 79 => "KP1",
    Kp2 = 80 => "KP2",
    Kp3 = 81 => "KP3",
    Kp0 = 82 => "KP0",
    KpDot = 83 => "KPDOT",
    F11 = 87 => "F11",
    F12 = 88 => "F12",
    KpEnter = 96 => "KPENTER",
    RightCtrl = 97 => "RIGHTCTRL",
    KpSlash = 98 => "KPSLASH",
    SysRq = 99 => "SYSRQ",
    RightAlt = 100 => "RIGHTALT",
    Home = 102 => "HOME",
    Up = 103 => "UP",
    PageUp = 104 => "PAGEUP",
    Left = 105 => "LEFT",
    Right = 106 => "RIGHT",
    End = 107 => "END",
    Down = 108 => "DOWN",
    PageDown = 109 => "PAGEDOWN",
    Insert = 110 => "INSERT",
    Delete = 111 => "DELETE",
    Pause = 119 => "PAUSE",
    LeftMeta = 125 => "LEFTMETA",
    RightMeta = 126 => "RIGHTMETA",
    F13 = 183 => "F13",
    F14 = 184 => "F14",
    F15 = 185 => "F15",
    F16 = 186 => "F16",
    F17 = 187 => "F17",
    F18 = 188 => "F18",
    F19 = 189 => "F19",
    F20 = 190 => "F20",
    F21 = 191 => "F21",
    F22 = 192 => "F22",
    F23 = 193 => "F23",
    F24 = 194 => "F24",
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_spec(s).ok_or_else(|| s.to_string())
    }
}
