use crate::Key;

/// Alias words accepted when parsing specs (never emitted by `to_spec`).
macro_rules! key_spec_aliases {
    ($m:ident, $arg:expr) => {
        $m! { $arg,
            // modifiers
            LeftCtrl => "ctrl",
            LeftCtrl => "control",
            LeftShift => "shift",
            LeftAlt => "alt",
            RightAlt => "altgr",
            LeftMeta => "meta",
            LeftMeta => "super",

            // enter/delete variants
            Enter => "return",
            Enter => "ret",
            Esc => "escape",
            Delete => "del",
            Backspace => "bksp",

            // punctuation words
            Dot => "period",
            Apostrophe => "quote",
            LeftBrace => "lbrace",
            RightBrace => "rbrace",

            // navigation
            PageUp => "pgup",
            PageDown => "pgdn",
        }
    };
}

macro_rules! from_spec_match {
    ( $s:expr, $( $k:ident => $v:expr, )* ) => {{
        match $s {
            $( $v => Some(Key::$k), )*
            _ => None,
        }
    }}
}

/// Parses a key specification into a `Key`.
///
/// Tries the canonical name first (case-insensitive), then the alias words.
pub fn from_spec(s: &str) -> Option<Key> {
    let trimmed = s.trim();
    if let Some(k) = Key::from_name(trimmed) {
        return Some(k);
    }
    let lowered = trimmed.to_ascii_lowercase();
    key_spec_aliases!(from_spec_match, lowered.as_str())
}

impl Key {
    /// Parses a key specification string into a `Key`.
    ///
    /// Accepts canonical names in any case (`space`, `KP0`, `leftbrace`) and
    /// the alias words `ctrl`, `shift`, `alt`, `altgr`, `meta`, `super`,
    /// `return`, `escape`, `del`, `bksp`, `period`, `quote`, `lbrace`,
    /// `rbrace`, `pgup` and `pgdn`. Returns `None` if nothing matches.
    pub fn from_spec(s: &str) -> Option<Self> {
        from_spec(s)
    }

    /// Returns the spec string for this key, which is its canonical name.
    pub fn to_spec(self) -> &'static str {
        self.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_roundtrip() {
        for key in Key::ALL {
            assert_eq!(from_spec(key.to_spec()), Some(*key));
        }
    }

    #[test]
    fn aliases() {
        assert_eq!(from_spec("ctrl"), Some(Key::LeftCtrl));
        assert_eq!(from_spec("Shift"), Some(Key::LeftShift));
        assert_eq!(from_spec("RETURN"), Some(Key::Enter));
        assert_eq!(from_spec("pgdn"), Some(Key::PageDown));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(from_spec(" a "), Some(Key::A));
        assert_eq!(from_spec(""), None);
    }
}
