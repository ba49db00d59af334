//! Trigger events and their identities.

use std::fmt;

/// Largest velocity a controller reports; velocity scaling divides by this.
pub const MAX_VELOCITY: u8 = 128;

/// Status byte nibble of a NoteOn message.
const STATUS_NOTE_ON: u8 = 0x90;
/// Status byte nibble of a NoteOff message.
const STATUS_NOTE_OFF: u8 = 0x80;

/// Recognized trigger event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// NoteOn (`0x9n`) with a non-zero velocity.
    NoteOn,
    /// NoteOff (`0x8n`), or NoteOn with velocity 0.
    NoteOff,
    /// Anything else.
    Unknown,
}

impl EventType {
    /// Status nibble used in trigger identities.
    pub const fn status(self) -> u8 {
        match self {
            Self::NoteOn => STATUS_NOTE_ON,
            Self::NoteOff => STATUS_NOTE_OFF,
            Self::Unknown => 0x00,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoteOn => "note_on",
            Self::NoteOff => "note_off",
            Self::Unknown => "unknown",
        })
    }
}

/// Identity a handler is registered under: `[status | channel, key]`.
///
/// Velocity is not part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Trigger([u8; 2]);

impl Trigger {
    /// Build the identity of `kind` events on `channel` for `key`.
    pub const fn new(kind: EventType, channel: u8, key: u8) -> Self {
        Self([kind.status() | (channel & 0x0f), key])
    }

    /// NoteOn identity, the kind every configured binding uses.
    pub const fn note_on(channel: u8, key: u8) -> Self {
        Self::new(EventType::NoteOn, channel, key)
    }

    /// Identity taken from the first two bytes of a raw message.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [status, key, ..] => Some(Self([*status, *key])),
            _ => None,
        }
    }

    /// Same kind and channel, different key.
    pub const fn with_key(self, key: u8) -> Self {
        Self([self.0[0], key])
    }

    /// Raw identity bytes.
    pub const fn bytes(self) -> [u8; 2] {
        self.0
    }

    /// Event kind encoded in the status nibble.
    pub const fn kind(self) -> EventType {
        match self.0[0] & 0xf0 {
            STATUS_NOTE_ON => EventType::NoteOn,
            STATUS_NOTE_OFF => EventType::NoteOff,
            _ => EventType::Unknown,
        }
    }

    /// MIDI channel, 0..=15.
    pub const fn channel(self) -> u8 {
        self.0[0] & 0x0f
    }

    /// Note number.
    pub const fn key(self) -> u8 {
        self.0[1]
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}", self.0[0], self.0[1])
    }
}

/// One timestamped event from the trigger source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Raw message bytes as received.
    pub source: Vec<u8>,
    /// Source timestamp in milliseconds.
    pub timestamp_ms: i64,
    /// Decoded kind.
    pub kind: EventType,
    /// MIDI channel, 0..=15.
    pub channel: u8,
    /// Note number.
    pub key: u8,
    /// Hit strength.
    pub velocity: u8,
}

impl TriggerEvent {
    /// Decode a raw MIDI message received at `timestamp_ms`.
    ///
    /// NoteOn with velocity 0 decodes as NoteOff, as most drum modules send
    /// it that way. Anything that is not a note message is `Unknown`.
    pub fn decode(timestamp_ms: i64, bytes: &[u8]) -> Self {
        let (kind, channel, key, velocity) = match bytes {
            [status, key, velocity, ..] => {
                let channel = status & 0x0f;
                match status & 0xf0 {
                    STATUS_NOTE_ON if *velocity > 0 => {
                        (EventType::NoteOn, channel, *key, *velocity)
                    }
                    STATUS_NOTE_ON | STATUS_NOTE_OFF => {
                        (EventType::NoteOff, channel, *key, *velocity)
                    }
                    _ => (EventType::Unknown, 0, 0, 0),
                }
            }
            _ => (EventType::Unknown, 0, 0, 0),
        };
        Self {
            source: bytes.to_vec(),
            timestamp_ms,
            kind,
            channel,
            key,
            velocity,
        }
    }

    /// A NoteOn event, as a drum pad hit produces it.
    pub fn note_on(channel: u8, key: u8, velocity: u8, timestamp_ms: i64) -> Self {
        Self::decode(
            timestamp_ms,
            &[STATUS_NOTE_ON | (channel & 0x0f), key, velocity],
        )
    }

    /// A NoteOff event.
    pub fn note_off(channel: u8, key: u8, timestamp_ms: i64) -> Self {
        Self::decode(timestamp_ms, &[STATUS_NOTE_OFF | (channel & 0x0f), key, 0])
    }

    /// Identity of this event; `None` for messages shorter than two bytes.
    ///
    /// Note messages take the decoded kind, so a silent NoteOn matches
    /// NoteOff bindings. Other messages keep their raw status byte.
    pub fn trigger(&self) -> Option<Trigger> {
        match self.kind {
            EventType::NoteOn | EventType::NoteOff => {
                Some(Trigger::new(self.kind, self.channel, self.key))
            }
            EventType::Unknown => Trigger::from_bytes(&self.source),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>12}ms: ", self.timestamp_ms)?;
        for b in &self.source {
            write!(f, "{b:02x}")?;
        }
        write!(
            f,
            " {} ch={} key={} vel={}",
            self.kind, self.channel, self.key, self.velocity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_note_messages() {
        let on = TriggerEvent::decode(5, &[0x99, 38, 100]);
        assert_eq!(on.kind, EventType::NoteOn);
        assert_eq!((on.channel, on.key, on.velocity), (9, 38, 100));
        assert_eq!(on.trigger(), Some(Trigger::note_on(9, 38)));

        let off = TriggerEvent::decode(6, &[0x89, 38, 64]);
        assert_eq!(off.kind, EventType::NoteOff);

        assert_eq!(off.trigger(), Some(Trigger::new(EventType::NoteOff, 9, 38)));

        let silent = TriggerEvent::decode(7, &[0x99, 38, 0]);
        assert_eq!(silent.kind, EventType::NoteOff);
        assert_eq!(silent.trigger(), off.trigger());
        assert_ne!(silent.trigger(), Some(Trigger::note_on(9, 38)));
    }

    #[test]
    fn decode_other_messages() {
        let cc = TriggerEvent::decode(0, &[0xb0, 7, 100]);
        assert_eq!(cc.kind, EventType::Unknown);
        assert_eq!(cc.trigger().map(Trigger::bytes), Some([0xb0, 7]));

        let clock = TriggerEvent::decode(0, &[0xf8]);
        assert_eq!(clock.kind, EventType::Unknown);
        assert_eq!(clock.trigger(), None);
    }

    #[test]
    fn trigger_identity_layout() {
        let t = Trigger::new(EventType::NoteOn, 1, 2);
        assert_eq!(t.bytes(), [0x91, 0x02]);
        assert_eq!(t.kind(), EventType::NoteOn);
        assert_eq!(t.channel(), 1);
        assert_eq!(t.with_key(7).key(), 7);
        assert_eq!(t.to_string(), "0x9102");
        assert_eq!(Trigger::new(EventType::NoteOff, 3, 4).bytes(), [0x83, 4]);
        assert_eq!(Trigger::new(EventType::Unknown, 3, 4).bytes(), [0x03, 4]);
    }
}
