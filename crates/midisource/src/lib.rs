//! MIDI input for padkey.
//!
//! Opens a MIDI input port with `midir` and forwards every received message
//! as a decoded [`TriggerEvent`] into the engine's event channel. Dropping
//! or closing the [`MidiListener`] drops the channel sender, which ends the
//! engine's event stream.
use std::fmt;

use midir::{Ignore, MidiInput, MidiInputConnection};
use padkey_engine::TriggerEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

mod error;

pub use error::{Error, Result};

/// Client name registered with the MIDI system.
const CLIENT_NAME: &str = "padkey";

/// Connection name for the input port.
const CONNECTION_NAME: &str = "padkey-input";

/// An available MIDI input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Index to pass to [`listen`].
    pub port: usize,
    /// Name reported by the MIDI system.
    pub name: String,
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: port={}", self.name, self.port)
    }
}

/// New `midir` input accepting every message kind.
fn input() -> Result<MidiInput> {
    let mut input = MidiInput::new(CLIENT_NAME).map_err(|e| Error::Init(e.to_string()))?;
    input.ignore(Ignore::None);
    Ok(input)
}

/// List the available input ports.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let input = input()?;
    Ok(input
        .ports()
        .iter()
        .enumerate()
        .map(|(port, p)| PortInfo {
            port,
            name: input
                .port_name(p)
                .unwrap_or_else(|_| format!("Port {port}")),
        })
        .collect())
}

/// Converts a `midir` timestamp in microseconds to milliseconds.
pub fn timestamp_ms(stamp_us: u64) -> i64 {
    i64::try_from(stamp_us / 1000).unwrap_or(i64::MAX)
}

/// Decodes raw messages and pushes them into the event channel.
///
/// Runs on the MIDI system's callback thread, so it blocks while the
/// channel is full instead of dropping hits.
struct Forwarder {
    /// Engine event channel.
    tx: mpsc::Sender<TriggerEvent>,
}

impl Forwarder {
    /// Forward one message. Returns `false` once the receiver is gone.
    fn forward(&self, stamp_us: u64, message: &[u8]) -> bool {
        if message.is_empty() {
            return true;
        }
        let ev = TriggerEvent::decode(timestamp_ms(stamp_us), message);
        trace!(event = %ev, "midi_in");
        if self.tx.blocking_send(ev).is_err() {
            trace!("event_channel_closed");
            return false;
        }
        true
    }
}

/// An open input port. Events flow until it is closed or dropped.
pub struct MidiListener {
    /// Live connection; `None` once closed.
    conn: Option<MidiInputConnection<()>>,
    /// Port name, for logs.
    name: String,
}

impl MidiListener {
    /// Name of the connected port.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Disconnect from the port. The event channel closes once the
    /// callback is dropped.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
            info!(port = %self.name, "midi_closed");
        }
    }
}

impl Drop for MidiListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Open input port `port` and forward its messages into `tx`.
pub fn listen(port: usize, tx: mpsc::Sender<TriggerEvent>) -> Result<MidiListener> {
    let input = input()?;
    let ports = input.ports();
    let Some(p) = ports.get(port) else {
        return Err(Error::NoSuchPort {
            port,
            available: ports.len(),
        });
    };
    let name = input
        .port_name(p)
        .unwrap_or_else(|_| format!("Port {port}"));
    let forwarder = Forwarder { tx };
    let conn = input
        .connect(
            p,
            CONNECTION_NAME,
            move |stamp, message, _| {
                forwarder.forward(stamp, message);
            },
            (),
        )
        .map_err(|e| Error::Connect {
            port,
            message: e.to_string(),
        })?;
    info!(port = %name, index = port, "midi_listening");
    debug!(client = CLIENT_NAME, connection = CONNECTION_NAME, "midi_connection");
    Ok(MidiListener {
        conn: Some(conn),
        name,
    })
}
