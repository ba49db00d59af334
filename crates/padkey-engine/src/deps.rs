//! Collaborator traits the engine reports to.

/// Sink for engine state changes, e.g. an on-screen overlay.
///
/// Every call is fire-and-forget: implementations must not block the engine
/// and handle their own failures.
pub trait Telemetry: Send + Sync {
    /// Output keys were pressed or released.
    fn key_state(&self, keys: &[&'static str], pressed: bool);

    /// A trigger on `channel`/`note` was bound to `keys` (comma-joined names).
    fn binding(&self, _channel: u8, _note: u8, _keys: &str) {}

    /// A trigger on `channel`/`note` was received.
    fn trigger(&self, _channel: u8, _note: u8) {}
}

/// Telemetry sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn key_state(&self, _keys: &[&'static str], _pressed: bool) {}
}
