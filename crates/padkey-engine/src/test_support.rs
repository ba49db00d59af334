//! Test support utilities for padkey-engine integration tests.
//! Built only for tests and the `test-utils` feature.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{
    sync::mpsc,
    task::{JoinHandle, yield_now},
    time::Instant,
};

use crate::{Engine, Telemetry, TriggerEvent};

/// Queue capacity used by [`spawn_engine`].
pub const TEST_EVENT_QUEUE: usize = 64;

/// One recorded telemetry call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryCall {
    /// `key_state` with comma-joined key names.
    KeyState(String, bool),
    /// `binding`.
    Binding(u8, u8, String),
    /// `trigger`.
    Trigger(u8, u8),
}

/// Telemetry sink that records every call.
#[derive(Default)]
pub struct RecordingTelemetry {
    /// Calls in order.
    calls: Mutex<Vec<TelemetryCall>>,
}

impl RecordingTelemetry {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<TelemetryCall> {
        self.calls.lock().clone()
    }
}

impl Telemetry for RecordingTelemetry {
    fn key_state(&self, keys: &[&'static str], pressed: bool) {
        self.calls
            .lock()
            .push(TelemetryCall::KeyState(keys.join(","), pressed));
    }

    fn binding(&self, channel: u8, note: u8, keys: &str) {
        self.calls
            .lock()
            .push(TelemetryCall::Binding(channel, note, keys.to_string()));
    }

    fn trigger(&self, channel: u8, note: u8) {
        self.calls.lock().push(TelemetryCall::Trigger(channel, note));
    }
}

/// Millisecond timestamps that follow the Tokio clock, so event timestamps
/// and release timers agree under paused time.
#[derive(Debug, Clone, Copy)]
pub struct TestClock {
    /// Reading taken at creation; timestamps count from here.
    base: Instant,
    /// Added to every timestamp so the first hit is not at zero.
    offset_ms: i64,
}

impl TestClock {
    /// Start counting now.
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_ms: 10_000,
        }
    }

    /// Current timestamp in milliseconds.
    pub fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.base.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.offset_ms.saturating_add(elapsed)
    }

    /// A NoteOn hit stamped now.
    pub fn hit(&self, channel: u8, key: u8, velocity: u8) -> TriggerEvent {
        TriggerEvent::note_on(channel, key, velocity, self.now_ms())
    }

    /// A NoteOff stamped now.
    pub fn off(&self, channel: u8, key: u8) -> TriggerEvent {
        TriggerEvent::note_off(channel, key, self.now_ms())
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn `engine` on the current runtime and return its event sender.
pub fn spawn_engine(engine: Engine) -> (mpsc::Sender<TriggerEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(TEST_EVENT_QUEUE);
    let handle = tokio::spawn(engine.run(rx));
    (tx, handle)
}

/// Yield enough times for the engine task to drain queued events and
/// timer messages without advancing the clock.
pub async fn settle() {
    for _ in 0..16 {
        yield_now().await;
    }
}

/// Send `ev` and let the engine process it.
pub async fn send(tx: &mpsc::Sender<TriggerEvent>, ev: TriggerEvent) {
    if tx.send(ev).await.is_err() {
        return;
    }
    settle().await;
}

/// Shared telemetry recorder as both concrete and trait handles.
pub fn recording_telemetry() -> (Arc<RecordingTelemetry>, Arc<dyn Telemetry>) {
    let rec = Arc::new(RecordingTelemetry::new());
    let dyn_rec: Arc<dyn Telemetry> = rec.clone();
    (rec, dyn_rec)
}
