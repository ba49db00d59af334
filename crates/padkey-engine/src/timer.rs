//! One-shot release timers for output key actions.
//!
//! Each action has at most one armed timer; arming again replaces it. An
//! expired timer does not touch key state itself. It posts a [`TimerFired`]
//! into the engine's bounded queue and the engine applies it, so all key
//! state changes happen on the engine's task.
//!
//! Every arm gets a fresh generation number. A message whose generation is
//! no longer the armed one (the timer was re-armed or disarmed after it
//! fired) is stale and ignored.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::key_action::ActionId;

/// Upper bound on waiting for a cancelled timer task to exit.
pub const STOP_WAIT_TIMEOUT_MS: u64 = 50;

/// Default capacity of the timer queue.
pub const TIMER_QUEUE_SIZE: usize = 64;

/// What the engine does when a timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Release the action's keys.
    Release,
    /// Press the action's keys, then arm a release after `hold`.
    Press {
        /// How long the keys stay down after the press.
        hold: Duration,
    },
}

/// Message posted by an expired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Action the timer belongs to.
    pub action: ActionId,
    /// Generation of the arm that produced this message.
    pub generation: u64,
    /// What to do.
    pub expiry: Expiry,
}

/// A running timer task.
struct TimerEntry {
    /// Generation of this arm.
    generation: u64,
    /// Cancels the sleep or a pending send.
    token: CancellationToken,
    /// Task handle, awaited on shutdown.
    handle: JoinHandle<()>,
}

/// Timer table keyed by action.
#[derive(Clone)]
pub struct Timers {
    /// Armed timers. An entry stays until it is replaced, stopped, or
    /// claimed by the engine with [`Timers::finish`].
    entries: Arc<Mutex<HashMap<ActionId, TimerEntry>>>,
    /// Source of generation numbers.
    next_generation: Arc<AtomicU64>,
    /// Engine timer queue.
    tx: mpsc::Sender<TimerFired>,
}

impl Timers {
    /// Create a timer table posting into `tx`.
    pub fn new(tx: mpsc::Sender<TimerFired>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            tx,
        }
    }

    /// Arm (or re-arm) the timer for `id`. Must be called inside a Tokio runtime.
    pub fn start(&self, id: ActionId, delay: Duration, expiry: Expiry) {
        self.stop(id);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let cancel = token.clone();
        let tx = self.tx.clone();

        let fut = async move {
            tokio::select! {
                _ = time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    trace!(action = %id, generation, "timer_cancelled");
                    return;
                }
            }
            let msg = TimerFired {
                action: id,
                generation,
                expiry,
            };
            // A full queue must not keep a cancelled timer alive.
            tokio::select! {
                res = tx.send(msg) => {
                    if res.is_err() {
                        trace!(action = %id, "timer_queue_closed");
                    }
                }
                _ = cancel.cancelled() => {
                    trace!(action = %id, generation, "timer_cancelled_pending");
                }
            }
        };

        let handle = tokio::spawn(fut);
        trace!(action = %id, generation, delay_ms = delay.as_millis(), ?expiry, "timer_armed");
        self.entries.lock().insert(
            id,
            TimerEntry {
                generation,
                token,
                handle,
            },
        );
    }

    /// Disarm the timer for `id`, if any (non-blocking).
    pub fn stop(&self, id: ActionId) {
        if let Some(entry) = self.entries.lock().remove(&id) {
            entry.token.cancel();
            trace!(action = %id, generation = entry.generation, "timer_stop");
        }
    }

    /// Disarm the timer for `id` and wait briefly for its task to exit.
    pub async fn stop_async(&self, id: ActionId) {
        let entry = self.entries.lock().remove(&id);
        if let Some(entry) = entry {
            entry.token.cancel();
            let _ = timeout(Duration::from_millis(STOP_WAIT_TIMEOUT_MS), entry.handle).await;
            trace!(action = %id, "timer_stop_async");
        }
    }

    /// Claim a fired message. Returns `true` if `generation` is the armed
    /// one, removing the entry; `false` for stale messages.
    pub fn finish(&self, id: ActionId, generation: u64) -> bool {
        let mut entries = self.entries.lock();
        let current = entries.get(&id).is_some_and(|e| e.generation == generation);
        if current {
            entries.remove(&id);
        }
        current
    }

    /// Cancel every timer and wait for the tasks to finish.
    pub async fn clear_async(&self) {
        let entries: Vec<TimerEntry> = {
            let mut map = self.entries.lock();
            map.drain().map(|(_, e)| e).collect()
        };
        for e in &entries {
            e.token.cancel();
        }
        for e in entries {
            let _ = timeout(Duration::from_millis(STOP_WAIT_TIMEOUT_MS), e.handle).await;
        }
        trace!("timers_cleared");
    }
}
