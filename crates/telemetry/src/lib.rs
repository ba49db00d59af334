//! Batching HTTP telemetry for padkey.
//!
//! [`HttpTelemetry`] implements the engine's [`Telemetry`] sink. Updates are
//! queued without blocking the engine and folded into a [`Snapshot`] by a
//! background task, which POSTs the whole document as JSON to the overlay
//! endpoint at most every [`FLUSH_INTERVAL`], and only when something changed.
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use padkey_engine::Telemetry;
use parking_lot::Mutex;
use reqwest::{Client, header::CONTENT_TYPE};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
    time::{self, MissedTickBehavior, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

mod snapshot;

pub use snapshot::{Snapshot, Update, trigger_key};

/// Updates that may wait for the background task before new ones are dropped.
pub const QUEUE_SIZE: usize = 10;

/// How often a changed snapshot is posted.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(50);

/// Default overlay endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/ram_store/drums";

/// Upper bound on waiting for the background tasks on close.
const CLOSE_TIMEOUT_MS: u64 = 500;

/// Current wall clock time in Unix milliseconds.
fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Posts encoded snapshots to the endpoint, one at a time.
struct Poster {
    /// HTTP client.
    client: Client,
    /// Target URL.
    endpoint: String,
}

impl Poster {
    /// POST one body, logging failures.
    async fn post(&self, body: Vec<u8>) {
        let res = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;
        match res {
            Ok(resp) if resp.status().is_success() => {
                trace!(status = %resp.status(), "telemetry_posted");
            }
            Ok(resp) => {
                warn!(endpoint = %self.endpoint, status = %resp.status(), "telemetry_rejected");
            }
            Err(e) => warn!(endpoint = %self.endpoint, error = %e, "telemetry_send_failed"),
        }
    }

    /// Drain encoded bodies until the channel closes.
    async fn run(self, mut rx: mpsc::Receiver<Vec<u8>>) {
        while let Some(body) = rx.recv().await {
            self.post(body).await;
        }
    }
}

/// Fold updates and hand changed snapshots to the poster.
async fn collect(
    mut updates: mpsc::Receiver<Update>,
    bodies: Option<mpsc::Sender<Vec<u8>>>,
    cancel: CancellationToken,
) {
    let mut snapshot = Snapshot::default();
    let mut dirty = false;
    let mut tick = time::interval(FLUSH_INTERVAL);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        // Queued updates are folded before a flush.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            update = updates.recv() => match update {
                Some(update) => {
                    snapshot.apply(update, unix_ms());
                    dirty = true;
                }
                None => break,
            },
            _ = tick.tick() => {
                let Some(tx) = bodies.as_ref() else {
                    continue;
                };
                if !dirty {
                    continue;
                }
                let body = match snapshot.encode() {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(error = %e, "telemetry_encode_failed");
                        continue;
                    }
                };
                // A busy poster keeps the snapshot dirty for the next tick.
                match tx.try_send(body) {
                    Ok(()) => dirty = false,
                    Err(TrySendError::Full(_)) => trace!("telemetry_poster_busy"),
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        }
    }
    // Final state, so the overlay sees keys released at shutdown.
    while let Ok(update) = updates.try_recv() {
        snapshot.apply(update, unix_ms());
        dirty = true;
    }
    if dirty
        && let Some(tx) = bodies.as_ref()
        && let Ok(body) = snapshot.encode()
        && tx.send(body).await.is_err()
    {
        trace!("telemetry_final_flush_dropped");
    }
    debug!("telemetry_stopped");
}

/// Telemetry sink posting state snapshots to an HTTP endpoint.
pub struct HttpTelemetry {
    /// Update queue.
    tx: mpsc::Sender<Update>,
    /// Stops the collector.
    cancel: CancellationToken,
    /// Background tasks, awaited on close.
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Updates dropped because the queue was full.
    dropped: Arc<AtomicU64>,
}

impl HttpTelemetry {
    /// Start the background tasks. With no endpoint, updates are still
    /// folded but never posted. Must be called inside a Tokio runtime.
    pub fn spawn(endpoint: Option<&str>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let bodies = endpoint.filter(|e| !e.is_empty()).map(|endpoint| {
            let (body_tx, body_rx) = mpsc::channel(1);
            let poster = Poster {
                client: Client::new(),
                endpoint: endpoint.to_string(),
            };
            tasks.push(tokio::spawn(poster.run(body_rx)));
            debug!(endpoint, "telemetry_endpoint");
            body_tx
        });
        tasks.insert(0, tokio::spawn(collect(rx, bodies, cancel.clone())));
        Self {
            tx,
            cancel,
            tasks: Mutex::new(tasks),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of updates dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue an update without blocking.
    fn queue(&self, update: Update) {
        match self.tx.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(?update, dropped = n, "telemetry_dropped");
            }
            Err(TrySendError::Closed(_)) => trace!("telemetry_closed"),
        }
    }

    /// Stop the collector and wait briefly for pending posts to finish.
    pub async fn close(&self) {
        self.cancel.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = timeout(Duration::from_millis(CLOSE_TIMEOUT_MS), task).await;
        }
    }
}

impl Telemetry for HttpTelemetry {
    fn key_state(&self, keys: &[&'static str], pressed: bool) {
        self.queue(Update::Keys {
            names: keys.to_vec(),
            pressed,
        });
    }

    fn binding(&self, channel: u8, note: u8, keys: &str) {
        self.queue(Update::Binding {
            channel,
            note,
            keys: keys.to_string(),
        });
    }

    fn trigger(&self, channel: u8, note: u8) {
        self.queue(Update::Trigger { channel, note });
    }
}
