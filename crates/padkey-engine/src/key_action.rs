use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use keyinject::KeyInjector;
use linux_keycode::{Combo, ComboId};
use tracing::{debug, trace, warn};

use crate::{
    deps::Telemetry,
    timer::{Expiry, Timers},
};

/// Index of an output key action in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(usize);

impl ActionId {
    /// Wrap an arena index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Arena index.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Side effect run after every release.
pub type ReleaseHook = Box<dyn FnMut(&Combo) + Send>;

/// Shared collaborators every action reports to.
#[derive(Clone)]
pub struct Outputs {
    /// Where presses and releases go.
    pub injector: Arc<dyn KeyInjector>,
    /// Where state changes are reported.
    pub telemetry: Arc<dyn Telemetry>,
    /// Release timers.
    pub timers: Timers,
}

/// Press/release state of one distinct set of output keys.
pub struct OutputKeyAction {
    /// Arena index, also the timer key.
    id: ActionId,
    /// Keys in press order.
    combo: Combo,
    /// Key names, cached for telemetry.
    names: Vec<&'static str>,
    /// Whether the keys are currently held.
    pressed: bool,
    /// Set by `shutdown`; no timer is armed afterwards.
    closed: bool,
    /// Optional side effect after each release.
    on_release: Option<ReleaseHook>,
    /// Injector, telemetry and timers.
    outputs: Outputs,
}

impl OutputKeyAction {
    /// New released action.
    fn new(id: ActionId, combo: Combo, outputs: Outputs) -> Self {
        let names = combo.names();
        Self {
            id,
            combo,
            names,
            pressed: false,
            closed: false,
            on_release: None,
            outputs,
        }
    }

    /// Whether the keys are currently held.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Install the side effect run after every release.
    pub fn set_on_release(&mut self, hook: ReleaseHook) {
        self.on_release = Some(hook);
    }

    /// Press the keys. Pressing while already pressed presses again.
    pub fn press(&mut self) {
        self.pressed = true;
        if let Err(e) = self.outputs.injector.press(self.combo.keys()) {
            warn!(action = %self.id, keys = %self.combo, error = %e, "press_failed");
        }
        self.outputs.telemetry.key_state(&self.names, true);
        trace!(action = %self.id, keys = %self.combo, "action_pressed");
    }

    /// Arm the timer to release after `delay`, replacing any armed timer.
    pub fn schedule_release(&self, delay: Duration) {
        self.schedule(delay, Expiry::Release);
    }

    /// Arm the timer with an arbitrary expiry, replacing any armed timer.
    pub fn schedule(&self, delay: Duration, expiry: Expiry) {
        if self.closed {
            return;
        }
        self.outputs.timers.start(self.id, delay, expiry);
    }

    /// Disarm the timer without touching the keys.
    pub fn disarm(&self) {
        self.outputs.timers.stop(self.id);
    }

    /// Release the keys and run the release hook.
    pub fn release(&mut self) {
        self.pressed = false;
        if let Err(e) = self.outputs.injector.release(self.combo.keys()) {
            warn!(action = %self.id, keys = %self.combo, error = %e, "release_failed");
        }
        self.outputs.telemetry.key_state(&self.names, false);
        trace!(action = %self.id, keys = %self.combo, "action_released");
        if let Some(hook) = self.on_release.as_mut() {
            hook(&self.combo);
        }
    }

    /// Disarm, then release.
    pub fn cancel_and_release(&mut self) {
        self.disarm();
        self.release();
    }

    /// Disarm for good, wait for the timer task, and force a final release.
    pub async fn shutdown(&mut self) {
        self.closed = true;
        self.outputs.timers.stop_async(self.id).await;
        self.release();
        debug!(action = %self.id, keys = %self.combo, "action_shutdown");
    }

    /// Apply an expired timer.
    pub fn expire(&mut self, expiry: Expiry) {
        match expiry {
            Expiry::Release => self.release(),
            Expiry::Press { hold } => {
                self.press();
                self.schedule_release(hold);
            }
        }
    }
}

/// All output key actions, deduplicated by combo identity.
pub struct ActionArena {
    /// Actions in creation order; `ActionId` indexes this.
    actions: Vec<OutputKeyAction>,
    /// Combo identity to action.
    by_combo: HashMap<ComboId, ActionId>,
    /// Handed to every new action.
    outputs: Outputs,
}

impl ActionArena {
    /// Empty arena.
    pub fn new(outputs: Outputs) -> Self {
        Self {
            actions: Vec::new(),
            by_combo: HashMap::new(),
            outputs,
        }
    }

    /// Action for `combo`, created on first use. Combos with the same keys
    /// in any order share one action.
    pub fn get_or_create(&mut self, combo: &Combo) -> ActionId {
        let key = combo.id();
        if let Some(id) = self.by_combo.get(&key) {
            return *id;
        }
        let id = ActionId::new(self.actions.len());
        self.actions
            .push(OutputKeyAction::new(id, combo.clone(), self.outputs.clone()));
        self.by_combo.insert(key, id);
        debug!(action = %id, keys = %combo, "action_created");
        id
    }

    /// Look up an action mutably.
    pub fn get_mut(&mut self, id: ActionId) -> Option<&mut OutputKeyAction> {
        self.actions.get_mut(id.index())
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Shut down every action, forcing a final release of each.
    pub async fn shutdown_all(&mut self) {
        for action in &mut self.actions {
            action.shutdown().await;
        }
        self.outputs.timers.clear_async().await;
    }
}

#[cfg(test)]
mod tests {
    use keyinject::NullInjector;
    use linux_keycode::Key;
    use tokio::sync::mpsc;

    use super::*;
    use crate::deps::NoopTelemetry;

    fn arena() -> ActionArena {
        let (tx, _rx) = mpsc::channel(4);
        ActionArena::new(Outputs {
            injector: Arc::new(NullInjector),
            telemetry: Arc::new(NoopTelemetry),
            timers: Timers::new(tx),
        })
    }

    #[test]
    fn combos_share_actions_by_identity() {
        let mut a = arena();
        let ctrl_z = Combo::new([Key::LeftCtrl, Key::Z]).expect("combo");
        let z_ctrl = Combo::new([Key::Z, Key::LeftCtrl]).expect("combo");
        let first = a.get_or_create(&ctrl_z);
        assert_eq!(a.get_or_create(&z_ctrl), first);
        assert_ne!(a.get_or_create(&Combo::single(Key::Z)), first);
        assert_eq!(a.len(), 2);
        // Press order comes from the first registration.
        let action = a.get_mut(first).expect("action");
        assert_eq!(action.combo.keys(), &[Key::LeftCtrl, Key::Z]);
    }

    #[test]
    fn release_runs_hook() {
        let mut a = arena();
        let id = a.get_or_create(&Combo::single(Key::A));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let action = a.get_mut(id).expect("action");
        action.set_on_release(Box::new(move |c| {
            let _ = tx.send(c.to_string());
        }));
        action.press();
        assert!(action.is_pressed());
        action.release();
        assert!(!action.is_pressed());
        assert_eq!(rx.try_recv().ok().as_deref(), Some("A"));
    }
}
