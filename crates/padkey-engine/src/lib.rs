//! padkey engine
//!
//! Turns a stream of drum pad trigger events into synthetic key presses:
//! - matches each event against registered bindings (default set first,
//!   then the active named set)
//! - runs the binding's action: basic press, velocity-scaled press, toggle,
//!   hold-repeat, sequence-hold, or profile swap
//! - owns one press/release state and release timer per distinct key combo
//!
//! [`Engine::run`] is a single task. Trigger events and timer expiries are
//! multiplexed into it, so key state is only ever mutated there. When the
//! event stream closes, every key the engine may have pressed is released
//! and `run` returns.
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

mod actions;
mod deps;
mod error;
mod event;
mod key_action;
mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
mod timer;

use config::{ActionSpec, Binding, Entry};
use keyinject::KeyInjector;
use linux_keycode::{Combo, Key};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

pub use actions::{REPRESS_GRACE, RepeatTiming, hold_for_velocity};
pub use deps::{NoopTelemetry, Telemetry};
pub use error::{Error, Result};
pub use event::{EventType, MAX_VELOCITY, Trigger, TriggerEvent};
pub use timer::TIMER_QUEUE_SIZE;

use actions::Step;
use key_action::{ActionArena, ActionId, Outputs};
use registry::{Dispatch, Handler, Registry, Sequence, SequenceId};
use timer::{TimerFired, Timers};

/// Handler runs longer than this are logged.
const HANDLER_WARN_MS: u64 = 5;

/// Engine construction options.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// Log events that match no binding at `info`.
    pub log_unhandled: bool,
    /// Capacity of the timer queue.
    pub timer_queue_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            log_unhandled: false,
            timer_queue_size: TIMER_QUEUE_SIZE,
        }
    }
}

/// Sequence-hold registration.
#[derive(Debug, Clone)]
pub struct SequenceSpec {
    /// Trigger that presses the current group.
    pub trigger: Trigger,
    /// Key groups in order; at least one.
    pub groups: Vec<Vec<Key>>,
    /// Velocity threshold for every trigger of the sequence.
    pub threshold: u8,
    /// Repeat-hold timing of the press trigger.
    pub timing: RepeatTiming,
    /// Note that moves to the previous group (same kind and channel).
    pub prev: u8,
    /// Note that moves to the next group.
    pub next: u8,
    /// Note that returns to the first group.
    pub reset: u8,
}

/// The dispatch engine.
///
/// Register bindings (directly or through [`Engine::apply_config`]), then
/// hand the engine to [`Engine::run`] together with the event receiver.
pub struct Engine {
    /// Handlers by trigger identity.
    registry: Registry,
    /// Output key actions.
    actions: ActionArena,
    /// Sequence-hold state.
    sequences: Vec<Sequence>,
    /// Active named set.
    active: Option<String>,
    /// Injector, telemetry and timers.
    outputs: Outputs,
    /// Expired timers.
    timer_rx: mpsc::Receiver<TimerFired>,
    /// Log unmatched events.
    log_unhandled: bool,
}

impl Engine {
    /// Create an engine pressing keys through `injector`.
    pub fn new(
        injector: Arc<dyn KeyInjector>,
        telemetry: Arc<dyn Telemetry>,
        options: EngineOptions,
    ) -> Self {
        let (tx, timer_rx) = mpsc::channel(options.timer_queue_size.max(1));
        let outputs = Outputs {
            injector,
            telemetry,
            timers: Timers::new(tx),
        };
        Self {
            registry: Registry::new(),
            actions: ActionArena::new(outputs.clone()),
            sequences: Vec::new(),
            active: None,
            outputs,
            timer_rx,
            log_unhandled: options.log_unhandled,
        }
    }

    /// Install `handler` for `trigger` in the population target, replacing
    /// any earlier registration there.
    fn install(&mut self, trigger: Trigger, handler: Handler) {
        self.registry.remove(trigger);
        self.registry.insert(trigger, handler);
    }

    /// Output key action for `keys`, shared with any other registration of
    /// the same combo.
    fn action_for(&mut self, trigger: Trigger, keys: &[Key]) -> Result<ActionId> {
        let combo = Combo::new(keys.iter().copied())?;
        self.outputs
            .telemetry
            .binding(trigger.channel(), trigger.key(), &combo.to_string());
        Ok(self.actions.get_or_create(&combo))
    }

    /// Press `keys` on each hit above `threshold`; release after `release`.
    pub fn register_basic_press(
        &mut self,
        trigger: Trigger,
        keys: &[Key],
        threshold: u8,
        release: Duration,
    ) -> Result<()> {
        let action = self.action_for(trigger, keys)?;
        self.install(
            trigger,
            actions::basic_press(trigger.kind(), action, threshold, release),
        );
        Ok(())
    }

    /// Press `keys` for a time between `min_press` and `max_press`, scaled
    /// by velocity.
    pub fn register_velocity(
        &mut self,
        trigger: Trigger,
        keys: &[Key],
        threshold: u8,
        min_press: Duration,
        max_press: Duration,
    ) -> Result<()> {
        let action = self.action_for(trigger, keys)?;
        self.install(
            trigger,
            actions::velocity(trigger.kind(), action, threshold, min_press, max_press),
        );
        Ok(())
    }

    /// Toggle `keys` on each hit above `threshold`. Hits below
    /// `accept_threshold` tap for `quick_press` instead of latching.
    pub fn register_toggle(
        &mut self,
        trigger: Trigger,
        keys: &[Key],
        threshold: u8,
        accept_threshold: u8,
        quick_press: Duration,
    ) -> Result<()> {
        let action = self.action_for(trigger, keys)?;
        self.install(
            trigger,
            actions::toggle(trigger.kind(), action, threshold, accept_threshold, quick_press),
        );
        Ok(())
    }

    /// Hold `keys` while hits keep repeating within the timing window.
    pub fn register_hold_repeat(
        &mut self,
        trigger: Trigger,
        keys: &[Key],
        threshold: u8,
        timing: RepeatTiming,
    ) -> Result<()> {
        let action = self.action_for(trigger, keys)?;
        self.install(
            trigger,
            actions::hold_repeat(trigger.kind(), action, threshold, timing),
        );
        Ok(())
    }

    /// Hold-repeat over a cyclic list of key groups, with three navigation
    /// triggers sharing the press trigger's kind and channel.
    pub fn register_sequence_hold(&mut self, spec: SequenceSpec) -> Result<()> {
        if spec.groups.is_empty() {
            return Err(Error::EmptySequence);
        }
        let mut groups = Vec::with_capacity(spec.groups.len());
        for keys in &spec.groups {
            groups.push(self.action_for(spec.trigger, keys)?);
        }
        let seq = SequenceId::new(self.sequences.len());
        self.sequences.push(Sequence { groups, cur: 0 });

        let kind = spec.trigger.kind();
        self.install(
            spec.trigger,
            actions::sequence_hold(kind, seq, spec.threshold, spec.timing),
        );
        for (key, step) in [
            (spec.prev, Step::Prev),
            (spec.next, Step::Next),
            (spec.reset, Step::Reset),
        ] {
            self.install(
                spec.trigger.with_key(key),
                actions::sequence_step(kind, seq, spec.threshold, step),
            );
        }
        Ok(())
    }

    /// Cycle the active named set through `names` on each hit above `threshold`.
    pub fn register_profile_swap(
        &mut self,
        trigger: Trigger,
        threshold: u8,
        names: Vec<String>,
    ) -> Result<()> {
        if names.is_empty() {
            return Err(Error::EmptyProfileList);
        }
        self.install(
            trigger,
            actions::profile_swap(trigger.kind(), threshold, names),
        );
        Ok(())
    }

    /// Send subsequent registrations into named set `name`; `None` for the
    /// default set.
    pub fn select_population_target(&mut self, name: Option<&str>) {
        self.registry.select_target(name);
    }

    /// Named set receiving registrations.
    pub fn population_target(&self) -> Option<&str> {
        self.registry.target()
    }

    /// Make `name` the named set consulted after the default set; `None`
    /// consults the default set only.
    pub fn set_active_set(&mut self, name: Option<&str>) {
        self.active = name.map(str::to_string);
        debug!(profile = name.unwrap_or("default"), "active_set");
    }

    /// Active named set.
    pub fn active_set(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Run `hook` after every release of `keys`.
    pub fn on_release<F>(&mut self, keys: &[Key], hook: F) -> Result<()>
    where
        F: FnMut(&Combo) + Send + 'static,
    {
        let combo = Combo::new(keys.iter().copied())?;
        let id = self.actions.get_or_create(&combo);
        if let Some(action) = self.actions.get_mut(id) {
            action.set_on_release(Box::new(hook));
        }
        Ok(())
    }

    /// Number of installed handlers across all sets.
    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of distinct output key actions.
    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Register every entry of a parsed configuration, in order.
    pub fn apply_config(&mut self, cfg: &config::Config) -> Result<()> {
        for entry in &cfg.entries {
            match entry {
                Entry::Bind(binding) => self.apply_binding(binding)?,
                Entry::Profile(name) => self.select_population_target(name.as_deref()),
                Entry::Activate(name) => self.set_active_set(name.as_deref()),
                Entry::Swap(swap) => self.register_profile_swap(
                    Trigger::note_on(swap.channel, swap.note),
                    swap.threshold,
                    swap.names.clone(),
                )?,
            }
        }
        info!(
            handlers = self.handler_count(),
            actions = self.action_count(),
            "config_applied"
        );
        Ok(())
    }

    /// Register one configured binding.
    fn apply_binding(&mut self, b: &Binding) -> Result<()> {
        let trigger = Trigger::note_on(b.channel, b.note);
        let keys = b.combo.keys();
        debug!(
            %trigger,
            action = b.action.name(),
            keys = %b.combo,
            set = self.registry.target().unwrap_or("default"),
            "binding"
        );
        match &b.action {
            ActionSpec::Basic { release } => {
                self.register_basic_press(trigger, keys, b.threshold, *release)
            }
            ActionSpec::Velocity {
                min_press,
                max_press,
            } => self.register_velocity(trigger, keys, b.threshold, *min_press, *max_press),
            ActionSpec::Toggle {
                accept_threshold,
                quick_press,
            } => self.register_toggle(trigger, keys, b.threshold, *accept_threshold, *quick_press),
            ActionSpec::Repeat {
                max_repeat_delay,
                short_release,
            } => self.register_hold_repeat(
                trigger,
                keys,
                b.threshold,
                RepeatTiming {
                    max_repeat_delay: *max_repeat_delay,
                    short_release: *short_release,
                },
            ),
            ActionSpec::RepeatSequence {
                max_repeat_delay,
                short_release,
                prev,
                next,
                reset,
                groups,
            } => {
                let mut all = vec![keys.to_vec()];
                all.extend(groups.iter().map(|g| g.keys().to_vec()));
                self.register_sequence_hold(SequenceSpec {
                    trigger,
                    groups: all,
                    threshold: b.threshold,
                    timing: RepeatTiming {
                        max_repeat_delay: *max_repeat_delay,
                        short_release: *short_release,
                    },
                    prev: *prev,
                    next: *next,
                    reset: *reset,
                })
            }
        }
    }

    /// Process events until `events` closes, then release everything.
    pub async fn run(mut self, mut events: mpsc::Receiver<TriggerEvent>) {
        if self.registry.is_empty() {
            warn!("no_bindings");
        }
        if let Some(name) = self.active.as_deref()
            && !self.registry.has_set(name)
        {
            warn!(profile = name, "active_set_empty");
        }
        info!(
            handlers = self.registry.len(),
            actions = self.actions.len(),
            "engine_started"
        );
        loop {
            tokio::select! {
                ev = events.recv() => match ev {
                    Some(ev) => self.handle_event(&ev),
                    None => break,
                },
                Some(fired) = self.timer_rx.recv() => self.handle_timer(fired),
            }
        }
        self.shutdown().await;
    }

    /// Dispatch one trigger event.
    fn handle_event(&mut self, ev: &TriggerEvent) {
        let Some(trigger) = ev.trigger() else {
            warn!(event = %ev, "invalid_event");
            return;
        };
        if ev.kind == EventType::NoteOn {
            self.outputs.telemetry.trigger(ev.channel, ev.key);
        }
        let Some(handler) = self.registry.resolve(trigger, self.active.as_deref()) else {
            if self.log_unhandled {
                info!(event = %ev, "unhandled");
            } else {
                trace!(event = %ev, "unhandled");
            }
            return;
        };
        let start = Instant::now();
        let mut cx = Dispatch {
            actions: &mut self.actions,
            sequences: &mut self.sequences,
            active: &mut self.active,
        };
        handler(ev, &mut cx);
        let elapsed = start.elapsed();
        if elapsed > Duration::from_millis(HANDLER_WARN_MS) {
            warn!(%trigger, ?elapsed, "slow_handler");
        } else {
            trace!(event = %ev, ?elapsed, "handled");
        }
    }

    /// Apply an expired timer unless it is stale.
    fn handle_timer(&mut self, fired: TimerFired) {
        if !self.outputs.timers.finish(fired.action, fired.generation) {
            trace!(action = %fired.action, generation = fired.generation, "timer_stale");
            return;
        }
        if let Some(action) = self.actions.get_mut(fired.action) {
            action.expire(fired.expiry);
        }
    }

    /// Release every action and drain the timer queue.
    async fn shutdown(mut self) {
        self.actions.shutdown_all().await;
        self.timer_rx.close();
        let mut drained = 0usize;
        while self.timer_rx.try_recv().is_ok() {
            drained += 1;
        }
        info!(actions = self.actions.len(), drained, "engine_stopped");
    }
}
