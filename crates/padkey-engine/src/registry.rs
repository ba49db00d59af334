use std::collections::HashMap;

use tracing::{debug, trace};

use crate::{
    event::{Trigger, TriggerEvent},
    key_action::{ActionArena, ActionId},
};

/// Handler invoked for a matching trigger event.
pub type Handler = Box<dyn FnMut(&TriggerEvent, &mut Dispatch<'_>) + Send>;

/// Index of a sequence in the engine's sequence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceId(usize);

impl SequenceId {
    /// Wrap a sequence table index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Cyclic list of action groups for sequence-hold bindings.
pub struct Sequence {
    /// One action per group.
    pub groups: Vec<ActionId>,
    /// Current group.
    pub cur: usize,
}

impl Sequence {
    /// Move to the next group, wrapping.
    pub fn advance(&mut self) {
        self.cur = (self.cur + 1) % self.groups.len();
    }

    /// Move to the previous group, wrapping.
    pub fn retreat(&mut self) {
        self.cur = self.cur.checked_sub(1).unwrap_or(self.groups.len() - 1);
    }

    /// Go back to the first group.
    pub fn reset(&mut self) {
        self.cur = 0;
    }

    /// Action of the current group.
    pub fn current(&self) -> ActionId {
        self.groups[self.cur]
    }
}

/// Engine state a handler may touch.
pub struct Dispatch<'a> {
    /// Output key actions.
    pub actions: &'a mut ActionArena,
    /// Sequence table.
    pub sequences: &'a mut Vec<Sequence>,
    /// Active named set.
    pub active: &'a mut Option<String>,
}

impl Dispatch<'_> {
    /// Look up a sequence.
    pub fn sequence(&mut self, id: SequenceId) -> Option<&mut Sequence> {
        self.sequences.get_mut(id.0)
    }
}

/// Handlers keyed by trigger identity.
type ActionSet = HashMap<Trigger, Handler>;

/// Default set plus named sets, and the set new registrations go into.
#[derive(Default)]
pub struct Registry {
    /// Always consulted first.
    default: ActionSet,
    /// Consulted when the default set has no handler and the set is active.
    named: HashMap<String, ActionSet>,
    /// Population target; `None` is the default set.
    target: Option<String>,
}

impl Registry {
    /// Empty registry targeting the default set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receiving registrations, created on demand.
    fn target_set(&mut self) -> &mut ActionSet {
        match &self.target {
            Some(name) => self.named.entry(name.clone()).or_default(),
            None => &mut self.default,
        }
    }

    /// Route subsequent registrations into `name` (`None`: default set).
    pub fn select_target(&mut self, name: Option<&str>) {
        self.target = name.map(str::to_string);
        debug!(set = name.unwrap_or("default"), "population_target");
    }

    /// Current population target.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Remove a handler for `trigger` from the population target.
    pub fn remove(&mut self, trigger: Trigger) {
        if self.target_set().remove(&trigger).is_some() {
            trace!(%trigger, "handler_removed");
        }
    }

    /// Install a handler into the population target, replacing any earlier one.
    pub fn insert(&mut self, trigger: Trigger, handler: Handler) {
        self.target_set().insert(trigger, handler);
        trace!(%trigger, set = self.target.as_deref().unwrap_or("default"), "handler_installed");
    }

    /// Handler for `trigger`: the default set first, then the active named set.
    pub fn resolve(&mut self, trigger: Trigger, active: Option<&str>) -> Option<&mut Handler> {
        if self.default.contains_key(&trigger) {
            return self.default.get_mut(&trigger);
        }
        self.named.get_mut(active?)?.get_mut(&trigger)
    }

    /// Total number of installed handlers across all sets.
    pub fn len(&self) -> usize {
        self.default.len() + self.named.values().map(HashMap::len).sum::<usize>()
    }

    /// Whether no handler is installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a named set exists.
    pub fn has_set(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }
}
