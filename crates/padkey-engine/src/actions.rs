//! Handler builders for each action kind.
//!
//! Every handler first checks that the event kind matches the trigger it was
//! registered for; channel and key already matched through the identity.
//! Velocities at or below the threshold are ignored unless noted.

use std::time::Duration;

use tracing::{info, trace, warn};

use crate::{
    event::{EventType, MAX_VELOCITY, TriggerEvent},
    key_action::ActionId,
    registry::{Dispatch, Handler, SequenceId},
    timer::Expiry,
};

/// Gap between the release and the re-press of an already held
/// velocity-scaled action, so the target sees a fresh key edge.
pub const REPRESS_GRACE: Duration = Duration::from_millis(1);

/// Hold time for a velocity-scaled press: `min + (max - min) * velocity / 128`.
///
/// Velocities above 128 extrapolate past `max`. A negative result clamps to
/// zero.
pub fn hold_for_velocity(min: Duration, max: Duration, velocity: u8) -> Duration {
    let min_ns = i128::try_from(min.as_nanos()).unwrap_or(i128::MAX);
    let max_ns = i128::try_from(max.as_nanos()).unwrap_or(i128::MAX);
    let span = max_ns.saturating_sub(min_ns);
    let scaled = span.saturating_mul(i128::from(velocity)) / i128::from(MAX_VELOCITY);
    let ns = min_ns.saturating_add(scaled);
    Duration::from_nanos(u64::try_from(ns.max(0)).unwrap_or(u64::MAX))
}

/// Kind matches and the hit is harder than `threshold`.
fn qualifies(ev: &TriggerEvent, kind: EventType, threshold: u8) -> bool {
    ev.kind == kind && ev.velocity > threshold
}

/// Repeat-hold timing shared by hold-repeat and sequence-hold.
#[derive(Debug, Clone, Copy)]
pub struct RepeatTiming {
    /// Maximum gap between hits that keeps the keys down.
    pub max_repeat_delay: Duration,
    /// Hold time for an isolated hit.
    pub short_release: Duration,
}

/// Per-binding state of a repeat-hold handler.
struct RepeatState {
    /// Timing parameters.
    timing: RepeatTiming,
    /// Timestamp of the last accepted hit.
    last_ms: i64,
}

impl RepeatState {
    /// Decide on a hit. Returns the release delay to arm, or `None` to
    /// ignore the hit.
    ///
    /// A hit more than `max_repeat_delay` after the last accepted one is
    /// isolated and accepted at any non-zero velocity; it releases after
    /// `short_release`. A hit inside the window must clear the threshold and
    /// keeps the keys down for another `max_repeat_delay`.
    fn hit(&mut self, ev: &TriggerEvent, kind: EventType, threshold: u8) -> Option<Duration> {
        let window = i64::try_from(self.timing.max_repeat_delay.as_millis()).unwrap_or(i64::MAX);
        let isolated = ev.timestamp_ms.saturating_sub(self.last_ms) > window;
        if ev.kind != kind || ev.velocity == 0 || (!isolated && ev.velocity <= threshold) {
            return None;
        }
        self.last_ms = ev.timestamp_ms;
        Some(if isolated {
            self.timing.short_release
        } else {
            self.timing.max_repeat_delay
        })
    }
}

/// Press on a qualifying hit and release after `release`.
pub fn basic_press(kind: EventType, action: ActionId, threshold: u8, release: Duration) -> Handler {
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        if !qualifies(ev, kind, threshold) {
            return;
        }
        if let Some(a) = cx.actions.get_mut(action) {
            a.press();
            a.schedule_release(release);
        }
    })
}

/// Press for a velocity-scaled time. A hit while the keys are held releases
/// them and presses again after [`REPRESS_GRACE`].
pub fn velocity(
    kind: EventType,
    action: ActionId,
    threshold: u8,
    min_press: Duration,
    max_press: Duration,
) -> Handler {
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        if !qualifies(ev, kind, threshold) {
            return;
        }
        if ev.velocity > MAX_VELOCITY {
            warn!(velocity = ev.velocity, "max_velocity_exceeded");
        }
        let hold = hold_for_velocity(min_press, max_press, ev.velocity);
        let Some(a) = cx.actions.get_mut(action) else {
            return;
        };
        if a.is_pressed() {
            a.cancel_and_release();
            a.schedule(REPRESS_GRACE, Expiry::Press { hold });
        } else {
            a.press();
            a.schedule_release(hold);
        }
    })
}

/// Toggle the keys. Hits softer than `accept_threshold` tap for
/// `quick_press` instead of latching.
pub fn toggle(
    kind: EventType,
    action: ActionId,
    threshold: u8,
    accept_threshold: u8,
    quick_press: Duration,
) -> Handler {
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        if !qualifies(ev, kind, threshold) {
            return;
        }
        let Some(a) = cx.actions.get_mut(action) else {
            return;
        };
        if a.is_pressed() {
            a.cancel_and_release();
            return;
        }
        a.press();
        if ev.velocity < accept_threshold {
            a.schedule_release(quick_press);
        } else {
            a.disarm();
        }
    })
}

/// Keep the keys down while hits repeat within `max_repeat_delay`.
pub fn hold_repeat(
    kind: EventType,
    action: ActionId,
    threshold: u8,
    timing: RepeatTiming,
) -> Handler {
    let mut state = RepeatState { timing, last_ms: 0 };
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        let Some(delay) = state.hit(ev, kind, threshold) else {
            return;
        };
        if let Some(a) = cx.actions.get_mut(action) {
            a.press();
            a.schedule_release(delay);
        }
    })
}

/// Hold-repeat on the current group of a sequence.
pub fn sequence_hold(
    kind: EventType,
    seq: SequenceId,
    threshold: u8,
    timing: RepeatTiming,
) -> Handler {
    let mut state = RepeatState { timing, last_ms: 0 };
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        let Some(action) = cx.sequence(seq).map(|s| s.current()) else {
            return;
        };
        let Some(delay) = state.hit(ev, kind, threshold) else {
            return;
        };
        if let Some(a) = cx.actions.get_mut(action) {
            a.press();
            a.schedule_release(delay);
        }
    })
}

/// Sequence navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Previous group.
    Prev,
    /// Next group.
    Next,
    /// First group.
    Reset,
}

/// Move a sequence's current group. Keys are not touched.
pub fn sequence_step(kind: EventType, seq: SequenceId, threshold: u8, step: Step) -> Handler {
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        if !qualifies(ev, kind, threshold) {
            return;
        }
        let Some(s) = cx.sequence(seq) else {
            return;
        };
        match step {
            Step::Prev => s.retreat(),
            Step::Next => s.advance(),
            Step::Reset => s.reset(),
        }
        trace!(?step, cur = s.cur, "sequence_step");
    })
}

/// Advance the active named set through `names`, wrapping.
///
/// The handler keeps its own position in the list, so a name listed twice
/// is visited twice per cycle. When the active set was changed elsewhere,
/// the position resyncs to the first occurrence of the active name, or
/// restarts at the first name if it is not listed.
pub fn profile_swap(kind: EventType, threshold: u8, names: Vec<String>) -> Handler {
    let mut pos: Option<usize> = None;
    Box::new(move |ev: &TriggerEvent, cx: &mut Dispatch<'_>| {
        if !qualifies(ev, kind, threshold) || names.is_empty() {
            return;
        }
        let active = cx.active.as_deref();
        let cur = pos
            .filter(|&i| names.get(i).map(String::as_str) == active)
            .or_else(|| active.and_then(|a| names.iter().position(|n| n == a)));
        let next = cur.map_or(0, |i| (i + 1) % names.len());
        pos = Some(next);
        let name = names[next].clone();
        info!(profile = %name, index = next, "profile_active");
        *cx.active = Some(name);
    })
}
