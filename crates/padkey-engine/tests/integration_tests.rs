use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use keyinject::RecordingInjector;
use linux_keycode::Key;
use padkey_engine::{
    Engine, EngineOptions, Error, NoopTelemetry, RepeatTiming, SequenceSpec, Trigger,
    TriggerEvent,
    test_support::{TelemetryCall, TestClock, recording_telemetry, send, settle, spawn_engine},
};
use tokio::time::sleep;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Engine wired to a recording injector and no telemetry.
fn create_test_engine() -> (Engine, Arc<RecordingInjector>) {
    let inj = Arc::new(RecordingInjector::new());
    let engine = Engine::new(inj.clone(), Arc::new(NoopTelemetry), EngineOptions::default());
    (engine, inj)
}

#[tokio::test(start_paused = true)]
async fn basic_press_releases_after_delay() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_basic_press(Trigger::note_on(1, 2), &[Key::Digit2], 30, ms(10))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.hit(1, 2, 31)).await;
    assert!(inj.is_down(Key::Digit2));
    sleep(ms(9)).await;
    settle().await;
    assert!(inj.is_down(Key::Digit2));
    sleep(ms(2)).await;
    settle().await;
    assert!(!inj.is_down(Key::Digit2));

    // At the threshold, another note, and another channel do nothing.
    send(&tx, clock.hit(1, 2, 30)).await;
    send(&tx, clock.hit(1, 3, 100)).await;
    send(&tx, clock.hit(2, 2, 100)).await;
    assert_eq!(inj.presses(Key::Digit2), 1);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn basic_retrigger_extends_hold() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_basic_press(Trigger::note_on(0, 4), &[Key::A], 0, ms(10))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.hit(0, 4, 100)).await;
    sleep(ms(8)).await;
    send(&tx, clock.hit(0, 4, 100)).await;
    // The first release at 10ms was replaced by one at 18ms.
    sleep(ms(9)).await;
    settle().await;
    assert!(inj.is_down(Key::A));
    sleep(ms(2)).await;
    settle().await;
    assert!(!inj.is_down(Key::A));

    let edges: Vec<bool> = inj.edges_for(Key::A).iter().map(|e| e.pressed).collect();
    assert_eq!(edges, vec![true, true, false]);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn note_off_and_silent_note_on_are_ignored() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_basic_press(Trigger::note_on(1, 2), &[Key::A], 0, ms(10))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.off(1, 2)).await;
    send(&tx, TriggerEvent::decode(clock.now_ms(), &[0x91, 2, 0])).await;
    send(&tx, TriggerEvent::decode(clock.now_ms(), &[0xf8])).await;
    assert_eq!(inj.presses(Key::A), 0);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn velocity_scales_hold_time() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_velocity(Trigger::note_on(0, 5), &[Key::A], 0, ms(20), ms(148))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    // 20 + 128 * 64 / 128 = 84ms
    send(&tx, clock.hit(0, 5, 64)).await;
    sleep(ms(83)).await;
    settle().await;
    assert!(inj.is_down(Key::A));
    sleep(ms(2)).await;
    settle().await;
    assert!(!inj.is_down(Key::A));

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn velocity_hit_while_held_represses() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_velocity(Trigger::note_on(0, 5), &[Key::A], 0, ms(20), ms(148))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.hit(0, 5, 128)).await;
    sleep(ms(10)).await;
    send(&tx, clock.hit(0, 5, 64)).await;
    // Released immediately, pressed again after the grace gap.
    assert!(!inj.is_down(Key::A));
    sleep(ms(2)).await;
    settle().await;
    assert!(inj.is_down(Key::A));
    assert_eq!(inj.presses(Key::A), 2);

    // The second press holds for 84ms; the first press's 148ms is gone.
    sleep(ms(82)).await;
    settle().await;
    assert!(inj.is_down(Key::A));
    sleep(ms(2)).await;
    settle().await;
    assert!(!inj.is_down(Key::A));
    sleep(ms(200)).await;
    settle().await;
    assert_eq!(inj.presses(Key::A), 2);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn toggle_latches_and_quick_presses() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_toggle(Trigger::note_on(9, 38), &[Key::Space], 10, 100, ms(15))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    // Hard hit latches.
    send(&tx, clock.hit(9, 38, 120)).await;
    sleep(ms(1000)).await;
    settle().await;
    assert!(inj.is_down(Key::Space));

    // Any qualifying hit while latched releases.
    send(&tx, clock.hit(9, 38, 50)).await;
    assert!(!inj.is_down(Key::Space));

    // Soft hit taps.
    send(&tx, clock.hit(9, 38, 50)).await;
    assert!(inj.is_down(Key::Space));
    sleep(ms(16)).await;
    settle().await;
    assert!(!inj.is_down(Key::Space));

    // Below the base threshold nothing happens.
    send(&tx, clock.hit(9, 38, 10)).await;
    assert_eq!(inj.presses(Key::Space), 2);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn hold_repeat_keeps_keys_down_during_burst() {
    let (mut engine, inj) = create_test_engine();
    let timing = RepeatTiming {
        max_repeat_delay: ms(100),
        short_release: ms(30),
    };
    engine
        .register_hold_repeat(Trigger::note_on(0, 42), &[Key::W], 40, timing)
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    // Isolated soft hit: short press.
    send(&tx, clock.hit(0, 42, 10)).await;
    assert!(inj.is_down(Key::W));
    sleep(ms(31)).await;
    settle().await;
    assert!(!inj.is_down(Key::W));
    inj.clear_edges();

    sleep(ms(200)).await;
    send(&tx, clock.hit(0, 42, 90)).await;
    sleep(ms(20)).await;
    send(&tx, clock.hit(0, 42, 90)).await;
    // Soft repeat inside the window is ignored.
    sleep(ms(50)).await;
    send(&tx, clock.hit(0, 42, 20)).await;
    sleep(ms(49)).await;
    settle().await;
    assert!(inj.is_down(Key::W));
    sleep(ms(2)).await;
    settle().await;
    assert!(!inj.is_down(Key::W));

    // The burst is one continuous hold: no release until the window closes.
    let burst: Vec<bool> = inj.edges_for(Key::W).iter().map(|e| e.pressed).collect();
    assert_eq!(burst, vec![true, true, false]);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn sequence_navigation_moves_current_group() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_sequence_hold(SequenceSpec {
            trigger: Trigger::note_on(0, 10),
            groups: vec![vec![Key::W], vec![Key::Z], vec![Key::Up]],
            threshold: 20,
            timing: RepeatTiming {
                max_repeat_delay: ms(100),
                short_release: ms(30),
            },
            prev: 11,
            next: 12,
            reset: 13,
        })
        .expect("register");
    assert_eq!(engine.handler_count(), 4);
    assert_eq!(engine.action_count(), 3);
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.hit(0, 10, 90)).await;
    assert!(inj.is_down(Key::W));

    // Navigation never presses keys; a soft step does not move.
    send(&tx, clock.hit(0, 12, 90)).await;
    send(&tx, clock.hit(0, 12, 5)).await;
    send(&tx, clock.hit(0, 10, 90)).await;
    assert!(inj.is_down(Key::Z));
    assert_eq!(inj.presses(Key::W), 1);

    // Next then prev wraps through the end.
    send(&tx, clock.hit(0, 12, 90)).await;
    send(&tx, clock.hit(0, 12, 90)).await;
    send(&tx, clock.hit(0, 11, 90)).await;
    send(&tx, clock.hit(0, 10, 90)).await;
    assert!(inj.is_down(Key::Up));

    send(&tx, clock.hit(0, 13, 90)).await;
    send(&tx, clock.hit(0, 10, 90)).await;
    assert_eq!(inj.presses(Key::W), 2);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn registration_replaces_by_identity_and_shares_combos() {
    let (mut engine, inj) = create_test_engine();
    let t = Trigger::note_on(3, 7);
    engine
        .register_basic_press(t, &[Key::A], 0, ms(10))
        .expect("register");
    engine
        .register_toggle(t, &[Key::LeftCtrl, Key::Z], 0, 100, ms(10))
        .expect("register");
    engine
        .register_basic_press(Trigger::note_on(3, 8), &[Key::Z, Key::LeftCtrl], 0, ms(10))
        .expect("register");
    assert_eq!(engine.handler_count(), 2);
    assert_eq!(engine.action_count(), 2);

    assert!(matches!(
        engine.register_basic_press(t, &[], 0, ms(10)),
        Err(Error::Combo(_))
    ));
    assert!(matches!(
        engine.register_profile_swap(t, 0, Vec::new()),
        Err(Error::EmptyProfileList)
    ));

    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();
    send(&tx, clock.hit(3, 7, 127)).await;
    assert_eq!(inj.presses(Key::A), 0);
    assert!(inj.is_down(Key::LeftCtrl));
    assert!(inj.is_down(Key::Z));

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn profile_sets_and_swapping() {
    let (mut engine, inj) = create_test_engine();
    let basic = |e: &mut Engine, note, key| {
        e.register_basic_press(Trigger::note_on(0, note), &[key], 0, ms(5))
            .expect("register");
    };
    basic(&mut engine, 1, Key::A);
    engine.select_population_target(Some("drums"));
    basic(&mut engine, 1, Key::B);
    basic(&mut engine, 2, Key::C);
    engine.select_population_target(Some("keys"));
    assert_eq!(engine.population_target(), Some("keys"));
    basic(&mut engine, 2, Key::D);
    engine.select_population_target(None);
    engine
        .register_profile_swap(
            Trigger::note_on(0, 9),
            0,
            vec!["drums".to_string(), "keys".to_string()],
        )
        .expect("register");
    assert_eq!(engine.active_set(), None);

    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    // No active set: named bindings are unreachable.
    send(&tx, clock.hit(0, 2, 100)).await;
    assert_eq!(inj.presses(Key::C) + inj.presses(Key::D), 0);

    send(&tx, clock.hit(0, 9, 100)).await;
    send(&tx, clock.hit(0, 2, 100)).await;
    assert_eq!(inj.presses(Key::C), 1);
    // The default set shadows the active set.
    send(&tx, clock.hit(0, 1, 100)).await;
    assert_eq!(inj.presses(Key::A), 1);
    assert_eq!(inj.presses(Key::B), 0);

    send(&tx, clock.hit(0, 9, 100)).await;
    send(&tx, clock.hit(0, 2, 100)).await;
    assert_eq!(inj.presses(Key::D), 1);

    // Wraps back to the first name.
    send(&tx, clock.hit(0, 9, 100)).await;
    send(&tx, clock.hit(0, 2, 100)).await;
    assert_eq!(inj.presses(Key::C), 2);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn profile_swap_visits_repeated_names() {
    let (mut engine, inj) = create_test_engine();
    for (set, key) in [("a", Key::A), ("b", Key::B), ("c", Key::C)] {
        engine.select_population_target(Some(set));
        engine
            .register_basic_press(Trigger::note_on(0, 2), &[key], 0, ms(5))
            .expect("register");
    }
    engine.select_population_target(None);
    let names = ["a", "b", "a", "c"].map(String::from).to_vec();
    engine
        .register_profile_swap(Trigger::note_on(0, 9), 0, names)
        .expect("register");
    engine.set_active_set(Some("b"));

    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();
    let mut order = Vec::new();
    for _ in 0..5 {
        let before = [Key::A, Key::B, Key::C].map(|k| inj.presses(k));
        send(&tx, clock.hit(0, 2, 100)).await;
        let after = [Key::A, Key::B, Key::C].map(|k| inj.presses(k));
        let pressed = (0..3).find(|&i| after[i] > before[i]).map(|i| ["a", "b", "c"][i]);
        order.push(pressed.expect("one set pressed"));
        send(&tx, clock.hit(0, 9, 100)).await;
    }
    // Starts at b, then walks the list from b's slot: a, c, a, b.
    assert_eq!(order, vec!["b", "a", "c", "a", "b"]);

    drop(tx);
    handle.await.expect("engine task");
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_pending_timers() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_basic_press(Trigger::note_on(0, 1), &[Key::A], 0, ms(1000))
        .expect("register");
    engine
        .register_velocity(Trigger::note_on(0, 2), &[Key::B], 0, ms(20), ms(148))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.hit(0, 1, 100)).await;
    send(&tx, clock.hit(0, 2, 100)).await;
    // Second velocity hit releases B and queues a re-press.
    send(&tx, clock.hit(0, 2, 100)).await;
    assert!(inj.is_down(Key::A));
    assert!(!inj.is_down(Key::B));

    drop(tx);
    handle.await.expect("engine task");
    assert!(!inj.is_down(Key::A));
    assert!(!inj.is_down(Key::B));

    // Disarmed timers never fire after shutdown.
    sleep(ms(2000)).await;
    settle().await;
    assert!(!inj.is_down(Key::A));
    assert!(!inj.is_down(Key::B));
    assert_eq!(inj.presses(Key::A), 1);
    assert_eq!(inj.presses(Key::B), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_held_keys_and_runs_hooks() {
    let (mut engine, inj) = create_test_engine();
    engine
        .register_toggle(Trigger::note_on(0, 1), &[Key::LeftCtrl, Key::C], 0, 50, ms(10))
        .expect("register");
    let released = Arc::new(AtomicUsize::new(0));
    let counter = released.clone();
    engine
        .on_release(&[Key::C, Key::LeftCtrl], move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .expect("hook");
    assert_eq!(engine.action_count(), 1);
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();

    send(&tx, clock.hit(0, 1, 100)).await;
    assert!(inj.is_down(Key::LeftCtrl));
    assert!(inj.is_down(Key::C));

    drop(tx);
    handle.await.expect("engine task");
    assert!(!inj.is_down(Key::LeftCtrl));
    assert!(!inj.is_down(Key::C));
    assert_eq!(released.load(Ordering::SeqCst), 1);

    // The injector sees the combo in press order for both edges.
    let keys: Vec<(Key, bool)> = inj.edges().iter().map(|e| (e.key, e.pressed)).collect();
    assert_eq!(
        keys,
        vec![
            (Key::LeftCtrl, true),
            (Key::C, true),
            (Key::LeftCtrl, false),
            (Key::C, false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn telemetry_sees_bindings_triggers_and_key_state() {
    let inj = Arc::new(RecordingInjector::new());
    let (rec, telemetry) = recording_telemetry();
    let mut engine = Engine::new(inj, telemetry, EngineOptions::default());
    engine
        .register_basic_press(Trigger::note_on(1, 2), &[Key::LeftCtrl, Key::A], 0, ms(10))
        .expect("register");
    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();
    send(&tx, clock.hit(1, 2, 64)).await;
    sleep(ms(20)).await;
    settle().await;
    drop(tx);
    handle.await.expect("engine task");

    let calls = rec.calls();
    assert_eq!(
        &calls[..4],
        &[
            TelemetryCall::Binding(1, 2, "LEFTCTRL,A".to_string()),
            TelemetryCall::Trigger(1, 2),
            TelemetryCall::KeyState("LEFTCTRL,A".to_string(), true),
            TelemetryCall::KeyState("LEFTCTRL,A".to_string(), false),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn applies_parsed_config() {
    let source = "\
# demo
ch=9 ev=38 key=SPACE thres=20 BASIC 40
ch=9 ev=36 key=ctrl,z thres=30 VELOCITY 20 200
@profile racing
ch=9 ev=40 key=UP thres=20 BASIC 40
@profile default
@active racing
@swap ch=9 ev=49 thres=60 racing
";
    let cfg = config::load_from_str(source, None).expect("config");
    let (mut engine, inj) = create_test_engine();
    engine.apply_config(&cfg).expect("apply");
    assert_eq!(engine.handler_count(), 4);
    assert_eq!(engine.active_set(), Some("racing"));
    assert_eq!(engine.population_target(), None);

    let (tx, handle) = spawn_engine(engine);
    let clock = TestClock::new();
    send(&tx, clock.hit(9, 38, 21)).await;
    send(&tx, clock.hit(9, 40, 21)).await;
    assert!(inj.is_down(Key::Space));
    assert!(inj.is_down(Key::Up));
    sleep(ms(41)).await;
    settle().await;
    assert!(!inj.is_down(Key::Space));
    assert!(!inj.is_down(Key::Up));

    drop(tx);
    handle.await.expect("engine task");
}
