use std::sync::{Arc, Mutex};

use super::*;
use crate::active_mode::{
    detectors::test_support::alternating_x,
    source::SampleRate,
    types::{ProximityGesture, ShakeDetail},
};

#[derive(Debug, Default)]
struct SourceLog {
    starts: u32,
    stops: u32,
    running: bool,
    last_rate: Option<SampleRate>,
}

struct FakeSource {
    available: bool,
    log: Arc<Mutex<SourceLog>>,
}

impl FakeSource {
    fn new(available: bool) -> (Self, Arc<Mutex<SourceLog>>) {
        let log = Arc::new(Mutex::new(SourceLog::default()));
        (
            Self {
                available,
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl MotionSource for FakeSource {
    fn start(&mut self, rate: SampleRate) -> Result<(), EngineError> {
        let mut log = self.log.lock().unwrap();
        log.starts += 1;
        if !self.available {
            return Err(EngineError::SensorUnavailable);
        }
        log.running = true;
        log.last_rate = Some(rate);
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        if log.running {
            log.stops += 1;
        }
        log.running = false;
    }
}

fn wake_log<S: MotionSource>(engine: &mut ActiveModeEngine<'_, S>) -> Arc<Mutex<std::vec::Vec<WakeRequest>>> {
    let wakes = Arc::new(Mutex::new(std::vec::Vec::new()));
    let sink = Arc::clone(&wakes);
    engine.register_wake_sink(move |request: &WakeRequest| sink.lock().unwrap().push(*request));
    wakes
}

fn feed_shake<S: MotionSource>(engine: &mut ActiveModeEngine<'_, S>, start_ms: u64) -> ActionBuffer {
    let mut all = ActionBuffer::new();
    for sample in alternating_x(start_ms, 20, 3.0) {
        all.extend(&engine.on_sample(sample).actions);
    }
    all
}

#[test]
fn notification_count_drives_listening() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);

    let created = engine.create(0).expect("create");
    assert!(created.actions.is_empty());
    assert_eq!(engine.state(), EngineStateId::Idle);

    let started = engine.on_notification_count_changed(2, 10).expect("pump");
    assert!(started.actions.contains(EngineAction::SourceStarted));
    assert_eq!(started.trace.state_id, EngineStateId::Listening);
    assert_eq!(started.trace.active_votes, 1);
    assert_eq!(engine.state(), EngineStateId::Listening);
    assert_eq!(log.lock().unwrap().last_rate, Some(SampleRate::Game));

    let unchanged = engine.on_notification_count_changed(3, 20).expect("pump");
    assert!(unchanged.actions.is_empty());

    let stopped = engine.on_notification_count_changed(0, 30).expect("pump");
    assert!(stopped.actions.contains(EngineAction::SourceStopped));
    assert_eq!(engine.state(), EngineStateId::Idle);

    let log = log.lock().unwrap();
    assert_eq!((log.starts, log.stops), (1, 1));
    assert!(!log.running);
}

#[test]
fn shake_while_listening_requests_one_wake() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine
        .on_config_changed(ConfigChange::WithoutNotifications(true), 0)
        .expect("pump");

    let actions = feed_shake(&mut engine, 0);
    assert_eq!(actions.wake_requests().count(), 1);

    let wakes = wakes.lock().unwrap();
    assert_eq!(wakes.len(), 1);
    assert_eq!(wakes[0].t_ms, 850);
    let (handler, shake) = wakes[0].shake().expect("shake wake");
    assert_eq!(handler, HandlerKind::WithoutNotifications);
    assert!(matches!(shake.detail, ShakeDetail::Oscillation { .. }));

    let counters = engine.counters();
    assert_eq!(counters.samples_seen, 20);
    assert_eq!(counters.wakes_requested, 1);
    assert_eq!(counters.sessions_started, 1);
}

#[test]
fn samples_while_idle_are_traced_and_dropped() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);
    let wakes = wake_log(&mut engine);
    engine.create(0).expect("create");

    let actions = feed_shake(&mut engine, 0);
    assert!(actions.is_empty());
    assert!(wakes.lock().unwrap().is_empty());
    assert_eq!(engine.last_trace().reject_reason, RejectReason::SourceIdle);
}

#[test]
fn unavailable_sensor_stays_idle_without_retry() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(false);
    let mut config = ActiveModeConfig::default_tuning();
    config.handlers.without_notifications.without_notifications = true;
    let mut engine = ActiveModeEngine::new(config, &bus, source);

    assert_eq!(engine.create(0).err(), Some(EngineError::SensorUnavailable));
    assert_eq!(engine.state(), EngineStateId::Idle);
    assert_eq!(
        engine.last_trace().reject_reason,
        RejectReason::SensorUnavailable
    );

    // Vote stays active: no silent retry.
    engine.on_notification_count_changed(4, 10).expect("no new start");
    assert_eq!(log.lock().unwrap().starts, 1);

    // Vote drops and rises again: one new attempt.
    engine
        .on_config_changed(ConfigChange::WithoutNotifications(false), 20)
        .expect("no start");
    engine.on_notification_count_changed(0, 30).expect("no start");
    assert_eq!(
        engine.on_notification_count_changed(1, 40).err(),
        Some(EngineError::SensorUnavailable)
    );
    assert_eq!(log.lock().unwrap().starts, 2);
    assert_eq!(engine.counters().start_failures, 2);
    assert_eq!(engine.counters().sessions_started, 0);
}

#[test]
fn shared_strategy_kinds_wake_once_per_shake() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut config = ActiveModeConfig::default_tuning();
    config.handlers.screen_off.enabled = true;
    config.handlers.screen_off.strategy = Some(StrategyKind::Oscillation);
    let mut engine = ActiveModeEngine::new(config, &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");

    let actions = feed_shake(&mut engine, 0);
    assert_eq!(actions.wake_requests().count(), 1);
    assert!(actions.contains(EngineAction::WakeSuppressed {
        reason: RejectReason::CooldownActive
    }));
    assert_eq!(wakes.lock().unwrap().len(), 1);

    let counters = engine.counters();
    assert_eq!(counters.shake_events, 2);
    assert_eq!(counters.wakes_suppressed_cooldown, 1);
}

#[test]
fn pocket_guard_vetoes_wake() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");
    let near = engine
        .publish(FeedEvent::Proximity { near: true }, 0)
        .expect("pump");
    assert_eq!(near.trace.pocket_near, 1);

    let actions = feed_shake(&mut engine, 0);
    assert!(actions.contains(EngineAction::WakeSuppressed {
        reason: RejectReason::PocketVeto
    }));
    assert!(!actions.contains_wake_request());
    assert!(wakes.lock().unwrap().is_empty());
    assert_eq!(engine.counters().wakes_suppressed_pocket, 1);

    // Out of the pocket, after the cooldown: wakes again.
    engine
        .publish(FeedEvent::Proximity { near: false }, 2_000)
        .expect("pump");
    let actions = feed_shake(&mut engine, 2_400);
    assert!(actions.contains_wake_request());
}

#[test]
fn disabled_pocket_guard_forwards_shake() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut config = ActiveModeConfig::default_tuning();
    config.proximity.pocket_guard = false;
    let mut engine = ActiveModeEngine::new(config, &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");
    engine
        .publish(FeedEvent::Proximity { near: true }, 0)
        .expect("pump");

    let actions = feed_shake(&mut engine, 0);
    assert!(actions.contains_wake_request());
    assert_eq!(wakes.lock().unwrap().len(), 1);
    assert_eq!(engine.counters().wakes_suppressed_pocket, 0);
}

#[test]
fn wake_cooldown_spans_session_restart() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");
    assert_eq!(feed_shake(&mut engine, 0).wake_requests().count(), 1);

    // A new session gets fresh strategies but not a fresh wake cooldown.
    engine.on_notification_count_changed(0, 960).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Idle);
    engine.on_notification_count_changed(1, 980).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Listening);
    assert_eq!(log.lock().unwrap().starts, 2);

    let actions = feed_shake(&mut engine, 1_000);
    assert!(!actions.contains_wake_request());
    assert!(actions.contains(EngineAction::WakeSuppressed {
        reason: RejectReason::CooldownActive
    }));
    assert_eq!(wakes.lock().unwrap().len(), 1);

    let actions = feed_shake(&mut engine, 4_000);
    assert!(actions.contains_wake_request());
    assert_eq!(wakes.lock().unwrap().len(), 2);
    assert_eq!(engine.counters().wakes_suppressed_cooldown, 1);
}

#[test]
fn recreate_after_count_drops_stays_idle() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 10).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Listening);

    engine.destroy(20);
    engine.on_notification_count_changed(0, 30).expect("pump");

    let recreated = engine.create(40).expect("create");
    assert!(recreated.actions.is_empty());
    assert_eq!(engine.state(), EngineStateId::Idle);
    assert_eq!(recreated.trace.active_votes, 0);
    assert_eq!(log.lock().unwrap().starts, 1);
}

fn on_demand_config() -> ActiveModeConfig {
    let mut config = ActiveModeConfig::default_tuning();
    config.engine.motion_duty = MotionDuty::OnDemand;
    config
}

#[test]
fn posted_notification_runs_on_demand_source_briefly() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(on_demand_config(), &bus, source);

    engine.create(0).expect("create");
    let armed = engine.on_notification_count_changed(1, 0).expect("pump");
    assert!(armed.actions.is_empty());
    assert_eq!(engine.state(), EngineStateId::Armed);
    assert_eq!(log.lock().unwrap().starts, 0);

    let pinged = engine.on_notification_posted(100).expect("pump");
    assert!(pinged.actions.contains(EngineAction::SourceStarted));
    assert_eq!(engine.state(), EngineStateId::Listening);

    let inside = engine.on_sample(Sample::new(1.0, 1.0, 1.0, 3_000));
    assert!(inside.actions.is_empty());
    assert_eq!(engine.state(), EngineStateId::Listening);

    let expired = engine.on_sample(Sample::new(1.0, 1.0, 1.0, 3_100));
    assert!(expired.actions.contains(EngineAction::SourceStopped));
    assert_eq!(expired.trace.reject_reason, RejectReason::SourceIdle);
    assert_eq!(engine.state(), EngineStateId::Armed);

    let log = log.lock().unwrap();
    assert_eq!((log.starts, log.stops), (1, 1));
    assert_eq!(engine.counters().pings, 1);
}

#[test]
fn ping_needs_an_active_vote() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(on_demand_config(), &bus, source);

    engine.create(0).expect("create");
    engine.on_notification_posted(0).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Idle);
    assert_eq!(engine.counters().pings, 0);

    // The count is applied before the ping within one pump.
    bus.publish(FeedEvent::NotificationCount(1));
    bus.publish(FeedEvent::NotificationPosted);
    let output = engine.pump(10).expect("pump");
    assert!(output.actions.contains(EngineAction::SourceStarted));
    assert_eq!(engine.state(), EngineStateId::Listening);
    assert_eq!(log.lock().unwrap().starts, 1);

    // Losing the vote drops the ping with it.
    engine.on_notification_count_changed(0, 20).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Idle);
    engine.on_notification_count_changed(1, 30).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Armed);
}

#[test]
fn active_charging_keeps_source_running_while_plugged() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut config = on_demand_config();
    config.engine.active_charging = true;
    let mut engine = ActiveModeEngine::new(config, &bus, source);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Armed);

    let plugged = engine
        .publish(
            FeedEvent::Battery {
                level: 80,
                plugged: true,
            },
            10,
        )
        .expect("pump");
    assert!(plugged.actions.contains(EngineAction::SourceStarted));
    assert_eq!(engine.state(), EngineStateId::Listening);

    // No ping deadline while charging.
    engine.on_sample(Sample::new(1.0, 1.0, 1.0, 60_000));
    assert_eq!(engine.state(), EngineStateId::Listening);

    let unplugged = engine
        .publish(
            FeedEvent::Battery {
                level: 80,
                plugged: false,
            },
            60_010,
        )
        .expect("pump");
    assert!(unplugged.actions.contains(EngineAction::SourceStopped));
    assert_eq!(engine.state(), EngineStateId::Armed);
    assert_eq!(log.lock().unwrap().stops, 1);
}

#[test]
fn plugged_state_is_replayed_on_create() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut config = on_demand_config();
    config.engine.active_charging = true;
    let mut engine = ActiveModeEngine::new(config, &bus, source);

    bus.publish(FeedEvent::Battery {
        level: 50,
        plugged: true,
    });
    bus.publish(FeedEvent::NotificationCount(2));

    let created = engine.create(0).expect("create");
    assert!(created.actions.contains(EngineAction::SourceStarted));
    assert_eq!(engine.state(), EngineStateId::Listening);
}

/// Near, far, near, far inside the wave-to-wake limits.
fn wave(engine: &mut ActiveModeEngine<'_, FakeSource>, start_ms: u64) -> ActionBuffer {
    let mut all = ActionBuffer::new();
    for (near, offset_ms) in [(true, 0), (false, 300), (true, 800), (false, 1_000)] {
        let output = engine
            .publish(FeedEvent::Proximity { near }, start_ms + offset_ms)
            .expect("pump");
        all.extend(&output.actions);
    }
    all
}

#[test]
fn wave_to_wake_requests_a_wake() {
    let bus = FeedBus::new();
    let (source, _log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");

    // Disabled by default.
    assert!(!wave(&mut engine, 1_000).contains_wake_request());

    engine
        .on_config_changed(ConfigChange::WaveToWake(true), 2_100)
        .expect("pump");
    assert_eq!(wave(&mut engine, 3_000).wake_requests().count(), 1);

    let wakes = wakes.lock().unwrap();
    assert_eq!(wakes.len(), 1);
    assert_eq!(wakes[0].t_ms, 4_000);
    assert_eq!(
        wakes[0].trigger,
        WakeTrigger::Proximity(ProximityGesture::WaveToWake)
    );
    assert_eq!(engine.counters().proximity_gestures, 1);
}

#[test]
fn leaving_the_pocket_wakes_an_armed_engine() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(on_demand_config(), &bus, source);
    let wakes = wake_log(&mut engine);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Armed);

    engine
        .publish(FeedEvent::Proximity { near: true }, 1_000)
        .expect("pump");
    let out = engine
        .publish(FeedEvent::Proximity { near: false }, 6_000)
        .expect("pump");
    assert!(out.actions.contains_wake_request());
    assert_eq!(
        wakes.lock().unwrap()[0].trigger,
        WakeTrigger::Proximity(ProximityGesture::Pocket)
    );
    assert_eq!(log.lock().unwrap().starts, 0);
}

#[test]
fn destroy_is_idempotent_and_detaches_feeds() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);

    engine.create(0).expect("create");
    engine.on_notification_count_changed(1, 0).expect("pump");

    let first = engine.destroy(100);
    assert!(first.actions.contains(EngineAction::SourceStopped));
    let second = engine.destroy(200);
    assert!(second.actions.is_empty());
    assert_eq!(log.lock().unwrap().stops, 1);

    let after = engine.on_notification_count_changed(5, 300).expect("pump");
    assert!(after.actions.is_empty());
    assert_eq!(engine.state(), EngineStateId::Idle);

    // Recreate catches up with the count published while destroyed.
    let recreated = engine.create(400).expect("create");
    assert!(recreated.actions.contains(EngineAction::SourceStarted));
}

#[test]
fn dropping_engine_stops_source() {
    let bus = FeedBus::new();
    let (source, log) = FakeSource::new(true);
    {
        let mut engine =
            ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, source);
        engine.create(0).expect("create");
        engine.on_notification_count_changed(1, 0).expect("pump");
        assert!(log.lock().unwrap().running);
    }
    assert!(!log.lock().unwrap().running);
    assert_eq!(log.lock().unwrap().stops, 1);
}
