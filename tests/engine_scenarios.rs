use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use activewake::{
    active_config, ActiveModeConfig, ActiveModeEngine, ConfigChange, EngineError, EngineStateId,
    FeedBus, FeedEvent, HandlerKind, MotionSource, Sample, SampleRate, SharedEngine,
    StrategyKind, VotePolicy, WakeRequest,
};

#[derive(Clone, Default)]
struct TallySource {
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
}

impl MotionSource for TallySource {
    fn start(&mut self, _rate: SampleRate) -> Result<(), EngineError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct MissingSensor;

impl MotionSource for MissingSensor {
    fn start(&mut self, _rate: SampleRate) -> Result<(), EngineError> {
        Err(EngineError::SensorUnavailable)
    }

    fn stop(&mut self) {}
}

fn two_handler_config(policy: VotePolicy) -> ActiveModeConfig {
    let mut config = ActiveModeConfig::default_tuning();
    config.engine.vote_policy = policy;
    config.handlers.screen_off.enabled = true;
    config.handlers.screen_off.strategy = Some(StrategyKind::Ratio);
    config
}

fn shake(start_ms: u64) -> Vec<Sample> {
    (0..20)
        .map(|i| {
            let t_ms = start_ms + i * 50;
            let x = if i % 2 == 0 { 3.0 } else { -3.0 };
            Sample::new(x, 1.0, 1.0, t_ms)
        })
        .collect()
}

#[test]
fn compiled_config_is_the_stock_tuning() {
    assert_eq!(*active_config(), ActiveModeConfig::default_tuning());
    assert_eq!(active_config().window.span_ms, 1_400);
    assert_eq!(active_config().cooldown.ignore_ms, 1_500);
}

#[test]
fn any_policy_listens_while_one_handler_votes() {
    let bus = FeedBus::new();
    let source = TallySource::default();
    let observed = source.clone();
    let mut engine = ActiveModeEngine::new(two_handler_config(VotePolicy::Any), &bus, source);
    engine.create(0).expect("create");

    let cases = [
        (FeedEvent::NotificationCount(1), EngineStateId::Listening),
        (FeedEvent::Screen { on: false }, EngineStateId::Listening),
        (FeedEvent::NotificationCount(0), EngineStateId::Listening),
        (FeedEvent::Screen { on: true }, EngineStateId::Idle),
        (FeedEvent::Screen { on: false }, EngineStateId::Listening),
    ];
    for (step, (event, expected)) in cases.into_iter().enumerate() {
        engine.publish(event, step as u64 * 100).expect("pump");
        let active = engine.votes().filter(|(_, vote)| vote.active).count();
        assert_eq!(engine.state(), expected, "step {step}: {event:?}");
        assert_eq!(expected == EngineStateId::Listening, active > 0);
    }

    assert_eq!(observed.starts.load(Ordering::SeqCst), 2);
    assert_eq!(observed.stops.load(Ordering::SeqCst), 1);
}

#[test]
fn all_policy_needs_every_handler() {
    let bus = FeedBus::new();
    let mut engine = ActiveModeEngine::new(
        two_handler_config(VotePolicy::All),
        &bus,
        TallySource::default(),
    );
    engine.create(0).expect("create");

    engine.on_notification_count_changed(2, 10).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Idle);

    engine
        .publish(FeedEvent::Screen { on: false }, 20)
        .expect("pump");
    assert_eq!(engine.state(), EngineStateId::Listening);

    engine
        .on_config_changed(ConfigChange::WithoutNotifications(false), 30)
        .expect("pump");
    assert_eq!(engine.state(), EngineStateId::Listening);

    engine.on_notification_count_changed(0, 40).expect("pump");
    assert_eq!(engine.state(), EngineStateId::Idle);
}

#[test]
fn votes_in_one_pump_start_the_source_once() {
    let bus = FeedBus::new();
    let source = TallySource::default();
    let observed = source.clone();
    let mut engine = ActiveModeEngine::new(two_handler_config(VotePolicy::Any), &bus, source);
    engine.create(0).expect("create");

    // Both votes flip before the engine pumps.
    bus.publish(FeedEvent::NotificationCount(4));
    bus.publish(FeedEvent::Screen { on: false });
    let output = engine.pump(10).expect("pump");

    assert_eq!(output.trace.active_votes, 2);
    assert_eq!(observed.starts.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_sensor_is_reported_to_owner() {
    let bus = FeedBus::new();
    let mut engine = ActiveModeEngine::new(ActiveModeConfig::default_tuning(), &bus, MissingSensor);
    engine.create(0).expect("nothing votes yet");

    let err = engine
        .on_notification_count_changed(1, 5)
        .expect_err("sensor is missing");
    assert_eq!(err, EngineError::SensorUnavailable);
    assert_eq!(err.to_string(), "motion sensor unavailable");
    assert_eq!(engine.state(), EngineStateId::Idle);
}

#[test]
fn shared_engine_delivers_wake_to_every_sink() {
    let bus = FeedBus::new();
    let shared = SharedEngine::new(ActiveModeEngine::new(
        ActiveModeConfig::default_tuning(),
        &bus,
        TallySource::default(),
    ));

    let hits = Arc::new(AtomicU32::new(0));
    for _ in 0..2 {
        let hits = Arc::clone(&hits);
        shared.register_wake_sink(move |request: &WakeRequest| {
            assert_eq!(
                request.shake().map(|(handler, _)| handler),
                Some(HandlerKind::WithoutNotifications)
            );
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    shared.create(0).expect("create");
    shared.on_notification_count_changed(1, 0).expect("pump");

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for sample in shake(0) {
                let _ = shared.on_sample(sample);
            }
        });
    });

    assert_eq!(hits.load(Ordering::SeqCst), 2);
    let _ = shared.stop(2_000);
    assert_eq!(shared.state(), EngineStateId::Idle);
}
