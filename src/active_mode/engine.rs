use heapless::Vec;
use log::{debug, info, warn};
use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{
    config::ActiveModeConfig,
    cooldown::Cooldown,
    counters::{EngineCounters, Snapshot},
    detectors::{build_strategy, ShakeStrategy},
    feeds::{drain_pending, ConfigChange, FeedBus, FeedEvent, FeedSubscriber, FEED_CAPACITY},
    handlers::Handler,
    proximity::ProximityTracker,
    registry::{build_handlers, MAX_HANDLERS},
    source::{EngineError, MotionDuty, MotionSource},
    trace::EngineTraceSample,
    types::{
        ActionBuffer, EngineAction, EngineStateId, HandlerKind, HandlerVote, RejectReason,
        Sample, StrategyKind, WakeRequest, WakeTrigger,
    },
};

type SessionPlan = Vec<(HandlerKind, StrategyKind), MAX_HANDLERS>;

#[derive(Clone, Debug)]
enum ModeHsmEvent {
    Arm { now_ms: u64 },
    Disarm { now_ms: u64 },
    Attach { now_ms: u64, plan: SessionPlan },
    Detach { now_ms: u64, keep_armed: bool },
    StartFailed { now_ms: u64 },
    Sample(Sample),
    Proximity { near: bool, now_ms: u64 },
    WaveToWake(bool),
    Tick { now_ms: u64 },
}

#[derive(Default)]
struct DispatchContext {
    actions: ActionBuffer,
    shakes: u32,
    gestures: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EngineOutput {
    pub actions: ActionBuffer,
    pub trace: EngineTraceSample,
}

/// Receives accepted wake requests. Called on the thread that delivered the
/// sample or feed event, with the engine borrowed; a sink must not call back
/// into the engine.
pub trait WakeSink: Send {
    fn on_wake(&mut self, request: &WakeRequest);
}

impl<F> WakeSink for F
where
    F: FnMut(&WakeRequest) + Send,
{
    fn on_wake(&mut self, request: &WakeRequest) {
        self(request)
    }
}

/// What the motion source should be doing right now.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum SourceDemand {
    #[default]
    Off,
    Armed,
    Running,
}

/// Owns handlers, the motion source and the listening state machine.
///
/// Votes are re-read only when feed events are pumped, and combined once per
/// pump when at least one flipped. The source is started when demand rises
/// to running and stopped, before strategies are dropped, when it falls.
/// Notification pings and proximity wakes are deadlines checked against the
/// clock of whatever call comes next; there is no timer.
pub struct ActiveModeEngine<'bus, S: MotionSource> {
    machine: statig::blocking::StateMachine<ModeHsm>,
    config: ActiveModeConfig,
    bus: &'bus FeedBus,
    handlers: Vec<Handler<'bus>, MAX_HANDLERS>,
    feed: Option<FeedSubscriber<'bus>>,
    source: S,
    sinks: std::vec::Vec<Box<dyn WakeSink>>,
    counters: EngineCounters,
    created: bool,
    votes_dirty: bool,
    combined_vote: bool,
    plugged: bool,
    ping_until_ms: Option<u64>,
    demand: SourceDemand,
}

impl<'bus, S: MotionSource> ActiveModeEngine<'bus, S> {
    pub fn new(config: ActiveModeConfig, bus: &'bus FeedBus, source: S) -> Self {
        Self {
            machine: ModeHsm::new(config).state_machine(),
            handlers: build_handlers(&config),
            config,
            bus,
            feed: None,
            source,
            sinks: std::vec::Vec::new(),
            counters: EngineCounters::new(),
            created: false,
            votes_dirty: false,
            combined_vote: false,
            plugged: false,
            ping_until_ms: None,
            demand: SourceDemand::Off,
        }
    }

    pub fn register_wake_sink(&mut self, sink: impl WakeSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Subscribes every handler, catches up with the bus's latest values and
    /// evaluates the initial votes. Idempotent.
    pub fn create(&mut self, now_ms: u64) -> Result<EngineOutput, EngineError> {
        let mut context = DispatchContext::default();
        if !self.created {
            if let Err(err) = self.subscribe_all() {
                self.unsubscribe_all();
                return Err(err);
            }
            self.created = true;
            self.votes_dirty = true;
            let bus = self.bus;
            bus.replay_latest(|event| {
                let _ = self.apply_engine_event(event, now_ms, &mut context);
            });
            debug!(
                "active_mode: created handlers={} policy={:?} duty={:?}",
                self.handlers.len(),
                self.config.engine.vote_policy,
                self.config.engine.motion_duty
            );
        }
        self.pump_with(now_ms, context)
    }

    /// Stops listening and releases every subscription. Idempotent.
    pub fn destroy(&mut self, now_ms: u64) -> EngineOutput {
        let mut context = DispatchContext::default();
        self.combined_vote = false;
        self.ping_until_ms = None;
        self.demand = SourceDemand::Off;
        self.stop_source(now_ms, false, &mut context);
        self.machine
            .handle_with_context(&ModeHsmEvent::Disarm { now_ms }, &mut context);
        if self.created {
            self.unsubscribe_all();
            self.created = false;
            debug!("active_mode: destroyed");
        }
        self.finish(context)
    }

    pub fn on_sample(&mut self, sample: Sample) -> EngineOutput {
        self.counters.record_sample();
        let mut context = DispatchContext::default();
        self.advance_clock(sample.t_ms, &mut context);
        if self.created {
            // Expiry only lowers demand, so nothing can start here.
            let _ = self.reconcile(sample.t_ms, &mut context);
        }
        self.machine
            .handle_with_context(&ModeHsmEvent::Sample(sample), &mut context);
        self.deliver(&context);
        self.finish(context)
    }

    pub fn on_config_changed(
        &mut self,
        change: ConfigChange,
        now_ms: u64,
    ) -> Result<EngineOutput, EngineError> {
        self.publish(FeedEvent::Config(change), now_ms)
    }

    pub fn on_notification_count_changed(
        &mut self,
        count: usize,
        now_ms: u64,
    ) -> Result<EngineOutput, EngineError> {
        self.publish(FeedEvent::NotificationCount(count), now_ms)
    }

    /// A notification was posted or changed: an on-demand source runs for
    /// `engine.ping_ms` from `now_ms`, provided the combined vote is true.
    pub fn on_notification_posted(&mut self, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.publish(FeedEvent::NotificationPosted, now_ms)
    }

    pub fn publish(&mut self, event: FeedEvent, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.bus.publish(event);
        self.pump(now_ms)
    }

    /// Applies every pending feed event, advances the deadlines to `now_ms`,
    /// then reconciles the source with the resulting demand. A failed sensor
    /// start is not retried until demand drops and rises again.
    pub fn pump(&mut self, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.pump_with(now_ms, DispatchContext::default())
    }

    pub fn state(&self) -> EngineStateId {
        self.machine.inner().state_id
    }

    pub fn votes(&self) -> impl Iterator<Item = (HandlerKind, HandlerVote)> + '_ {
        self.handlers
            .iter()
            .map(|handler| (handler.kind(), handler.vote()))
    }

    pub fn counters(&self) -> Snapshot {
        self.counters.snapshot()
    }

    pub fn last_trace(&self) -> EngineTraceSample {
        self.decorate(self.machine.inner().last_trace)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn pump_with(
        &mut self,
        now_ms: u64,
        mut context: DispatchContext,
    ) -> Result<EngineOutput, EngineError> {
        if !self.created {
            return Ok(self.finish(context));
        }

        let mut flipped = false;
        for handler in self.handlers.iter_mut() {
            flipped |= handler.drain_feed().is_some();
        }
        let pinged = self.drain_engine_feed(now_ms, &mut context);

        if flipped || self.votes_dirty {
            self.votes_dirty = false;
            self.combined_vote = self
                .config
                .engine
                .vote_policy
                .combine(self.handlers.iter().map(Handler::vote));
        }
        if pinged {
            self.ping(now_ms);
        }

        self.advance_clock(now_ms, &mut context);
        let reconciled = self.reconcile(now_ms, &mut context);
        self.deliver(&context);
        reconciled?;
        Ok(self.finish(context))
    }

    fn subscribe_all(&mut self) -> Result<(), EngineError> {
        for handler in self.handlers.iter_mut() {
            handler.on_create(self.bus)?;
        }
        self.feed = Some(self.bus.subscribe()?);
        Ok(())
    }

    fn unsubscribe_all(&mut self) {
        for handler in self.handlers.iter_mut() {
            handler.on_destroy();
        }
        self.feed = None;
    }

    fn drain_engine_feed(&mut self, now_ms: u64, context: &mut DispatchContext) -> bool {
        let Some(feed) = self.feed.as_mut() else {
            return false;
        };
        let mut events = Vec::<FeedEvent, FEED_CAPACITY>::new();
        drain_pending(feed, |event| {
            let _ = events.push(event);
        });

        let mut pinged = false;
        for event in events {
            pinged |= self.apply_engine_event(event, now_ms, context);
        }
        pinged
    }

    /// Applies the feeds the engine itself consumes. Returns true on a ping.
    fn apply_engine_event(
        &mut self,
        event: FeedEvent,
        now_ms: u64,
        context: &mut DispatchContext,
    ) -> bool {
        match event {
            FeedEvent::Proximity { near } => {
                self.machine
                    .handle_with_context(&ModeHsmEvent::Proximity { near, now_ms }, context);
            }
            FeedEvent::Battery { plugged, .. } => {
                if self.plugged != plugged {
                    debug!("active_mode: plugged={plugged}");
                }
                self.plugged = plugged;
            }
            FeedEvent::Config(ConfigChange::WaveToWake(enabled)) => {
                self.machine
                    .handle_with_context(&ModeHsmEvent::WaveToWake(enabled), context);
            }
            FeedEvent::NotificationPosted => return true,
            _ => {}
        }
        false
    }

    fn ping(&mut self, now_ms: u64) {
        if !self.combined_vote || self.config.engine.motion_duty != MotionDuty::OnDemand {
            return;
        }
        let until = now_ms.saturating_add(self.config.engine.ping_ms);
        self.ping_until_ms = Some(until);
        self.counters.record_ping();
        debug!("active_mode: ping until_ms={until}");
    }

    fn advance_clock(&mut self, now_ms: u64, context: &mut DispatchContext) {
        self.machine
            .handle_with_context(&ModeHsmEvent::Tick { now_ms }, context);
        if self.ping_until_ms.is_some_and(|until| now_ms >= until) {
            self.ping_until_ms = None;
            debug!("active_mode: ping expired now_ms={now_ms}");
        }
    }

    fn wanted_demand(&self) -> SourceDemand {
        if !self.combined_vote {
            return SourceDemand::Off;
        }
        match self.config.engine.motion_duty {
            MotionDuty::Continuous => SourceDemand::Running,
            MotionDuty::OnDemand => {
                let charging = self.config.engine.active_charging && self.plugged;
                if charging || self.ping_until_ms.is_some() {
                    SourceDemand::Running
                } else {
                    SourceDemand::Armed
                }
            }
        }
    }

    fn reconcile(&mut self, now_ms: u64, context: &mut DispatchContext) -> Result<(), EngineError> {
        let target = self.wanted_demand();
        if target == self.demand {
            return Ok(());
        }
        self.demand = target;

        match target {
            SourceDemand::Off => {
                self.ping_until_ms = None;
                self.stop_source(now_ms, false, context);
                self.machine
                    .handle_with_context(&ModeHsmEvent::Disarm { now_ms }, context);
                debug!("active_mode: idle");
            }
            SourceDemand::Armed => {
                self.stop_source(now_ms, true, context);
                self.machine
                    .handle_with_context(&ModeHsmEvent::Arm { now_ms }, context);
                debug!("active_mode: armed");
            }
            SourceDemand::Running => {
                if self.config.engine.motion_duty == MotionDuty::OnDemand {
                    self.machine
                        .handle_with_context(&ModeHsmEvent::Arm { now_ms }, context);
                }
                self.start_source(now_ms, context)?;
            }
        }
        Ok(())
    }

    fn start_source(
        &mut self,
        now_ms: u64,
        context: &mut DispatchContext,
    ) -> Result<(), EngineError> {
        if self.state() == EngineStateId::Listening {
            return Ok(());
        }

        let rate = self.config.engine.sample_rate;
        if let Err(err) = self.source.start(rate) {
            self.counters.record_start_failure();
            self.machine
                .handle_with_context(&ModeHsmEvent::StartFailed { now_ms }, context);
            warn!("active_mode: sensor start failed rate={rate:?} err={err}");
            return Err(EngineError::SensorUnavailable);
        }

        let mut plan = SessionPlan::new();
        for handler in self.handlers.iter() {
            if let Some(strategy) = handler.strategy() {
                let _ = plan.push((handler.kind(), strategy));
            }
        }
        self.counters.record_session_started();
        debug!(
            "active_mode: listening rate={rate:?} strategies={}",
            plan.len()
        );
        self.machine
            .handle_with_context(&ModeHsmEvent::Attach { now_ms, plan }, context);
        Ok(())
    }

    fn stop_source(&mut self, now_ms: u64, keep_armed: bool, context: &mut DispatchContext) {
        if self.state() != EngineStateId::Listening {
            return;
        }
        // No sample may reach a strategy once the source has returned from stop.
        self.source.stop();
        self.machine.handle_with_context(
            &ModeHsmEvent::Detach { now_ms, keep_armed },
            context,
        );
    }

    fn deliver(&mut self, context: &DispatchContext) {
        self.counters.record_shakes(context.shakes);
        self.counters.record_gestures(context.gestures);
        for action in context.actions.iter() {
            match action {
                EngineAction::WakeRequested(request) => {
                    self.counters.record_wake();
                    info!(
                        "active_mode: wake requested t_ms={} trigger={:?}",
                        request.t_ms, request.trigger
                    );
                    for sink in self.sinks.iter_mut() {
                        sink.on_wake(request);
                    }
                }
                EngineAction::WakeSuppressed {
                    reason: RejectReason::CooldownActive,
                } => self.counters.record_cooldown_suppression(),
                EngineAction::WakeSuppressed {
                    reason: RejectReason::PocketVeto,
                } => self.counters.record_pocket_suppression(),
                _ => {}
            }
        }
    }

    fn decorate(&self, mut trace: EngineTraceSample) -> EngineTraceSample {
        trace.active_votes = self
            .handlers
            .iter()
            .filter(|handler| handler.vote().active)
            .count() as u8;
        trace
    }

    fn finish(&self, context: DispatchContext) -> EngineOutput {
        EngineOutput {
            actions: context.actions,
            trace: self.last_trace(),
        }
    }
}

impl<S: MotionSource> Drop for ActiveModeEngine<'_, S> {
    fn drop(&mut self) {
        if self.state() == EngineStateId::Listening {
            self.source.stop();
        }
    }
}

struct Session {
    handler: HandlerKind,
    strategy: Box<dyn ShakeStrategy>,
}

struct ModeHsm {
    config: ActiveModeConfig,
    sessions: Vec<Session, MAX_HANDLERS>,
    wake_cooldown: Cooldown,
    proximity: ProximityTracker,
    state_id: EngineStateId,
    last_trace: EngineTraceSample,
}

impl ModeHsm {
    fn new(config: ActiveModeConfig) -> Self {
        Self {
            config,
            sessions: Vec::new(),
            wake_cooldown: Cooldown::new(config.cooldown.ignore_ms),
            proximity: ProximityTracker::new(config.proximity),
            state_id: EngineStateId::Idle,
            last_trace: EngineTraceSample::default(),
        }
    }

    fn attach(&mut self, plan: &SessionPlan) {
        self.sessions.clear();
        for &(handler, kind) in plan.iter() {
            let session = Session {
                handler,
                strategy: build_strategy(kind, &self.config),
            };
            let _ = self.sessions.push(session);
        }
    }

    fn enter(&mut self, state_id: EngineStateId, now_ms: u64) {
        self.state_id = state_id;
        self.update_trace(now_ms, RejectReason::None);
    }

    fn update_trace(&mut self, now_ms: u64, reason: RejectReason) {
        let window_len = self
            .sessions
            .iter()
            .map(|session| session.strategy.window_len())
            .max()
            .unwrap_or(0);
        let cooldown_active = self.wake_cooldown.is_active(now_ms)
            || self
                .sessions
                .iter()
                .any(|session| session.strategy.cooldown_active(now_ms));
        self.last_trace = EngineTraceSample {
            now_ms,
            state_id: self.state_id,
            reject_reason: reason,
            window_len: window_len.min(u16::MAX as usize) as u16,
            cooldown_active: u8::from(cooldown_active),
            active_votes: 0,
            pocket_near: u8::from(self.proximity.is_near()),
        };
    }

    /// Applies the engine-wide cooldown; returns false when suppressed.
    fn claim_wake(&mut self, context: &mut DispatchContext, t_ms: u64) -> bool {
        if self.wake_cooldown.is_active(t_ms) {
            context.actions.push(EngineAction::WakeSuppressed {
                reason: RejectReason::CooldownActive,
            });
            return false;
        }
        self.wake_cooldown.arm(t_ms);
        true
    }

    fn evaluate_sample(&mut self, context: &mut DispatchContext, sample: Sample) {
        let mut reason = RejectReason::None;
        for index in 0..self.sessions.len() {
            let session = &mut self.sessions[index];
            let handler = session.handler;
            let Some(shake) = session.strategy.on_sample(sample) else {
                continue;
            };
            context.shakes += 1;

            if !self.claim_wake(context, shake.t_ms) {
                reason = RejectReason::CooldownActive;
                continue;
            }

            // Motion never wakes a device that is in a pocket.
            if self.config.proximity.pocket_guard && self.proximity.is_near() {
                reason = RejectReason::PocketVeto;
                context.actions.push(EngineAction::WakeSuppressed { reason });
                continue;
            }

            context
                .actions
                .push(EngineAction::WakeRequested(WakeRequest {
                    t_ms: shake.t_ms,
                    trigger: WakeTrigger::Shake { handler, shake },
                }));
        }
        self.update_trace(sample.t_ms, reason);
    }

    fn fire_due_gesture(&mut self, context: &mut DispatchContext, now_ms: u64) {
        let Some(gesture) = self.proximity.poll(now_ms) else {
            return;
        };
        context.gestures += 1;
        debug!("active_mode: proximity gesture={gesture:?} now_ms={now_ms}");

        let reason = if self.claim_wake(context, now_ms) {
            context
                .actions
                .push(EngineAction::WakeRequested(WakeRequest {
                    t_ms: now_ms,
                    trigger: WakeTrigger::Proximity(gesture),
                }));
            RejectReason::None
        } else {
            RejectReason::CooldownActive
        };
        self.update_trace(now_ms, reason);
    }
}

#[state_machine(initial = "State::idle()")]
impl ModeHsm {
    #[state(superstate = "running")]
    fn idle(&mut self, context: &mut DispatchContext, event: &ModeHsmEvent) -> Outcome<State> {
        match event {
            ModeHsmEvent::Arm { now_ms } => {
                self.proximity.attach(*now_ms);
                self.enter(EngineStateId::Armed, *now_ms);
                Transition(State::armed())
            }
            ModeHsmEvent::Attach { now_ms, plan } => {
                self.proximity.attach(*now_ms);
                self.attach(plan);
                self.enter(EngineStateId::Listening, *now_ms);
                context.actions.push(EngineAction::SourceStarted);
                Transition(State::listening())
            }
            ModeHsmEvent::Sample(sample) => {
                self.update_trace(sample.t_ms, RejectReason::SourceIdle);
                Handled
            }
            ModeHsmEvent::StartFailed { now_ms } => {
                self.update_trace(*now_ms, RejectReason::SensorUnavailable);
                Handled
            }
            ModeHsmEvent::Detach { .. } | ModeHsmEvent::Disarm { .. } => Handled,
            ModeHsmEvent::Proximity { .. }
            | ModeHsmEvent::WaveToWake(_)
            | ModeHsmEvent::Tick { .. } => Super,
        }
    }

    #[state(superstate = "attached")]
    fn armed(&mut self, context: &mut DispatchContext, event: &ModeHsmEvent) -> Outcome<State> {
        match event {
            ModeHsmEvent::Attach { now_ms, plan } => {
                self.attach(plan);
                self.enter(EngineStateId::Listening, *now_ms);
                context.actions.push(EngineAction::SourceStarted);
                Transition(State::listening())
            }
            ModeHsmEvent::Disarm { now_ms } => {
                self.proximity.detach();
                self.enter(EngineStateId::Idle, *now_ms);
                Transition(State::idle())
            }
            ModeHsmEvent::Sample(sample) => {
                self.update_trace(sample.t_ms, RejectReason::SourceIdle);
                Handled
            }
            ModeHsmEvent::StartFailed { now_ms } => {
                self.update_trace(*now_ms, RejectReason::SensorUnavailable);
                Handled
            }
            ModeHsmEvent::Arm { .. } | ModeHsmEvent::Detach { .. } => Handled,
            ModeHsmEvent::Proximity { .. }
            | ModeHsmEvent::WaveToWake(_)
            | ModeHsmEvent::Tick { .. } => Super,
        }
    }

    #[state(superstate = "attached")]
    fn listening(
        &mut self,
        context: &mut DispatchContext,
        event: &ModeHsmEvent,
    ) -> Outcome<State> {
        match event {
            ModeHsmEvent::Sample(sample) => {
                self.evaluate_sample(context, *sample);
                Handled
            }
            ModeHsmEvent::Detach { now_ms, keep_armed } => {
                self.sessions.clear();
                context.actions.push(EngineAction::SourceStopped);
                if *keep_armed {
                    self.enter(EngineStateId::Armed, *now_ms);
                    Transition(State::armed())
                } else {
                    self.proximity.detach();
                    self.enter(EngineStateId::Idle, *now_ms);
                    Transition(State::idle())
                }
            }
            ModeHsmEvent::Arm { .. }
            | ModeHsmEvent::Disarm { .. }
            | ModeHsmEvent::Attach { .. }
            | ModeHsmEvent::StartFailed { .. } => Handled,
            ModeHsmEvent::Proximity { .. }
            | ModeHsmEvent::WaveToWake(_)
            | ModeHsmEvent::Tick { .. } => Super,
        }
    }

    /// Armed or listening: proximity programs are matched.
    #[superstate(superstate = "running")]
    fn attached(
        &mut self,
        context: &mut DispatchContext,
        event: &ModeHsmEvent,
    ) -> Outcome<State> {
        match event {
            ModeHsmEvent::Proximity { near, now_ms } => {
                self.proximity.on_reading(*near, *now_ms);
                self.last_trace.pocket_near = u8::from(*near);
                self.fire_due_gesture(context, *now_ms);
                Handled
            }
            ModeHsmEvent::Tick { now_ms } => {
                self.fire_due_gesture(context, *now_ms);
                Handled
            }
            _ => Super,
        }
    }

    #[superstate]
    fn running(&mut self, context: &mut DispatchContext, event: &ModeHsmEvent) -> Outcome<State> {
        let _ = context;
        match event {
            ModeHsmEvent::Proximity { near, now_ms } => {
                self.proximity.on_reading(*near, *now_ms);
                self.last_trace.pocket_near = u8::from(*near);
                Handled
            }
            ModeHsmEvent::WaveToWake(enabled) => {
                self.proximity.set_wave_to_wake(*enabled);
                Handled
            }
            _ => Handled,
        }
    }
}

#[cfg(test)]
mod tests;
