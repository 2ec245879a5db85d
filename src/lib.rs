//! Active-mode wake decision engine.
//!
//! Accelerometer samples are folded into per-handler shake detectors while at
//! least one policy handler votes for listening. An accepted shake, or a
//! proximity gesture, becomes a wake request delivered to every registered
//! sink.

pub mod active_mode;

pub use active_mode::{
    config::{active_config, ActiveModeConfig},
    detectors::{build_strategy, OscillationDetector, RatioDetector, ShakeStrategy},
    engine::{ActiveModeEngine, EngineOutput, WakeSink},
    feeds::{ConfigChange, FeedBus, FeedEvent},
    shared::SharedEngine,
    source::{EngineError, MotionDuty, MotionSource, SampleRate},
    types::{
        EngineAction, EngineStateId, HandlerKind, ProximityGesture, RejectReason, Sample,
        ShakeEvent, StrategyKind, VotePolicy, WakeRequest, WakeTrigger,
    },
};
