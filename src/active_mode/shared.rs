use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use super::{
    engine::{ActiveModeEngine, EngineOutput, WakeSink},
    feeds::{ConfigChange, FeedEvent},
    source::{EngineError, MotionSource},
    types::{EngineStateId, Sample},
};

/// Serializes the sensor delivery thread and the control thread onto one engine.
///
/// Every call holds the lock for its whole dispatch, so once [`stop`] returns
/// no sample is still inside a strategy. Wake sinks run under the same lock
/// and must not call back into this engine.
///
/// [`stop`]: SharedEngine::stop
pub struct SharedEngine<'bus, S: MotionSource> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<ActiveModeEngine<'bus, S>>>,
}

impl<'bus, S: MotionSource> SharedEngine<'bus, S> {
    pub fn new(engine: ActiveModeEngine<'bus, S>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(engine)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ActiveModeEngine<'bus, S>) -> R) -> R {
        self.inner.lock(|engine| f(&mut engine.borrow_mut()))
    }

    pub fn create(&self, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.with(|engine| engine.create(now_ms))
    }

    /// Tears the engine down; idempotent. Acts as the barrier with the
    /// delivery thread.
    pub fn stop(&self, now_ms: u64) -> EngineOutput {
        self.with(|engine| engine.destroy(now_ms))
    }

    pub fn on_sample(&self, sample: Sample) -> EngineOutput {
        self.with(|engine| engine.on_sample(sample))
    }

    pub fn on_config_changed(
        &self,
        change: ConfigChange,
        now_ms: u64,
    ) -> Result<EngineOutput, EngineError> {
        self.with(|engine| engine.on_config_changed(change, now_ms))
    }

    pub fn on_notification_count_changed(
        &self,
        count: usize,
        now_ms: u64,
    ) -> Result<EngineOutput, EngineError> {
        self.with(|engine| engine.on_notification_count_changed(count, now_ms))
    }

    pub fn on_notification_posted(&self, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.with(|engine| engine.on_notification_posted(now_ms))
    }

    /// Drains feeds and expires deadlines without a sample.
    pub fn pump(&self, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.with(|engine| engine.pump(now_ms))
    }

    pub fn publish(&self, event: FeedEvent, now_ms: u64) -> Result<EngineOutput, EngineError> {
        self.with(|engine| engine.publish(event, now_ms))
    }

    pub fn register_wake_sink(&self, sink: impl WakeSink + 'static) {
        self.with(|engine| engine.register_wake_sink(sink));
    }

    pub fn state(&self) -> EngineStateId {
        self.with(|engine| engine.state())
    }

    pub fn into_inner(self) -> ActiveModeEngine<'bus, S> {
        self.inner.into_inner().into_inner()
    }
}
