use core::fmt;

/// Requested delivery rate for the motion source.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SampleRate {
    Normal,
    Ui,
    #[default]
    Game,
    Fastest,
}

impl SampleRate {
    /// Nominal spacing between samples; `0` means as fast as the hardware allows.
    pub const fn nominal_period_ms(self) -> u64 {
        match self {
            SampleRate::Normal => 200,
            SampleRate::Ui => 60,
            SampleRate::Game => 20,
            SampleRate::Fastest => 0,
        }
    }
}

/// When the motion source runs while the engine is attached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MotionDuty {
    /// Running for as long as the combined vote is true.
    #[default]
    Continuous,
    /// Armed by the vote; running only within a notification ping or while
    /// plugged in with active charging.
    OnDemand,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineError {
    /// The motion source does not exist or refused to start.
    SensorUnavailable,
    /// The feed bus has no free subscriber slot left.
    SubscriptionsExhausted,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorUnavailable => write!(f, "motion sensor unavailable"),
            Self::SubscriptionsExhausted => write!(f, "feed subscriptions exhausted"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Hardware (or replay) accelerometer driver.
///
/// Samples are pushed into the engine by whoever owns the delivery thread;
/// the source itself only needs to be switched on and off. `stop` must be
/// idempotent and must not return while a sample callback is still running.
pub trait MotionSource: Send {
    fn start(&mut self, rate: SampleRate) -> Result<(), EngineError>;
    fn stop(&mut self);
}

impl<T: MotionSource + ?Sized> MotionSource for Box<T> {
    fn start(&mut self, rate: SampleRate) -> Result<(), EngineError> {
        (**self).start(rate)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
