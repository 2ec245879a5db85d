mod oscillation;
mod ratio;

pub use oscillation::OscillationDetector;
pub use ratio::RatioDetector;

use super::{
    config::ActiveModeConfig,
    types::{Sample, ShakeEvent, StrategyKind},
};

/// A shake detection algorithm fed one raw sample at a time.
///
/// Each instance owns its window, raw-sample memory and cooldown. A fired
/// event arms the cooldown; samples arriving while it is active are dropped
/// before any other processing.
pub trait ShakeStrategy: Send {
    fn kind(&self) -> StrategyKind;
    fn on_sample(&mut self, sample: Sample) -> Option<ShakeEvent>;
    fn window_len(&self) -> usize;
    fn cooldown_active(&self, now_ms: u64) -> bool;
    /// Forgets window, raw-sample memory and cooldown.
    fn reset(&mut self);
}

pub fn build_strategy(kind: StrategyKind, config: &ActiveModeConfig) -> Box<dyn ShakeStrategy> {
    match kind {
        StrategyKind::Oscillation => Box::new(OscillationDetector::new(config)),
        StrategyKind::Ratio => Box::new(RatioDetector::new(config)),
    }
}
