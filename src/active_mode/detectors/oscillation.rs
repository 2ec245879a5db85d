use crate::active_mode::{
    config::{ActiveModeConfig, OscillationConfig},
    cooldown::Cooldown,
    types::{Axis, RawMemory, Sample, ShakeDetail, ShakeEvent, StrategyKind},
    window::SampleWindow,
};

use super::ShakeStrategy;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Latch {
    #[default]
    Neutral,
    Positive,
    Negative,
}

#[derive(Clone, Copy, Debug, Default)]
struct AxisCrossings {
    latch: Latch,
    positive: u8,
    negative: u8,
}

/// Counts back-and-forth threshold crossings per axis.
pub struct OscillationDetector {
    tuning: OscillationConfig,
    memory: RawMemory,
    window: SampleWindow,
    cooldown: Cooldown,
    last_eval_ms: Option<u64>,
}

impl OscillationDetector {
    pub fn new(config: &ActiveModeConfig) -> Self {
        Self {
            tuning: config.oscillation,
            memory: RawMemory::new(),
            window: SampleWindow::new(config.window.span_ms),
            cooldown: Cooldown::new(config.cooldown.ignore_ms),
            last_eval_ms: None,
        }
    }

    fn due_for_evaluation(&self, now_ms: u64) -> bool {
        self.last_eval_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= self.tuning.check_interval_ms)
    }

    /// Recounts every axis over the whole window; latches start neutral each pass.
    fn count_crossings(&self) -> [AxisCrossings; 3] {
        let mut axes = [AxisCrossings::default(); 3];
        for delta in self.window.iter() {
            for axis in Axis::ALL {
                let value = delta.axis(axis);
                let state = &mut axes[axis.index()];
                if value > self.tuning.positive_threshold && state.latch != Latch::Positive {
                    state.positive = state.positive.saturating_add(1);
                    state.latch = Latch::Positive;
                } else if value < self.tuning.negative_threshold && state.latch != Latch::Negative
                {
                    state.negative = state.negative.saturating_add(1);
                    state.latch = Latch::Negative;
                }
            }
        }
        axes
    }

    fn fire(&mut self, now_ms: u64, axis: Axis, crossings: AxisCrossings) -> ShakeEvent {
        self.window.clear();
        self.memory.reset();
        self.cooldown.arm(now_ms);
        ShakeEvent {
            t_ms: now_ms,
            strategy: StrategyKind::Oscillation,
            detail: ShakeDetail::Oscillation {
                axis,
                positive: crossings.positive,
                negative: crossings.negative,
            },
        }
    }
}

impl ShakeStrategy for OscillationDetector {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Oscillation
    }

    fn on_sample(&mut self, sample: Sample) -> Option<ShakeEvent> {
        if self.cooldown.is_active(sample.t_ms) {
            return None;
        }

        let delta = self.memory.advance(sample)?;
        self.window.push(delta);

        if !self.due_for_evaluation(delta.t_ms) {
            return None;
        }
        self.last_eval_ms = Some(delta.t_ms);
        self.window.evict(delta.t_ms);

        let minimum = self.tuning.minimum_each_direction;
        let axes = self.count_crossings();
        let (axis, crossings) = Axis::ALL
            .into_iter()
            .map(|axis| (axis, axes[axis.index()]))
            .find(|(_, c)| c.positive >= minimum && c.negative >= minimum)?;

        Some(self.fire(delta.t_ms, axis, crossings))
    }

    fn window_len(&self) -> usize {
        self.window.len()
    }

    fn cooldown_active(&self, now_ms: u64) -> bool {
        self.cooldown.is_active(now_ms)
    }

    fn reset(&mut self) {
        self.memory.reset();
        self.window.clear();
        self.cooldown.reset();
        self.last_eval_ms = None;
    }
}
