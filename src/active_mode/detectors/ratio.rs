use crate::active_mode::{
    config::{ActiveModeConfig, RatioConfig},
    cooldown::Cooldown,
    types::{RawMemory, Sample, ShakeDetail, ShakeEvent, StrategyKind},
    window::SampleWindow,
};

use super::ShakeStrategy;

/// Fires on a single jolt that stands far above an otherwise quiet window.
pub struct RatioDetector {
    tuning: RatioConfig,
    memory: RawMemory,
    window: SampleWindow,
    cooldown: Cooldown,
}

impl RatioDetector {
    pub fn new(config: &ActiveModeConfig) -> Self {
        Self {
            tuning: config.ratio,
            memory: RawMemory::new(),
            window: SampleWindow::new(config.window.span_ms),
            cooldown: Cooldown::new(config.cooldown.ignore_ms),
        }
    }

    /// Mean of the per-axis mean absolute deltas over the whole window.
    fn window_average(&self) -> f32 {
        let (mut sum_x, mut sum_y, mut sum_z) = (0.0f32, 0.0f32, 0.0f32);
        for delta in self.window.iter() {
            sum_x += delta.dx.abs();
            sum_y += delta.dy.abs();
            sum_z += delta.dz.abs();
        }
        let n = self.window.len() as f32;
        (sum_x / n + sum_y / n + sum_z / n) / 3.0
    }
}

impl ShakeStrategy for RatioDetector {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ratio
    }

    fn on_sample(&mut self, sample: Sample) -> Option<ShakeEvent> {
        if self.cooldown.is_active(sample.t_ms) {
            return None;
        }

        let delta = self.memory.advance(sample)?;
        self.window.push(delta);
        self.window.evict(delta.t_ms);

        if self.window.len() < usize::from(self.tuning.min_points) {
            return None;
        }

        let average = self.window_average();
        // Only the x component of the latest delta feeds the peak; y and z
        // jolts are invisible here. Kept so tuning matches deployed devices.
        let peak = (delta.dx.abs() + delta.dx.abs() + delta.dx.abs()) / 3.0;
        let ratio = peak / average;

        let fired = ratio.abs() > self.tuning.ratio_min
            && (peak - average).abs() > self.tuning.delta_min
            && average <= self.tuning.quiet_max;
        if !fired {
            return None;
        }

        // The window survives a fire; only memory and cooldown move.
        self.memory.reset();
        self.cooldown.arm(delta.t_ms);
        Some(ShakeEvent {
            t_ms: delta.t_ms,
            strategy: StrategyKind::Ratio,
            detail: ShakeDetail::Ratio {
                ratio_milli: to_milli(ratio),
                average_milli: to_milli(average),
            },
        })
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
    }
}

fn to_milli(value: f32) -> i32 {
    let scaled = value * 1_000.0;
    if scaled.is_finite() {
        scaled.clamp(i32::MIN as f32, i32::MAX as f32) as i32
    } else if scaled.is_sign_negative() {
        i32::MIN
    } else {
        i32::MAX
    }
}
