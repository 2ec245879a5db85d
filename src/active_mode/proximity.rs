use heapless::Deque;
use log::debug;

use super::{config::ProximityConfig, types::ProximityGesture};

/// Longest program, in edges.
const HISTORY_LEN: usize = 4;

/// One proximity state a program expects, held strictly longer than `min_ms`
/// and strictly shorter than `max_ms`. The last step only checks the state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Step {
    near: bool,
    min_ms: u64,
    max_ms: u64,
}

impl Step {
    const fn new(near: bool, min_ms: u64, max_ms: u64) -> Self {
        Self {
            near,
            min_ms,
            max_ms,
        }
    }
}

const WAVE_TO_WAKE: [Step; 4] = [
    Step::new(true, 200, u64::MAX),
    Step::new(false, 0, 1_500),
    Step::new(true, 0, 1_500),
    Step::new(false, 0, 0),
];

const fn pocket_program(delay_ms: u64) -> [Step; 2] {
    [Step::new(true, delay_ms, u64::MAX), Step::new(false, 0, 0)]
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Edge {
    near: bool,
    t_ms: u64,
}

/// Returns the wake delay when the newest edges match `steps`.
fn fits(steps: &[Step], history: &Deque<Edge, HISTORY_LEN>) -> Option<u64> {
    let skip = history.len().checked_sub(steps.len())?;
    let mut edges = history.iter().skip(skip);
    let mut previous = *edges.next()?;

    for (step, edge) in steps.iter().zip(edges) {
        let held = edge.t_ms.saturating_sub(previous.t_ms);
        if previous.near != step.near || held <= step.min_ms || held >= step.max_ms {
            return None;
        }
        previous = *edge;
    }

    let last = steps.last()?;
    (previous.near == last.near).then_some(last.min_ms)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PendingWake {
    pub due_ms: u64,
    pub gesture: ProximityGesture,
}

/// Matches proximity edges against the pocket and wave-to-wake programs.
///
/// History exists only while attached. A matched program schedules a wake
/// that any later edge cancels; the engine polls it with its own clock.
pub struct ProximityTracker {
    config: ProximityConfig,
    history: Deque<Edge, HISTORY_LEN>,
    near: bool,
    attached: bool,
    first_change: bool,
    pending: Option<PendingWake>,
}

impl ProximityTracker {
    pub const fn new(config: ProximityConfig) -> Self {
        Self {
            config,
            history: Deque::new(),
            near: false,
            attached: false,
            first_change: false,
            pending: None,
        }
    }

    pub fn is_near(&self) -> bool {
        self.near
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn pending(&self) -> Option<PendingWake> {
        self.pending
    }

    pub fn set_wave_to_wake(&mut self, enabled: bool) {
        if self.config.wave_to_wake != enabled {
            debug!("active_mode: wave_to_wake={enabled}");
        }
        self.config.wave_to_wake = enabled;
    }

    /// Starts matching; history is seeded with a far edge at `now_ms`.
    pub fn attach(&mut self, now_ms: u64) {
        self.history.clear();
        let _ = self.history.push_back(Edge {
            near: false,
            t_ms: now_ms,
        });
        self.pending = None;
        self.attached = true;
        self.first_change = true;
    }

    pub fn detach(&mut self) {
        self.history.clear();
        self.pending = None;
        self.attached = false;
    }

    /// Records a reading. While detached only the near state is kept.
    pub fn on_reading(&mut self, near: bool, now_ms: u64) {
        let changed = self.near != near || self.first_change;
        self.near = near;
        if !self.attached || !changed {
            return;
        }

        if self.history.is_full() {
            let _ = self.history.pop_front();
        }
        let _ = self.history.push_back(Edge { near, t_ms: now_ms });
        self.pending = None;

        // The first edge after attaching skips the pocket delay.
        let pocket_delay = if self.first_change {
            0
        } else {
            self.config.pocket_delay_ms
        };
        self.first_change = false;

        let pocket = pocket_program(pocket_delay);
        self.schedule(fits(&pocket, &self.history), now_ms, ProximityGesture::Pocket);
        if self.config.wave_to_wake {
            self.schedule(
                fits(&WAVE_TO_WAKE, &self.history),
                now_ms,
                ProximityGesture::WaveToWake,
            );
        }
    }

    fn schedule(&mut self, delay: Option<u64>, now_ms: u64, gesture: ProximityGesture) {
        let Some(delay) = delay else {
            return;
        };
        let due_ms = now_ms.saturating_add(delay);
        if self.pending.is_some_and(|pending| pending.due_ms <= due_ms) {
            return;
        }
        self.pending = Some(PendingWake { due_ms, gesture });
    }

    /// Takes the scheduled wake once it is due; matching restarts from scratch.
    pub fn poll(&mut self, now_ms: u64) -> Option<ProximityGesture> {
        let pending = self.pending.filter(|pending| now_ms >= pending.due_ms)?;
        self.pending = None;
        self.history.clear();
        Some(pending.gesture)
    }
}
