use heapless::Deque;
use log::warn;

pub use super::config::WINDOW_CAPACITY;
use super::types::Delta;

/// Time-bounded buffer of recent deltas, oldest first.
///
/// The config compiler rejects spans that cannot fit [`WINDOW_CAPACITY`] at
/// the configured sample rate. A runtime-built config can still overrun it,
/// in which case the oldest entry is dropped and a warning is logged once.
pub struct SampleWindow {
    span_ms: u64,
    deltas: Deque<Delta, WINDOW_CAPACITY>,
    overrun_logged: bool,
}

impl SampleWindow {
    pub const fn new(span_ms: u64) -> Self {
        Self {
            span_ms,
            deltas: Deque::new(),
            overrun_logged: false,
        }
    }

    pub fn push(&mut self, delta: Delta) {
        if self.deltas.is_full() {
            if !self.overrun_logged {
                warn!(
                    "active_mode: window full span_ms={} capacity={WINDOW_CAPACITY}",
                    self.span_ms
                );
                self.overrun_logged = true;
            }
            let _ = self.deltas.pop_front();
        }
        // Cannot fail: a slot was freed above when full.
        let _ = self.deltas.push_back(delta);
    }

    /// Drops every delta stamped before `now_ms - span`.
    pub fn evict(&mut self, now_ms: u64) {
        let oldest_allowed = now_ms.saturating_sub(self.span_ms);
        while self
            .deltas
            .front()
            .is_some_and(|delta| delta.t_ms < oldest_allowed)
        {
            let _ = self.deltas.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Delta> {
        self.deltas.iter()
    }

    pub fn latest(&self) -> Option<&Delta> {
        self.deltas.back()
    }
}
