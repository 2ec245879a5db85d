/// Minimum spacing between two accepted triggers.
#[derive(Clone, Copy, Debug)]
pub struct Cooldown {
    last_trigger_ms: Option<u64>,
    ignore_ms: u64,
}

impl Cooldown {
    pub const fn new(ignore_ms: u64) -> Self {
        Self {
            last_trigger_ms: None,
            ignore_ms,
        }
    }

    pub fn is_active(&self, now_ms: u64) -> bool {
        self.last_trigger_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.ignore_ms)
    }

    pub fn arm(&mut self, now_ms: u64) {
        self.last_trigger_ms = Some(now_ms);
    }

    pub fn reset(&mut self) {
        self.last_trigger_ms = None;
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }
}
