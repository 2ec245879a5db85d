use core::sync::atomic::{AtomicU32, Ordering};

/// Per-engine diagnostic counters. Values wrap on overflow.
#[derive(Default)]
pub struct EngineCounters {
    samples_seen: AtomicU32,
    shake_events: AtomicU32,
    wakes_requested: AtomicU32,
    wakes_suppressed_cooldown: AtomicU32,
    wakes_suppressed_pocket: AtomicU32,
    sessions_started: AtomicU32,
    start_failures: AtomicU32,
    proximity_gestures: AtomicU32,
    pings: AtomicU32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    pub samples_seen: u32,
    pub shake_events: u32,
    pub wakes_requested: u32,
    pub wakes_suppressed_cooldown: u32,
    pub wakes_suppressed_pocket: u32,
    pub sessions_started: u32,
    pub start_failures: u32,
    pub proximity_gestures: u32,
    pub pings: u32,
}

impl EngineCounters {
    pub const fn new() -> Self {
        Self {
            samples_seen: AtomicU32::new(0),
            shake_events: AtomicU32::new(0),
            wakes_requested: AtomicU32::new(0),
            wakes_suppressed_cooldown: AtomicU32::new(0),
            wakes_suppressed_pocket: AtomicU32::new(0),
            sessions_started: AtomicU32::new(0),
            start_failures: AtomicU32::new(0),
            proximity_gestures: AtomicU32::new(0),
            pings: AtomicU32::new(0),
        }
    }

    pub fn record_sample(&self) {
        self.samples_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_shakes(&self, count: u32) {
        self.shake_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_gestures(&self, count: u32) {
        self.proximity_gestures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_ping(&self) {
        self.pings.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wake(&self) {
        self.wakes_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cooldown_suppression(&self) {
        self.wakes_suppressed_cooldown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pocket_suppression(&self) {
        self.wakes_suppressed_pocket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            samples_seen: self.samples_seen.load(Ordering::Relaxed),
            shake_events: self.shake_events.load(Ordering::Relaxed),
            wakes_requested: self.wakes_requested.load(Ordering::Relaxed),
            wakes_suppressed_cooldown: self.wakes_suppressed_cooldown.load(Ordering::Relaxed),
            wakes_suppressed_pocket: self.wakes_suppressed_pocket.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            start_failures: self.start_failures.load(Ordering::Relaxed),
            proximity_gestures: self.proximity_gestures.load(Ordering::Relaxed),
            pings: self.pings.load(Ordering::Relaxed),
        }
    }
}
