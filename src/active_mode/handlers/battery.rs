use crate::active_mode::{
    feeds::{ConfigChange, FeedEvent},
    types::HandlerKind,
};

use super::HandlerPolicy;

/// With the guard on, stops listening once the battery drops to `low_level`
/// percent or below while unplugged.
pub struct BatteryOutPolicy {
    guard_enabled: bool,
    low_level: u8,
    level: Option<u8>,
    plugged: bool,
}

impl BatteryOutPolicy {
    pub fn new(guard_enabled: bool, low_level: u8) -> Self {
        Self {
            guard_enabled,
            low_level,
            level: None,
            plugged: false,
        }
    }
}

impl HandlerPolicy for BatteryOutPolicy {
    fn kind(&self) -> HandlerKind {
        HandlerKind::BatteryOut
    }

    fn apply(&mut self, event: &FeedEvent) {
        match *event {
            FeedEvent::Config(ConfigChange::BatteryOutGuard(enabled)) => {
                self.guard_enabled = enabled;
            }
            FeedEvent::Battery { level, plugged } => {
                self.level = Some(level);
                self.plugged = plugged;
            }
            _ => {}
        }
    }

    fn is_active(&self) -> bool {
        if !self.guard_enabled || self.plugged {
            return true;
        }
        // Unknown level: keep listening until the first battery report.
        self.level.is_none_or(|level| level > self.low_level)
    }
}
