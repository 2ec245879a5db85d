use crate::active_mode::{
    feeds::{ConfigChange, FeedEvent},
    types::HandlerKind,
};

use super::HandlerPolicy;

/// With the guard on, stops listening inside the `[from, to)` minute-of-day
/// window. The window may wrap midnight; equal bounds mean an empty window.
pub struct InactiveTimePolicy {
    guard_enabled: bool,
    from_minute: u16,
    to_minute: u16,
    minute_of_day: Option<u16>,
}

impl InactiveTimePolicy {
    pub fn new(guard_enabled: bool, from_minute: u16, to_minute: u16) -> Self {
        Self {
            guard_enabled,
            from_minute,
            to_minute,
            minute_of_day: None,
        }
    }

    fn inside_window(&self, minute: u16) -> bool {
        let (from, to) = (self.from_minute, self.to_minute);
        if from <= to {
            from <= minute && minute < to
        } else {
            minute >= from || minute < to
        }
    }
}

impl HandlerPolicy for InactiveTimePolicy {
    fn kind(&self) -> HandlerKind {
        HandlerKind::InactiveTime
    }

    fn apply(&mut self, event: &FeedEvent) {
        match *event {
            FeedEvent::Config(ConfigChange::InactiveTimeGuard(enabled)) => {
                self.guard_enabled = enabled;
            }
            FeedEvent::Config(ConfigChange::InactiveTimeWindow {
                from_minute,
                to_minute,
            }) => {
                self.from_minute = from_minute;
                self.to_minute = to_minute;
            }
            FeedEvent::Clock { minute_of_day } => self.minute_of_day = Some(minute_of_day),
            _ => {}
        }
    }

    fn is_active(&self) -> bool {
        if !self.guard_enabled {
            return true;
        }
        self.minute_of_day
            .is_none_or(|minute| !self.inside_window(minute))
    }
}
