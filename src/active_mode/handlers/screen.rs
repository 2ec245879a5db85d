use crate::active_mode::{feeds::FeedEvent, types::HandlerKind};

use super::HandlerPolicy;

/// Listens only while the screen is off. The screen counts as on until told otherwise.
pub struct ScreenOffPolicy {
    screen_on: bool,
}

impl ScreenOffPolicy {
    pub fn new() -> Self {
        Self { screen_on: true }
    }
}

impl Default for ScreenOffPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerPolicy for ScreenOffPolicy {
    fn kind(&self) -> HandlerKind {
        HandlerKind::ScreenOff
    }

    fn apply(&mut self, event: &FeedEvent) {
        if let FeedEvent::Screen { on } = *event {
            self.screen_on = on;
        }
    }

    fn is_active(&self) -> bool {
        !self.screen_on
    }
}
