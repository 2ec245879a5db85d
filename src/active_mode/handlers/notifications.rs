use crate::active_mode::{
    feeds::{ConfigChange, FeedEvent},
    types::HandlerKind,
};

use super::HandlerPolicy;

/// Listens while there are pending notifications, or always when the user
/// opted into waking without them.
pub struct WithoutNotificationsPolicy {
    without_notifications: bool,
    notification_count: usize,
}

impl WithoutNotificationsPolicy {
    pub fn new(without_notifications: bool) -> Self {
        Self {
            without_notifications,
            notification_count: 0,
        }
    }
}

impl HandlerPolicy for WithoutNotificationsPolicy {
    fn kind(&self) -> HandlerKind {
        HandlerKind::WithoutNotifications
    }

    fn apply(&mut self, event: &FeedEvent) {
        match *event {
            FeedEvent::Config(ConfigChange::WithoutNotifications(enabled)) => {
                self.without_notifications = enabled;
            }
            FeedEvent::NotificationCount(count) => self.notification_count = count,
            _ => {}
        }
    }

    fn is_active(&self) -> bool {
        self.without_notifications || self.notification_count > 0
    }
}
