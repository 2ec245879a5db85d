use core::{cell::RefCell, mem::discriminant};

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    pubsub::{PubSubChannel, Subscriber, WaitResult},
};
use heapless::Vec;
use log::warn;

use super::source::EngineError;

pub const FEED_CAPACITY: usize = 16;
/// One slot per handler kind, one for the engine, one spare for observers.
pub const FEED_SUBSCRIBERS: usize = 6;
/// Distinct retained feeds: every `ConfigChange` kind plus every state feed.
const RETAINED_FEEDS: usize = 12;
pub const FEED_PUBLISHERS: usize = 1;

pub type FeedChannel = PubSubChannel<
    CriticalSectionRawMutex,
    FeedEvent,
    FEED_CAPACITY,
    FEED_SUBSCRIBERS,
    FEED_PUBLISHERS,
>;

pub type FeedSubscriber<'bus> = Subscriber<
    'bus,
    CriticalSectionRawMutex,
    FeedEvent,
    FEED_CAPACITY,
    FEED_SUBSCRIBERS,
    FEED_PUBLISHERS,
>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigChange {
    WithoutNotifications(bool),
    BatteryOutGuard(bool),
    InactiveTimeGuard(bool),
    InactiveTimeWindow { from_minute: u16, to_minute: u16 },
    WaveToWake(bool),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedEvent {
    Config(ConfigChange),
    NotificationCount(usize),
    Screen { on: bool },
    Battery { level: u8, plugged: bool },
    Clock { minute_of_day: u16 },
    Proximity { near: bool },
    /// A notification was posted or changed. Not retained.
    NotificationPosted,
}

impl FeedEvent {
    /// Events that describe current state, as opposed to one-off occurrences.
    pub fn is_retained(&self) -> bool {
        !matches!(self, FeedEvent::NotificationPosted)
    }

    fn same_feed(&self, other: &FeedEvent) -> bool {
        match (self, other) {
            (FeedEvent::Config(a), FeedEvent::Config(b)) => discriminant(a) == discriminant(b),
            _ => discriminant(self) == discriminant(other),
        }
    }
}

/// Fan-out of non-motion inputs. Every subscriber sees every event published
/// after it subscribed; a subscriber that falls more than [`FEED_CAPACITY`]
/// events behind loses the oldest ones.
///
/// The latest event of each retained feed is also kept, so a subscriber that
/// joins late can catch up with [`FeedBus::replay_latest`].
pub struct FeedBus {
    channel: FeedChannel,
    latest: Mutex<CriticalSectionRawMutex, RefCell<Vec<FeedEvent, RETAINED_FEEDS>>>,
}

impl FeedBus {
    pub const fn new() -> Self {
        Self {
            channel: PubSubChannel::new(),
            latest: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    pub fn publish(&self, event: FeedEvent) {
        if event.is_retained() {
            self.latest.lock(|latest| {
                let mut latest = latest.borrow_mut();
                if let Some(slot) = latest.iter_mut().find(|slot| slot.same_feed(&event)) {
                    *slot = event;
                } else if latest.push(event).is_err() {
                    warn!("active_mode: feed snapshot full, dropping {event:?}");
                }
            });
        }
        self.channel.immediate_publisher().publish_immediate(event);
    }

    /// Hands the latest event of every retained feed to `apply`, in the order
    /// the feeds first appeared.
    pub fn replay_latest(&self, mut apply: impl FnMut(FeedEvent)) {
        let latest = self.latest.lock(|latest| latest.borrow().clone());
        for event in latest {
            apply(event);
        }
    }

    pub fn subscribe(&self) -> Result<FeedSubscriber<'_>, EngineError> {
        self.channel.subscriber().map_err(|_| {
            warn!("active_mode: feed bus has no free subscriber slot");
            EngineError::SubscriptionsExhausted
        })
    }
}

impl Default for FeedBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands every pending event to `apply`; returns how many were delivered.
pub fn drain_pending(subscriber: &mut FeedSubscriber<'_>, mut apply: impl FnMut(FeedEvent)) -> usize {
    let mut delivered = 0;
    while let Some(result) = subscriber.try_next_message() {
        match result {
            WaitResult::Message(event) => {
                apply(event);
                delivered += 1;
            }
            WaitResult::Lagged(missed) => {
                warn!("active_mode: feed subscriber lagged missed={missed}");
            }
        }
    }
    delivered
}
