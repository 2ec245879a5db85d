mod battery;
mod inactive_time;
mod notifications;
mod screen;

pub use battery::BatteryOutPolicy;
pub use inactive_time::InactiveTimePolicy;
pub use notifications::WithoutNotificationsPolicy;
pub use screen::ScreenOffPolicy;

use log::debug;

use super::{
    feeds::{drain_pending, FeedBus, FeedEvent, FeedSubscriber},
    source::EngineError,
    types::{HandlerKind, HandlerVote, StrategyKind},
};

/// Decides from non-motion inputs whether motion sensing is wanted.
///
/// `is_active` must be a pure function of what `apply` has seen so far, and
/// applying the same event twice must not change the result.
pub trait HandlerPolicy: Send {
    fn kind(&self) -> HandlerKind;
    fn apply(&mut self, event: &FeedEvent);
    fn is_active(&self) -> bool;
}

/// A policy bound to its feed subscription and its shake strategy choice.
///
/// The subscription exists only between `on_create` and `on_destroy`, and
/// is released when the handler is dropped. Events published while the
/// handler is destroyed are caught up from the bus's latest values on the
/// next `on_create`.
pub struct Handler<'bus> {
    policy: Box<dyn HandlerPolicy>,
    strategy: Option<StrategyKind>,
    subscription: Option<FeedSubscriber<'bus>>,
    vote: HandlerVote,
}

impl<'bus> Handler<'bus> {
    pub fn new(policy: Box<dyn HandlerPolicy>, strategy: Option<StrategyKind>) -> Self {
        let vote = HandlerVote {
            active: policy.is_active(),
        };
        Self {
            policy,
            strategy,
            subscription: None,
            vote,
        }
    }

    pub fn kind(&self) -> HandlerKind {
        self.policy.kind()
    }

    pub fn strategy(&self) -> Option<StrategyKind> {
        self.strategy
    }

    pub fn vote(&self) -> HandlerVote {
        self.vote
    }

    pub fn is_created(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn on_create(&mut self, bus: &'bus FeedBus) -> Result<(), EngineError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        self.subscription = Some(bus.subscribe()?);
        let policy = &mut self.policy;
        bus.replay_latest(|event| policy.apply(&event));
        self.vote = HandlerVote {
            active: self.policy.is_active(),
        };
        debug!(
            "active_mode: handler created kind={:?} active={}",
            self.kind(),
            self.vote.active
        );
        Ok(())
    }

    pub fn on_destroy(&mut self) {
        if self.subscription.take().is_some() {
            debug!("active_mode: handler destroyed kind={:?}", self.kind());
        }
    }

    /// Applies pending feed events. Returns the new vote if it flipped.
    pub fn drain_feed(&mut self) -> Option<HandlerVote> {
        let subscription = self.subscription.as_mut()?;
        let policy = &mut self.policy;
        drain_pending(subscription, |event| policy.apply(&event));

        let active = self.policy.is_active();
        if active == self.vote.active {
            return None;
        }
        self.vote = HandlerVote { active };
        debug!(
            "active_mode: vote changed kind={:?} active={active}",
            self.kind()
        );
        Some(self.vote)
    }
}
