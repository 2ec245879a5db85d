use heapless::Vec;

use crate::active_mode::{
    config::ActiveModeConfig,
    handlers::{
        BatteryOutPolicy, Handler, HandlerPolicy, InactiveTimePolicy, ScreenOffPolicy,
        WithoutNotificationsPolicy,
    },
    types::{HandlerKind, StrategyKind},
};

pub const MAX_HANDLERS: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HandlerRegistration {
    pub kind: HandlerKind,
    pub enabled: bool,
    pub strategy: Option<StrategyKind>,
}

pub fn handler_registry(config: &ActiveModeConfig) -> [HandlerRegistration; MAX_HANDLERS] {
    let handlers = &config.handlers;
    [
        HandlerRegistration {
            kind: HandlerKind::WithoutNotifications,
            enabled: handlers.without_notifications.enabled,
            strategy: handlers.without_notifications.strategy,
        },
        HandlerRegistration {
            kind: HandlerKind::ScreenOff,
            enabled: handlers.screen_off.enabled,
            strategy: handlers.screen_off.strategy,
        },
        HandlerRegistration {
            kind: HandlerKind::BatteryOut,
            enabled: handlers.battery_out.enabled,
            strategy: handlers.battery_out.strategy,
        },
        HandlerRegistration {
            kind: HandlerKind::InactiveTime,
            enabled: handlers.inactive_time.enabled,
            strategy: handlers.inactive_time.strategy,
        },
    ]
}

fn build_policy(kind: HandlerKind, config: &ActiveModeConfig) -> Box<dyn HandlerPolicy> {
    let handlers = &config.handlers;
    match kind {
        HandlerKind::WithoutNotifications => Box::new(WithoutNotificationsPolicy::new(
            handlers.without_notifications.without_notifications,
        )),
        HandlerKind::ScreenOff => Box::new(ScreenOffPolicy::new()),
        HandlerKind::BatteryOut => Box::new(BatteryOutPolicy::new(
            handlers.battery_out.feature_enabled,
            handlers.battery_out.low_level,
        )),
        HandlerKind::InactiveTime => Box::new(InactiveTimePolicy::new(
            handlers.inactive_time.feature_enabled,
            handlers.inactive_time.from_minute,
            handlers.inactive_time.to_minute,
        )),
    }
}

/// Builds one handler per enabled registration, in registry order.
pub fn build_handlers<'bus>(config: &ActiveModeConfig) -> Vec<Handler<'bus>, MAX_HANDLERS> {
    let mut handlers = Vec::new();
    for registration in handler_registry(config)
        .into_iter()
        .filter(|registration| registration.enabled)
    {
        let handler = Handler::new(
            build_policy(registration.kind, config),
            registration.strategy,
        );
        // The registry never yields more than MAX_HANDLERS entries.
        let _ = handlers.push(handler);
    }
    handlers
}
