use super::{
    source::{MotionDuty, SampleRate},
    types::{StrategyKind, VotePolicy},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowConfig {
    pub span_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CooldownConfig {
    pub ignore_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OscillationConfig {
    pub check_interval_ms: u64,
    pub positive_threshold: f32,
    pub negative_threshold: f32,
    pub minimum_each_direction: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatioConfig {
    pub min_points: u16,
    pub ratio_min: f32,
    pub delta_min: f32,
    pub quiet_max: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: SampleRate,
    pub vote_policy: VotePolicy,
    pub motion_duty: MotionDuty,
    /// How long a posted notification keeps an on-demand source running.
    pub ping_ms: u64,
    /// Keeps an on-demand source running while the device is plugged in.
    pub active_charging: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityConfig {
    pub pocket_guard: bool,
    pub pocket_delay_ms: u64,
    pub wave_to_wake: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NotificationHandlerConfig {
    pub enabled: bool,
    pub strategy: Option<StrategyKind>,
    pub without_notifications: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenHandlerConfig {
    pub enabled: bool,
    pub strategy: Option<StrategyKind>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatteryHandlerConfig {
    pub enabled: bool,
    pub strategy: Option<StrategyKind>,
    pub feature_enabled: bool,
    pub low_level: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InactiveTimeHandlerConfig {
    pub enabled: bool,
    pub strategy: Option<StrategyKind>,
    pub feature_enabled: bool,
    pub from_minute: u16,
    pub to_minute: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandlersConfig {
    pub without_notifications: NotificationHandlerConfig,
    pub screen_off: ScreenHandlerConfig,
    pub battery_out: BatteryHandlerConfig,
    pub inactive_time: InactiveTimeHandlerConfig,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveModeConfig {
    pub window: WindowConfig,
    pub cooldown: CooldownConfig,
    pub oscillation: OscillationConfig,
    pub ratio: RatioConfig,
    pub engine: EngineConfig,
    pub proximity: ProximityConfig,
    pub handlers: HandlersConfig,
}

impl ActiveModeConfig {
    /// Stock tuning, identical to the shipped `config/active_mode.toml`.
    pub const fn default_tuning() -> Self {
        Self {
            window: WindowConfig { span_ms: 1_400 },
            cooldown: CooldownConfig { ignore_ms: 1_500 },
            oscillation: OscillationConfig {
                check_interval_ms: 200,
                positive_threshold: 2.0,
                negative_threshold: -2.0,
                minimum_each_direction: 7,
            },
            ratio: RatioConfig {
                min_points: 11,
                ratio_min: 6.0,
                delta_min: 0.5,
                quiet_max: 0.3,
            },
            engine: EngineConfig {
                sample_rate: SampleRate::Game,
                vote_policy: VotePolicy::Any,
                motion_duty: MotionDuty::Continuous,
                ping_ms: 3_000,
                active_charging: false,
            },
            proximity: ProximityConfig {
                pocket_guard: true,
                pocket_delay_ms: 4_000,
                wave_to_wake: false,
            },
            handlers: HandlersConfig {
                without_notifications: NotificationHandlerConfig {
                    enabled: true,
                    strategy: Some(StrategyKind::Oscillation),
                    without_notifications: false,
                },
                screen_off: ScreenHandlerConfig {
                    enabled: false,
                    strategy: None,
                },
                battery_out: BatteryHandlerConfig {
                    enabled: false,
                    strategy: None,
                    feature_enabled: false,
                    low_level: 15,
                },
                inactive_time: InactiveTimeHandlerConfig {
                    enabled: false,
                    strategy: None,
                    feature_enabled: false,
                    from_minute: 1_380,
                    to_minute: 420,
                },
            },
        }
    }
}

impl Default for ActiveModeConfig {
    fn default() -> Self {
        *active_config()
    }
}

include!(concat!(env!("OUT_DIR"), "/active_mode_config.rs"));

pub fn active_config() -> &'static ActiveModeConfig {
    &ACTIVE_MODE_CONFIG
}
