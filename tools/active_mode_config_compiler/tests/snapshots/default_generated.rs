// @generated by active_mode_config_compiler. Do not edit.
pub const WINDOW_CAPACITY: usize = 2048;
pub static ACTIVE_MODE_CONFIG: ActiveModeConfig = ActiveModeConfig {
    window: WindowConfig { span_ms: 1400 },
    cooldown: CooldownConfig { ignore_ms: 1500 },
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
        ping_ms: 3000,
        active_charging: false,
    },
    proximity: ProximityConfig {
        pocket_guard: true,
        pocket_delay_ms: 4000,
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
            from_minute: 1380,
            to_minute: 420,
        },
    },
};
