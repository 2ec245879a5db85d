//! Compiles `config/active_mode.toml` into a Rust `static` that the engine
//! crate pulls in with `include!` from its build script output.

use std::{
    fmt::{self, Write as _},
    fs,
    path::Path,
};

use serde::Deserialize;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Deltas a detector window can hold. Rendered into the generated config so
/// the engine sizes its buffers from the same number that validation uses.
pub const WINDOW_CAPACITY: usize = 2048;

/// Period assumed for `sample_rate = "fastest"`, which has no nominal rate.
pub const FASTEST_PERIOD_FLOOR_MS: u64 = 1;

#[derive(Debug)]
pub enum ConfigCompilerError {
    Io(String),
    Parse(String),
    Validation(String),
}

impl fmt::Display for ConfigCompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigCompilerError {}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActiveModeFile {
    pub window: WindowSection,
    pub cooldown: CooldownSection,
    pub oscillation: OscillationSection,
    pub ratio: RatioSection,
    pub engine: EngineSection,
    pub proximity: ProximitySection,
    pub handlers: HandlersSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub span_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CooldownSection {
    pub ignore_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OscillationSection {
    pub check_interval_ms: u64,
    pub positive_threshold: f32,
    pub negative_threshold: f32,
    pub minimum_each_direction: u8,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatioSection {
    pub min_points: u16,
    pub ratio_min: f32,
    pub delta_min: f32,
    pub quiet_max: f32,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SampleRateName {
    Normal,
    Ui,
    Game,
    Fastest,
}

impl SampleRateName {
    pub const fn period_ms(self) -> u64 {
        match self {
            SampleRateName::Normal => 200,
            SampleRateName::Ui => 60,
            SampleRateName::Game => 20,
            SampleRateName::Fastest => FASTEST_PERIOD_FLOOR_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MotionDutyName {
    Continuous,
    OnDemand,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicyName {
    Any,
    All,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    None,
    Oscillation,
    Ratio,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    pub sample_rate: SampleRateName,
    pub vote_policy: VotePolicyName,
    pub motion_duty: MotionDutyName,
    pub ping_ms: u64,
    pub active_charging: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProximitySection {
    pub pocket_guard: bool,
    pub pocket_delay_ms: u64,
    pub wave_to_wake: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlersSection {
    pub without_notifications: NotificationHandlerSection,
    pub screen_off: ScreenHandlerSection,
    pub battery_out: BatteryHandlerSection,
    pub inactive_time: InactiveTimeHandlerSection,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationHandlerSection {
    pub enabled: bool,
    pub strategy: StrategyName,
    pub without_notifications: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScreenHandlerSection {
    pub enabled: bool,
    pub strategy: StrategyName,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatteryHandlerSection {
    pub enabled: bool,
    pub strategy: StrategyName,
    pub feature_enabled: bool,
    pub low_level: u8,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InactiveTimeHandlerSection {
    pub enabled: bool,
    pub strategy: StrategyName,
    pub feature_enabled: bool,
    pub from_minute: u16,
    pub to_minute: u16,
}

pub fn parse_config_str(source: &str) -> Result<ActiveModeFile, ConfigCompilerError> {
    toml::from_str(source).map_err(|e| ConfigCompilerError::Parse(e.to_string()))
}

pub fn parse_config_file(path: &Path) -> Result<ActiveModeFile, ConfigCompilerError> {
    let source = fs::read_to_string(path)
        .map_err(|e| ConfigCompilerError::Io(format!("{}: {e}", path.display())))?;
    parse_config_str(&source)
}

pub fn validate_config(config: &ActiveModeFile) -> Result<(), ConfigCompilerError> {
    let fail = |msg: &str| Err(ConfigCompilerError::Validation(msg.to_string()));

    if config.window.span_ms == 0 {
        return fail("window.span_ms must be > 0");
    }
    if config.cooldown.ignore_ms == 0 {
        return fail("cooldown.ignore_ms must be > 0");
    }
    let span_entries = config.window.span_ms / config.engine.sample_rate.period_ms() + 1;
    if span_entries > WINDOW_CAPACITY as u64 {
        return fail("window.span_ms holds more deltas than WINDOW_CAPACITY at engine.sample_rate");
    }

    let osc = &config.oscillation;
    if osc.check_interval_ms == 0 {
        return fail("oscillation.check_interval_ms must be > 0");
    }
    if osc.check_interval_ms > config.window.span_ms {
        return fail("oscillation.check_interval_ms must be <= window.span_ms");
    }
    if !(osc.positive_threshold > 0.0) {
        return fail("oscillation.positive_threshold must be > 0");
    }
    if !(osc.negative_threshold < 0.0) {
        return fail("oscillation.negative_threshold must be < 0");
    }
    if osc.minimum_each_direction == 0 {
        return fail("oscillation.minimum_each_direction must be > 0");
    }

    let ratio = &config.ratio;
    if ratio.min_points < 2 {
        return fail("ratio.min_points must be >= 2");
    }
    if usize::from(ratio.min_points) > WINDOW_CAPACITY {
        return fail("ratio.min_points must be <= WINDOW_CAPACITY");
    }
    if !(ratio.ratio_min > 0.0) {
        return fail("ratio.ratio_min must be > 0");
    }
    if !(ratio.delta_min >= 0.0) {
        return fail("ratio.delta_min must be >= 0");
    }
    if !(ratio.quiet_max > 0.0) {
        return fail("ratio.quiet_max must be > 0");
    }

    if config.engine.ping_ms == 0 {
        return fail("engine.ping_ms must be > 0");
    }
    if config.proximity.pocket_delay_ms == 0 {
        return fail("proximity.pocket_delay_ms must be > 0");
    }

    let handlers = &config.handlers;
    if handlers.battery_out.low_level > 100 {
        return fail("handlers.battery_out.low_level must be <= 100");
    }
    if handlers.inactive_time.from_minute >= MINUTES_PER_DAY
        || handlers.inactive_time.to_minute >= MINUTES_PER_DAY
    {
        return fail("handlers.inactive_time minutes must be < 1440");
    }

    let any_enabled = handlers.without_notifications.enabled
        || handlers.screen_off.enabled
        || handlers.battery_out.enabled
        || handlers.inactive_time.enabled;
    if !any_enabled {
        return fail("at least one handler must be enabled");
    }

    Ok(())
}

fn render_sample_rate(rate: SampleRateName) -> &'static str {
    match rate {
        SampleRateName::Normal => "SampleRate::Normal",
        SampleRateName::Ui => "SampleRate::Ui",
        SampleRateName::Game => "SampleRate::Game",
        SampleRateName::Fastest => "SampleRate::Fastest",
    }
}

fn render_motion_duty(duty: MotionDutyName) -> &'static str {
    match duty {
        MotionDutyName::Continuous => "MotionDuty::Continuous",
        MotionDutyName::OnDemand => "MotionDuty::OnDemand",
    }
}

fn render_vote_policy(policy: VotePolicyName) -> &'static str {
    match policy {
        VotePolicyName::Any => "VotePolicy::Any",
        VotePolicyName::All => "VotePolicy::All",
    }
}

fn render_strategy(strategy: StrategyName) -> &'static str {
    match strategy {
        StrategyName::None => "None",
        StrategyName::Oscillation => "Some(StrategyKind::Oscillation)",
        StrategyName::Ratio => "Some(StrategyKind::Ratio)",
    }
}

pub fn render_generated_config(config: &ActiveModeFile) -> String {
    let osc = &config.oscillation;
    let ratio = &config.ratio;
    let engine = &config.engine;
    let proximity = &config.proximity;
    let notifications = &config.handlers.without_notifications;
    let screen = &config.handlers.screen_off;
    let battery = &config.handlers.battery_out;
    let inactive = &config.handlers.inactive_time;

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "// @generated by active_mode_config_compiler. Do not edit.");
    let _ = writeln!(out, "pub const WINDOW_CAPACITY: usize = {WINDOW_CAPACITY};");
    let _ = writeln!(
        out,
        "pub static ACTIVE_MODE_CONFIG: ActiveModeConfig = ActiveModeConfig {{"
    );
    let _ = writeln!(
        out,
        "    window: WindowConfig {{ span_ms: {} }},",
        config.window.span_ms
    );
    let _ = writeln!(
        out,
        "    cooldown: CooldownConfig {{ ignore_ms: {} }},",
        config.cooldown.ignore_ms
    );
    let _ = writeln!(out, "    oscillation: OscillationConfig {{");
    let _ = writeln!(out, "        check_interval_ms: {},", osc.check_interval_ms);
    let _ = writeln!(out, "        positive_threshold: {:?},", osc.positive_threshold);
    let _ = writeln!(out, "        negative_threshold: {:?},", osc.negative_threshold);
    let _ = writeln!(
        out,
        "        minimum_each_direction: {},",
        osc.minimum_each_direction
    );
    let _ = writeln!(out, "    }},");
    let _ = writeln!(out, "    ratio: RatioConfig {{");
    let _ = writeln!(out, "        min_points: {},", ratio.min_points);
    let _ = writeln!(out, "        ratio_min: {:?},", ratio.ratio_min);
    let _ = writeln!(out, "        delta_min: {:?},", ratio.delta_min);
    let _ = writeln!(out, "        quiet_max: {:?},", ratio.quiet_max);
    let _ = writeln!(out, "    }},");
    let _ = writeln!(out, "    engine: EngineConfig {{");
    let _ = writeln!(
        out,
        "        sample_rate: {},",
        render_sample_rate(engine.sample_rate)
    );
    let _ = writeln!(
        out,
        "        vote_policy: {},",
        render_vote_policy(engine.vote_policy)
    );
    let _ = writeln!(
        out,
        "        motion_duty: {},",
        render_motion_duty(engine.motion_duty)
    );
    let _ = writeln!(out, "        ping_ms: {},", engine.ping_ms);
    let _ = writeln!(out, "        active_charging: {},", engine.active_charging);
    let _ = writeln!(out, "    }},");
    let _ = writeln!(out, "    proximity: ProximityConfig {{");
    let _ = writeln!(out, "        pocket_guard: {},", proximity.pocket_guard);
    let _ = writeln!(out, "        pocket_delay_ms: {},", proximity.pocket_delay_ms);
    let _ = writeln!(out, "        wave_to_wake: {},", proximity.wave_to_wake);
    let _ = writeln!(out, "    }},");
    let _ = writeln!(out, "    handlers: HandlersConfig {{");
    let _ = writeln!(out, "        without_notifications: NotificationHandlerConfig {{");
    let _ = writeln!(out, "            enabled: {},", notifications.enabled);
    let _ = writeln!(
        out,
        "            strategy: {},",
        render_strategy(notifications.strategy)
    );
    let _ = writeln!(
        out,
        "            without_notifications: {},",
        notifications.without_notifications
    );
    let _ = writeln!(out, "        }},");
    let _ = writeln!(out, "        screen_off: ScreenHandlerConfig {{");
    let _ = writeln!(out, "            enabled: {},", screen.enabled);
    let _ = writeln!(
        out,
        "            strategy: {},",
        render_strategy(screen.strategy)
    );
    let _ = writeln!(out, "        }},");
    let _ = writeln!(out, "        battery_out: BatteryHandlerConfig {{");
    let _ = writeln!(out, "            enabled: {},", battery.enabled);
    let _ = writeln!(
        out,
        "            strategy: {},",
        render_strategy(battery.strategy)
    );
    let _ = writeln!(out, "            feature_enabled: {},", battery.feature_enabled);
    let _ = writeln!(out, "            low_level: {},", battery.low_level);
    let _ = writeln!(out, "        }},");
    let _ = writeln!(out, "        inactive_time: InactiveTimeHandlerConfig {{");
    let _ = writeln!(out, "            enabled: {},", inactive.enabled);
    let _ = writeln!(
        out,
        "            strategy: {},",
        render_strategy(inactive.strategy)
    );
    let _ = writeln!(out, "            feature_enabled: {},", inactive.feature_enabled);
    let _ = writeln!(out, "            from_minute: {},", inactive.from_minute);
    let _ = writeln!(out, "            to_minute: {},", inactive.to_minute);
    let _ = writeln!(out, "        }},");
    let _ = writeln!(out, "    }},");
    let _ = writeln!(out, "}};");
    out
}

pub fn generate_from_path(path: &Path) -> Result<String, ConfigCompilerError> {
    let config = parse_config_file(path)?;
    validate_config(&config)?;
    Ok(render_generated_config(&config))
}
