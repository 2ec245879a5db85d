use std::{
    env,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process,
};

use activewake::{
    build_strategy, ActiveModeConfig, ActiveModeEngine, EngineAction, EngineError, FeedBus,
    MotionDuty, MotionSource, RejectReason, Sample, SampleRate, StrategyKind,
};

#[derive(Clone, Copy)]
enum Mode {
    Strategy(StrategyKind),
    Engine,
}

struct ReplayEvent {
    t_ms: u64,
    kind: &'static str,
}

/// Samples come from the trace file; start and stop have nothing to drive.
struct TraceSource;

impl MotionSource for TraceSource {
    fn start(&mut self, _rate: SampleRate) -> Result<(), EngineError> {
        Ok(())
    }

    fn stop(&mut self) {}
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(usage());
    }

    let mut trace_path: Option<PathBuf> = None;
    let mut expect_path: Option<PathBuf> = None;
    let mut mode = Mode::Strategy(StrategyKind::Oscillation);

    let mut idx = 1usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "--strategy" => {
                idx += 1;
                let Some(name) = args.get(idx) else {
                    return Err("missing name after --strategy".into());
                };
                let kind = parse_strategy(name)
                    .ok_or_else(|| format!("unknown strategy: {name}"))?;
                mode = Mode::Strategy(kind);
            }
            "--engine" => mode = Mode::Engine,
            "--expect" => {
                idx += 1;
                let Some(path) = args.get(idx) else {
                    return Err("missing path after --expect".into());
                };
                expect_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{}", usage());
                return Ok(());
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown argument: {value}"));
            }
            value => {
                if trace_path.is_some() {
                    return Err("multiple trace paths provided".into());
                }
                trace_path = Some(PathBuf::from(value));
            }
        }
        idx += 1;
    }

    let trace_path = trace_path.ok_or_else(usage)?;
    let samples = parse_trace(&trace_path)?;
    let config = ActiveModeConfig::default_tuning();

    let events = match mode {
        Mode::Strategy(kind) => replay_strategy(kind, &config, &samples),
        Mode::Engine => replay_engine(config, &samples)?,
    };

    println!("event,t_ms,kind");
    for event in &events {
        println!("event,{},{}", event.t_ms, event.kind);
    }

    if let Some(expect_path) = expect_path {
        let expected = parse_expected_kinds(&expect_path)?;
        let actual: Vec<&'static str> = events.iter().map(|e| e.kind).collect();
        if actual != expected {
            eprintln!("expected kinds: {}", expected.join(","));
            eprintln!("actual kinds:   {}", actual.join(","));
            return Err("event sequence mismatch".into());
        }
    }

    Ok(())
}

fn replay_strategy(
    kind: StrategyKind,
    config: &ActiveModeConfig,
    samples: &[Sample],
) -> Vec<ReplayEvent> {
    let mut strategy = build_strategy(kind, config);
    samples
        .iter()
        .filter_map(|sample| strategy.on_sample(*sample))
        .map(|shake| ReplayEvent {
            t_ms: shake.t_ms,
            kind: strategy_label(shake.strategy),
        })
        .collect()
}

fn replay_engine(
    mut config: ActiveModeConfig,
    samples: &[Sample],
) -> Result<Vec<ReplayEvent>, String> {
    // One handler, forced active, so every sample reaches its strategy.
    config.handlers.without_notifications.enabled = true;
    config.handlers.without_notifications.without_notifications = true;
    config.handlers.screen_off.enabled = false;
    config.handlers.battery_out.enabled = false;
    config.handlers.inactive_time.enabled = false;
    // Recorded traces carry no notification posts to wake an on-demand source.
    config.engine.motion_duty = MotionDuty::Continuous;

    let bus = FeedBus::new();
    let mut engine = ActiveModeEngine::new(config, &bus, TraceSource);
    let start_ms = samples.first().map_or(0, |s| s.t_ms);
    engine
        .create(start_ms)
        .map_err(|e| format!("engine failed to start: {e}"))?;

    let mut events = Vec::new();
    for sample in samples {
        let output = engine.on_sample(*sample);
        for action in output.actions.iter() {
            let kind = match action {
                EngineAction::WakeRequested(_) => "wake",
                EngineAction::WakeSuppressed {
                    reason: RejectReason::CooldownActive,
                } => "suppressed_cooldown",
                EngineAction::WakeSuppressed {
                    reason: RejectReason::PocketVeto,
                } => "suppressed_pocket",
                _ => continue,
            };
            events.push(ReplayEvent {
                t_ms: sample.t_ms,
                kind,
            });
        }
    }

    let end_ms = samples.last().map_or(start_ms, |s| s.t_ms);
    let _ = engine.destroy(end_ms);
    Ok(events)
}

fn usage() -> String {
    "usage: shake_replay <trace.csv> [--strategy oscillation|ratio] [--engine] [--expect expected_kinds.txt]"
        .to_string()
}

fn parse_strategy(name: &str) -> Option<StrategyKind> {
    match name.trim().to_ascii_lowercase().as_str() {
        "oscillation" => Some(StrategyKind::Oscillation),
        "ratio" => Some(StrategyKind::Ratio),
        _ => None,
    }
}

fn strategy_label(kind: StrategyKind) -> &'static str {
    match kind {
        StrategyKind::Oscillation => "oscillation",
        StrategyKind::Ratio => "ratio",
    }
}

fn normalize_kind(kind: &str) -> Option<&'static str> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "oscillation" => Some("oscillation"),
        "ratio" => Some("ratio"),
        "wake" => Some("wake"),
        "suppressed_cooldown" => Some("suppressed_cooldown"),
        "suppressed_pocket" => Some("suppressed_pocket"),
        _ => None,
    }
}

fn parse_trace(path: &Path) -> Result<Vec<Sample>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut out: Vec<Sample> = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line_result
            .map_err(|e| format!("failed to read {}:{}: {e}", path.display(), line_no))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed == "t_ms,x,y,z" {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').collect();
        if parts.len() != 4 {
            return Err(format!(
                "{}:{} invalid trace line, expected 4 columns",
                path.display(),
                line_no
            ));
        }

        let t_ms = parse_u64(parts[0], path, line_no, "t_ms")?;
        if out.last().is_some_and(|prev| t_ms < prev.t_ms) {
            return Err(format!(
                "{}:{} timestamp goes backwards",
                path.display(),
                line_no
            ));
        }
        out.push(Sample::new(
            parse_f32(parts[1], path, line_no, "x")?,
            parse_f32(parts[2], path, line_no, "y")?,
            parse_f32(parts[3], path, line_no, "z")?,
            t_ms,
        ));
    }

    Ok(out)
}

fn parse_expected_kinds(path: &Path) -> Result<Vec<&'static str>, String> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    let reader = BufReader::new(file);

    let mut kinds = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line_result
            .map_err(|e| format!("failed to read {}:{}: {e}", path.display(), line_no))?;
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }

        let normalized = normalize_kind(token).ok_or_else(|| {
            format!(
                "{}:{} invalid expected event kind: {}",
                path.display(),
                line_no,
                token
            )
        })?;
        kinds.push(normalized);
    }

    Ok(kinds)
}

fn parse_u64(raw: &str, path: &Path, line_no: usize, field: &str) -> Result<u64, String> {
    raw.trim().parse::<u64>().map_err(|e| {
        format!(
            "{}:{} invalid {} '{}': {}",
            path.display(),
            line_no,
            field,
            raw.trim(),
            e
        )
    })
}

fn parse_f32(raw: &str, path: &Path, line_no: usize, field: &str) -> Result<f32, String> {
    raw.trim().parse::<f32>().map_err(|e| {
        format!(
            "{}:{} invalid {} '{}': {}",
            path.display(),
            line_no,
            field,
            raw.trim(),
            e
        )
    })
}
