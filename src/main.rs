//! Touch Injector - human-like touch gestures for evdev touchscreens
//!
//! Plans, times and writes tap/swipe gestures to a `/dev/input/eventN`
//! node, or renders them as a `sendevent` script or JSON frames.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use touch_injector::app::cli::{Cli, Commands, ConfigAction, GestureOpts};
use touch_injector::app::config::Config;
use touch_injector::device::discovery::{find_touchscreen, parse_getevent};
use touch_injector::engine::{CancelToken, GestureOutcome, Injector};
use touch_injector::gesture::types::{DurationBounds, GestureKind, GestureSpec, Point};
use touch_injector::time::timebase::ManualClock;
use touch_injector::transport::{DeviceTransport, EvdevSink, FrameSink, MemorySink, ScriptSink};
use touch_injector::DeviceCapabilities;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    // Initialize tracing (--verbose enables debug-level output)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load config
    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    // Execute command
    match cli.command {
        Commands::Tap { x, y, opts } => {
            let spec = GestureSpec::tap(Point::new(x, y));
            run_gestures(vec![spec], None, &opts, &config)?;
        }
        Commands::Swipe {
            x1,
            y1,
            x2,
            y2,
            duration_ms,
            opts,
        } => {
            let mut spec = GestureSpec::swipe(Point::new(x1, y1), Point::new(x2, y2));
            if let Some(ms) = duration_ms {
                spec = spec.with_duration(DurationBounds::from_millis(ms, ms));
            }
            run_gestures(vec![spec], None, &opts, &config)?;
        }
        Commands::LongPress {
            x,
            y,
            hold_ms,
            opts,
        } => {
            let spec = GestureSpec::tap(Point::new(x, y))
                .with_duration(DurationBounds::from_millis(hold_ms, hold_ms));
            run_gestures(vec![spec], None, &opts, &config)?;
        }
        Commands::DoubleTap { x, y, gap_ms, opts } => {
            let tap = GestureSpec::tap(Point::new(x, y));
            let gap = if humanize(&opts, &config) {
                DurationBounds::from_millis(gap_ms * 7 / 10, gap_ms * 13 / 10)
            } else {
                DurationBounds::from_millis(gap_ms, gap_ms)
            };
            run_gestures(vec![tap.clone(), tap], Some(gap), &opts, &config)?;
        }
        Commands::Info { getevent } => {
            run_info(&getevent)?;
        }
        Commands::Config { action } => {
            run_config(action, &config)?;
        }
    }

    Ok(())
}

fn humanize(opts: &GestureOpts, config: &Config) -> bool {
    config.humanize.enabled && !opts.no_humanize
}

fn run_gestures(
    specs: Vec<GestureSpec>,
    gap: Option<DurationBounds>,
    opts: &GestureOpts,
    config: &Config,
) -> anyhow::Result<()> {
    let (caps, discovered_path) = resolve_capabilities(opts, config)?;
    let device = opts
        .device
        .clone()
        .or(discovered_path)
        .unwrap_or_else(|| config.device.path.clone());
    let humanized = humanize(opts, config);

    let specs: Vec<GestureSpec> = specs
        .into_iter()
        .enumerate()
        .map(|(i, spec)| {
            let mut spec = spec.humanized(humanized);
            if let Some(seed) = opts.seed {
                spec = spec.with_seed(seed.wrapping_add(i as u64));
            }
            match opts.screen {
                Some(screen) => scale_spec(spec, &caps, screen.as_tuple()),
                None => spec,
            }
        })
        .collect();

    // Ctrl-C cancels the running gesture; the contact is still released
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })?;

    let mut injector = Injector::new(caps)
        .with_planner(config.planner_settings())
        .with_timing(config.timing_settings())
        .with_retry_policy(config.retry_policy())
        .with_lead_in(config.lead_in())
        .with_cancel_token(cancel);

    let recording = MemorySink::new();
    let sink: Box<dyn FrameSink> = if opts.dry_run {
        Box::new(recording.clone())
    } else if let Some(script) = &opts.script {
        Box::new(ScriptSink::create(script, device.clone())?)
    } else {
        Box::new(EvdevSink::open(
            Path::new(&device),
            config.record_layout(),
        )?)
    };

    // Offline sinks don't need real-time pacing
    if opts.dry_run || opts.script.is_some() {
        injector = injector.with_clock(Arc::new(ManualClock::new()));
    }

    info!("writing to {} ({} gesture(s))", sink.describe(), specs.len());
    let transport = DeviceTransport::new(sink, config.retry_policy());
    let outcomes = match gap {
        Some(gap) => injector.perform_sequence(&specs, gap, transport),
        None => specs
            .first()
            .map(|spec| vec![injector.perform(spec, transport)])
            .unwrap_or_default(),
    };

    if opts.dry_run {
        for frame in recording.frames() {
            println!("{}", serde_json::to_string(&frame)?);
        }
    }
    if let Some(script) = &opts.script {
        println!("Script written to {:?}", script);
    }

    report(&outcomes)
}

fn report(outcomes: &[GestureOutcome]) -> anyhow::Result<()> {
    let mut failed = None;
    for outcome in outcomes {
        match outcome {
            GestureOutcome::Done(report) => {
                eprintln!("{}", outcome);
                info!("trace: {:?}", report.trace);
            }
            GestureOutcome::Failed(failure) => {
                error!("{}", outcome);
                failed = Some(format!("{}", failure.reason));
            }
        }
    }
    match failed {
        Some(reason) => anyhow::bail!("Gesture failed: {}", reason),
        None => Ok(()),
    }
}

/// Capabilities from `--getevent`, then `[device]`, then a generic panel.
fn resolve_capabilities(
    opts: &GestureOpts,
    config: &Config,
) -> anyhow::Result<(DeviceCapabilities, Option<String>)> {
    if let Some(listing) = &opts.getevent {
        let text = std::fs::read_to_string(listing)?;
        let device = find_touchscreen(&text)?;
        info!("using {} from {:?}", device.path, listing);
        return Ok((device.capabilities()?, Some(device.path)));
    }
    if let Some(caps) = config.declared_capabilities()? {
        return Ok((caps, None));
    }
    warn!("no device capabilities given; assuming a 1080x2400 panel");
    Ok((DeviceCapabilities::touchscreen(1080, 2400), None))
}

fn scale_spec(spec: GestureSpec, caps: &DeviceCapabilities, screen: (u32, u32)) -> GestureSpec {
    let kind = match spec.kind {
        GestureKind::Tap { at } => GestureKind::Tap {
            at: caps.screen_to_device(at, screen),
        },
        GestureKind::Swipe { from, to } => GestureKind::Swipe {
            from: caps.screen_to_device(from, screen),
            to: caps.screen_to_device(to, screen),
        },
    };
    GestureSpec { kind, ..spec }
}

fn run_info(getevent: &PathBuf) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(getevent)?;
    let devices = parse_getevent(&text);
    println!("Found {} input device(s):", devices.len());
    for device in &devices {
        let marker = if device.is_touchscreen() { "*" } else { " " };
        println!(
            " {} {} {}",
            marker,
            device.path,
            device.name.as_deref().unwrap_or("(unnamed)")
        );
    }

    let touch = find_touchscreen(&text)?;
    let caps = touch.capabilities()?;
    println!();
    println!("Touchscreen: {}", touch.path);
    println!("  X range:         {}..={}", caps.x.min, caps.x.max);
    println!("  Y range:         {}..={}", caps.y.min, caps.y.max);
    println!("  Pressure max:    {}", caps.pressure_max);
    println!("  Touch major max: {}", caps.touch_major_max);
    println!("  Slots:           {}", caps.max_slots);
    println!("  Tracking id max: {}", caps.tracking_id_max);
    println!("  BTN_TOUCH:       {}", if touch.has_btn_touch { "yes" } else { "no" });
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = config.to_toml()?;
            println!("Configuration ({:?}):\n", Config::default_path());
            println!("{}", toml_str);
        }
        ConfigAction::Init { force } => {
            let config_path = Config::default_path();

            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to overwrite with defaults");
                return Ok(());
            }

            Config::default().save_default()?;
            println!("Configuration written to {:?}", config_path);
        }
    }

    Ok(())
}
