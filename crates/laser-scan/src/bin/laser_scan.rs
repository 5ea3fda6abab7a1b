use std::{error::Error, fs, path::PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use laser_scan::core::CloudStats;
use laser_scan::detect;
use laser_scan::engine::{
    replay::ImageSequenceSource,
    sim::{RecordingActuator, RecordingEmitter, WallScene},
    FrameSource, ScanConfig, ScanEngine, ScanSummary, StopSignal,
};
use log::LevelFilter;
use serde::Serialize;

/// Scanned-laser-line triangulation rangefinder.
#[derive(Debug, Parser)]
#[command(author, version, about = "Laser stripe triangulation scanner")]
struct Args {
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Emit JSON log lines (only with the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect the stripe in one image and summarise the projected points.
    Detect {
        image: PathBuf,
        /// JSON scan configuration; defaults describe the reference rig.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Scan a simulated flat wall until Ctrl-C or the tick limit.
    Simulate {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Stop after this many ticks (overrides the config).
        #[arg(long)]
        ticks: Option<u64>,
        /// Horizontal distance of the wall.
        #[arg(long, default_value_t = 15.0)]
        distance: f64,
        #[arg(long, default_value_t = 1280)]
        width: usize,
        #[arg(long, default_value_t = 960)]
        height: usize,
        /// Write the session summary to this file as well.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Scan recorded frames from a directory, in file-name order.
    Replay {
        dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct DetectOutput {
    width: usize,
    height: usize,
    observations: usize,
    points: usize,
    dropped_rows: usize,
    first_row: Option<usize>,
    last_row: Option<usize>,
    stats: Option<CloudStats>,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(&args);

    match args.command {
        Command::Detect { image, config } => run_detect(&image, load_config(config)?),
        Command::Simulate {
            config,
            ticks,
            distance,
            width,
            height,
            report,
        } => {
            let mut config = load_config(config)?;
            if ticks.is_some() {
                config.max_ticks = ticks;
            }
            run_simulate(&config, distance, (width, height), report)
        }
        Command::Replay {
            dir,
            config,
            report,
        } => run_replay(&dir, load_config(config)?, report),
    }
}

fn init_logging(args: &Args) {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        laser_scan::core::init_tracing(args.json_logs);
        log::set_max_level(args.log_level.into());
    }
    #[cfg(not(feature = "tracing"))]
    {
        if args.json_logs {
            eprintln!("--json-logs needs the `tracing` feature; using plain logs");
        }
        let _ = laser_scan::core::init_with_level(args.log_level.into());
    }
}

fn load_config(path: Option<PathBuf>) -> Result<ScanConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(ScanConfig::load_json(path)?),
        None => Ok(ScanConfig::default()),
    }
}

fn run_detect(image: &std::path::Path, config: ScanConfig) -> Result<(), Box<dyn Error>> {
    let detection = detect::detect_file(image, &config)?;
    let output = DetectOutput {
        width: detection.width,
        height: detection.height,
        observations: detection.observations.len(),
        points: detection.points.len(),
        dropped_rows: detection.dropped_rows,
        first_row: detection.observations.first().map(|o| o.row),
        last_row: detection.observations.last().map(|o| o.row),
        stats: detection.stats(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_simulate(
    config: &ScanConfig,
    distance: f64,
    (width, height): (usize, usize),
    report: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let model = config.build_model()?;
    // Middle three quarters of the frame see the wall.
    let rows = height / 8..height - height / 8;
    let wall = WallScene::new(&model, distance, width, height, config.channel_order, rows)?
        .ok_or_else(|| format!("a wall at distance {distance} is outside the {width}px frame"))?;
    log::info!(
        "simulated wall at {distance} (stripe column {})",
        wall.stripe_column()
    );
    run_session(config, wall, report)
}

fn run_replay(
    dir: &std::path::Path,
    config: ScanConfig,
    report: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    // The session ends by itself once the last readable frame was scanned.
    let source = ImageSequenceSource::open(dir)?;
    run_session(&config, source, report)
}

fn run_session<F: FrameSource>(
    config: &ScanConfig,
    source: F,
    report: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let stop = StopSignal::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || handler.stop())?;

    let mut engine = ScanEngine::new(
        config,
        source,
        RecordingActuator::new(),
        RecordingEmitter::new(),
    )?;
    let summary = engine.run(&stop)?;
    write_summary(&summary, report)
}

fn write_summary(summary: &ScanSummary, report: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(summary)?;
    if let Some(path) = report {
        fs::write(&path, &json)?;
        log::info!("wrote session summary to {}", path.display());
    }
    println!("{json}");
    Ok(())
}
