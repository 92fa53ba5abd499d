//! Telemetry Synth demo driver.
//!
//! Runs the built-in demo suite for each simulated agent, summarizes every
//! run, synthesizes a collective report and prints it as JSON.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, unreadable config, write failure)

mod cli;
mod demo;

use anyhow::{Context, Result};
use cli::Args;
use telemetry_synth::{
    CollectiveSynthesizer, Config, DifficultyCalibrator, MemorySink, SummarySink,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Telemetry Synth v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(&args) {
        error!("Run failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

/// Handle --init-config: generate a default .telemetry-synth.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(telemetry_synth::config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {} with default settings.", path.display());
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Warning: a tracing subscriber was already installed");
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", telemetry_synth::config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let calibrator = DifficultyCalibrator::new(config.calibration.clone());
    let synthesizer = CollectiveSynthesizer::new(config.synthesis.clone());
    let mut sink = MemorySink::new();

    for agent in demo::agents() {
        let harness = demo::run_agent(&agent, &config.harness);

        for validation in calibrator.calibrate_results(harness.results()) {
            if !validation.is_accurate {
                debug!(
                    check = %validation.check,
                    claimed = validation.claimed.code(),
                    suggested = validation.suggested.code(),
                    "claimed difficulty looks off"
                );
            }
        }

        let summary = harness.summarize();
        for (code, next) in calibrator.recommend_next_levels(&summary) {
            debug!(agent = %summary.agent_id, from = %code, to = next.code(), "next difficulty");
        }
        sink.accept(&summary)?;
    }

    let collective = sink.synthesize(&synthesizer);
    let json =
        serde_json::to_string_pretty(&collective).context("Failed to serialize collective report")?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!(
                agents = collective.agent_count,
                pass_rate = collective.collective_pass_rate,
                "Report saved to {}",
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}
