//! Command-line interface argument parsing for the demo driver.

use clap::Parser;
use std::path::PathBuf;

/// Telemetry Synth - run a demo check suite and synthesize a collective report
///
/// Runs a built-in suite of checks for a handful of agents, summarizes each
/// agent and prints the collective report as JSON.
///
/// Examples:
///   telemetry-synth
///   telemetry-synth --config team.toml --output collective.json
///   telemetry-synth --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .telemetry-synth.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "TELEMETRY_SYNTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the collective report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .telemetry-synth.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref path) = self.config {
            if !path.exists() {
                return Err(format!("Config file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
