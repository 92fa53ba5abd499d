//! Configuration file handling.
//!
//! This module handles loading configuration from `.telemetry-synth.toml`
//! files. Every section falls back to built-in defaults, so an empty file is a
//! valid configuration.

use crate::tables;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".telemetry-synth.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Harness settings.
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Difficulty calibration settings.
    #[serde(default)]
    pub calibration: CalibrationConfig,

    /// Collective synthesis registries.
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

/// Execution harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Characters of an error message quoted in recommendations.
    #[serde(default = "default_error_excerpt_chars")]
    pub error_excerpt_chars: usize,

    /// Characters of each payload kept when rendering for display.
    #[serde(default = "default_payload_display_chars")]
    pub payload_display_chars: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            error_excerpt_chars: default_error_excerpt_chars(),
            payload_display_chars: default_payload_display_chars(),
        }
    }
}

fn default_error_excerpt_chars() -> usize {
    100
}

fn default_payload_display_chars() -> usize {
    200
}

/// Expected behavior of one difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceExpectation {
    pub max_time_ms: f64,
    pub expected_pass_rate: f64,
}

/// Difficulty calibration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Benchmarks keyed by difficulty code. Entries in the file override
    /// the built-in ones level by level.
    #[serde(default = "default_benchmarks", deserialize_with = "merge_benchmarks")]
    pub benchmarks: BTreeMap<String, PerformanceExpectation>,

    /// Used for codes missing from `benchmarks`.
    #[serde(default = "default_fallback")]
    pub fallback: PerformanceExpectation,

    /// Pass rate at or above which the next run steps up a level.
    #[serde(default = "default_step_up")]
    pub step_up_threshold: f64,

    /// Pass rate below which the next run steps down a level.
    #[serde(default = "default_step_down")]
    pub step_down_threshold: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            benchmarks: default_benchmarks(),
            fallback: default_fallback(),
            step_up_threshold: default_step_up(),
            step_down_threshold: default_step_down(),
        }
    }
}

fn default_benchmarks() -> BTreeMap<String, PerformanceExpectation> {
    tables::DEFAULT_BENCHMARKS
        .iter()
        .map(|(code, max_time_ms, expected_pass_rate)| {
            (
                code.to_string(),
                PerformanceExpectation {
                    max_time_ms: *max_time_ms,
                    expected_pass_rate: *expected_pass_rate,
                },
            )
        })
        .collect()
}

fn merge_benchmarks<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, PerformanceExpectation>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, PerformanceExpectation>::deserialize(deserializer)?;
    let mut benchmarks = default_benchmarks();
    benchmarks.extend(overrides);
    Ok(benchmarks)
}

fn default_fallback() -> PerformanceExpectation {
    PerformanceExpectation {
        max_time_ms: tables::FALLBACK_MAX_TIME_MS,
        expected_pass_rate: tables::FALLBACK_PASS_RATE,
    }
}

fn default_step_up() -> f64 {
    0.9
}

fn default_step_down() -> f64 {
    0.3
}

/// A named group of agents for rollup reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub name: String,
    pub agents: Vec<String>,
}

/// A scored capability and the specialty keyword that boosts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    pub name: String,
    pub keyword: String,
}

/// Registries consumed by the collective synthesizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Ordered tier membership.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierDefinition>,

    /// Suggested partners per agent.
    #[serde(default = "default_collaboration_graph")]
    pub collaboration_graph: BTreeMap<String, Vec<String>>,

    /// Ordered list of capabilities in the matrix.
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<CapabilityDefinition>,

    /// Multiplier applied when the specialty mentions a capability keyword.
    #[serde(default = "default_specialty_weight")]
    pub specialty_weight: f64,

    /// Fixed advisory list copied into every report.
    #[serde(default = "default_optimization_targets")]
    pub optimization_targets: Vec<String>,

    /// Cap on strengths, weaknesses and critical gaps.
    #[serde(default = "default_max_listed")]
    pub max_listed: usize,

    /// Pass rate at or above which an agent becomes a mentor candidate.
    #[serde(default = "default_mentor_threshold")]
    pub mentor_threshold: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            collaboration_graph: default_collaboration_graph(),
            capabilities: default_capabilities(),
            specialty_weight: default_specialty_weight(),
            optimization_targets: default_optimization_targets(),
            max_listed: default_max_listed(),
            mentor_threshold: default_mentor_threshold(),
        }
    }
}

fn default_tiers() -> Vec<TierDefinition> {
    tables::DEFAULT_TIERS
        .iter()
        .map(|(name, agents)| TierDefinition {
            name: name.to_string(),
            agents: agents.iter().map(|a| a.to_string()).collect(),
        })
        .collect()
}

fn default_collaboration_graph() -> BTreeMap<String, Vec<String>> {
    tables::DEFAULT_COLLABORATION_GRAPH
        .iter()
        .map(|(agent, partners)| {
            (
                agent.to_string(),
                partners.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect()
}

fn default_capabilities() -> Vec<CapabilityDefinition> {
    tables::DEFAULT_CAPABILITIES
        .iter()
        .map(|(name, keyword)| CapabilityDefinition {
            name: name.to_string(),
            keyword: keyword.to_string(),
        })
        .collect()
}

fn default_specialty_weight() -> f64 {
    1.2
}

fn default_optimization_targets() -> Vec<String> {
    tables::DEFAULT_OPTIMIZATION_TARGETS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_max_listed() -> usize {
    20
}

fn default_mentor_threshold() -> f64 {
    0.9
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.harness.error_excerpt_chars, 100);
        assert_eq!(config.calibration.benchmarks.len(), 5);
        assert_eq!(config.calibration.benchmarks["L3"].max_time_ms, 2000.0);
        assert_eq!(config.synthesis.specialty_weight, 1.2);
        assert_eq!(config.synthesis.capabilities[1].keyword, "security");
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[harness]
error_excerpt_chars = 40

[calibration]
step_up_threshold = 0.8

[calibration.benchmarks.L1]
max_time_ms = 50.0
expected_pass_rate = 0.99

[synthesis]
mentor_threshold = 0.85

[[synthesis.tiers]]
name = "core"
agents = ["alpha", "beta"]
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.harness.error_excerpt_chars, 40);
        assert_eq!(config.harness.payload_display_chars, 200);
        assert_eq!(config.calibration.step_up_threshold, 0.8);
        assert_eq!(config.calibration.step_down_threshold, 0.3);
        let benchmarks = &config.calibration.benchmarks;
        assert_eq!(benchmarks.len(), 5);
        assert_eq!(benchmarks["L1"].max_time_ms, 50.0);
        assert_eq!(benchmarks["L3"].max_time_ms, 2000.0);
        assert_eq!(benchmarks["L5"].expected_pass_rate, 0.40);
        assert_eq!(config.synthesis.mentor_threshold, 0.85);
        assert_eq!(config.synthesis.tiers.len(), 1);
        assert_eq!(config.synthesis.tiers[0].agents, vec!["alpha", "beta"]);
        assert!(!config.synthesis.optimization_targets.is_empty());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[harness]"));
        assert!(toml_str.contains("[calibration]"));
        assert!(toml_str.contains("[synthesis]"));
    }

    #[test]
    fn test_default_toml_round_trips() {
        let parsed: Config = toml::from_str(&Config::default_toml()).unwrap();
        assert_eq!(parsed.synthesis, SynthesisConfig::default());
        assert_eq!(parsed.calibration, CalibrationConfig::default());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[synthesis]\nmax_listed = 5\n",
        )
        .unwrap();
        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.synthesis.max_listed, 5);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[synthesis\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
