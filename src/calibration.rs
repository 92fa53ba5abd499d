//! Difficulty calibration.
//!
//! Compares a check's claimed difficulty against how it actually behaved and
//! suggests where the next run should be pitched. Purely advisory: nothing
//! here touches a stored result.

use crate::config::{CalibrationConfig, PerformanceExpectation};
use crate::models::{AgentSummary, CheckResult, DifficultyLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Outcome of checking one claimed difficulty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyValidation {
    pub check: String,
    pub claimed: DifficultyLevel,
    pub suggested: DifficultyLevel,
    pub is_accurate: bool,
    /// Duration over the level's benchmark time.
    pub time_factor: f64,
    /// Complexity score over the level's base score (1.0 to 2.0 for
    /// harness-produced results).
    pub complexity_factor: f64,
}

/// Benchmark lookups and adaptive stepping.
#[derive(Debug, Clone, Default)]
pub struct DifficultyCalibrator {
    config: CalibrationConfig,
}

impl DifficultyCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Benchmark for a code, or the fallback when the code is unknown.
    pub fn expected_performance(&self, code: &str) -> PerformanceExpectation {
        self.config
            .benchmarks
            .get(code)
            .copied()
            .unwrap_or(self.config.fallback)
    }

    /// Steps up after a strong run, down after a weak one.
    pub fn adaptive_next_difficulty(
        &self,
        pass_rate: f64,
        current: DifficultyLevel,
    ) -> DifficultyLevel {
        if pass_rate >= self.config.step_up_threshold {
            current.step_up()
        } else if pass_rate < self.config.step_down_threshold {
            current.step_down()
        } else {
            current
        }
    }

    /// Checks whether a claimed difficulty matches observed timing.
    pub fn validate_claimed_difficulty(
        &self,
        name: &str,
        claimed: DifficultyLevel,
        duration_ms: f64,
        complexity_score: f64,
    ) -> DifficultyValidation {
        let benchmark = self.expected_performance(claimed.code());
        let time_factor = if benchmark.max_time_ms > 0.0 {
            duration_ms / benchmark.max_time_ms
        } else {
            0.0
        };
        let base = crate::tables::COMPLEXITY_BASE[claimed.index()];
        let complexity_factor = complexity_score / base;

        let suggested = if time_factor > 2.0 {
            claimed.step_up()
        } else if time_factor < 0.2 {
            claimed.step_down()
        } else {
            claimed
        };

        debug!(
            check = name,
            claimed = claimed.code(),
            suggested = suggested.code(),
            time_factor,
            "validated claimed difficulty"
        );

        DifficultyValidation {
            check: name.to_string(),
            claimed,
            suggested,
            is_accurate: suggested == claimed,
            time_factor,
            complexity_factor,
        }
    }

    /// Validates every result in a run.
    pub fn calibrate_results(&self, results: &[CheckResult]) -> Vec<DifficultyValidation> {
        results
            .iter()
            .map(|r| {
                self.validate_claimed_difficulty(
                    &r.name,
                    r.difficulty,
                    r.duration_ms,
                    r.metrics.complexity_score,
                )
            })
            .collect()
    }

    /// Next difficulty for every level the agent attempted, keyed by code.
    pub fn recommend_next_levels(&self, summary: &AgentSummary) -> BTreeMap<String, DifficultyLevel> {
        summary
            .difficulty_breakdown
            .iter()
            .filter_map(|(code, breakdown)| {
                DifficultyLevel::from_code(code).map(|level| {
                    (
                        code.clone(),
                        self.adaptive_next_difficulty(breakdown.pass_rate, level),
                    )
                })
            })
            .collect()
    }
}
