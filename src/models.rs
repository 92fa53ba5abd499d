//! Data models for the telemetry pipeline.
//!
//! This module contains all the core data structures passed between the
//! harness, the per-agent summarizer and the collective synthesizer.

use crate::error::{TelemetryError, TelemetryResult};
use crate::tables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Difficulty level of a check. Ordered L1 < L2 < ... < L5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DifficultyLevel {
    /// Basic functionality and simple operations
    #[serde(rename = "L1")]
    Trivial,
    /// Typical operational complexity
    #[serde(rename = "L2")]
    Standard,
    /// Multi-step reasoning
    #[serde(rename = "L3")]
    Advanced,
    /// Deep domain knowledge required
    #[serde(rename = "L4")]
    Expert,
    /// Novel challenges at the edge of capability
    #[serde(rename = "L5")]
    Extreme,
}

impl DifficultyLevel {
    /// All levels in ascending order.
    pub const ALL: [DifficultyLevel; 5] = [
        DifficultyLevel::Trivial,
        DifficultyLevel::Standard,
        DifficultyLevel::Advanced,
        DifficultyLevel::Expert,
        DifficultyLevel::Extreme,
    ];

    /// Position in [`DifficultyLevel::ALL`], used to index the lookup tables.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Short code, "L1" through "L5".
    pub fn code(&self) -> &'static str {
        match self {
            DifficultyLevel::Trivial => "L1",
            DifficultyLevel::Standard => "L2",
            DifficultyLevel::Advanced => "L3",
            DifficultyLevel::Expert => "L4",
            DifficultyLevel::Extreme => "L5",
        }
    }

    /// Importance multiplier.
    pub fn weight(&self) -> f64 {
        tables::DIFFICULTY_WEIGHT[self.index()]
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            DifficultyLevel::Trivial => "Basic functionality and simple operations",
            DifficultyLevel::Standard => "Standard operational complexity",
            DifficultyLevel::Advanced => "Complex multi-step reasoning",
            DifficultyLevel::Expert => "Expert-level domain knowledge",
            DifficultyLevel::Extreme => "Extreme edge cases and novel challenges",
        }
    }

    /// Looks up a level by its code.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.code() == code)
    }

    /// One level harder, saturating at L5.
    pub fn step_up(self) -> Self {
        Self::ALL
            .get(self.index() + 1)
            .copied()
            .unwrap_or(DifficultyLevel::Extreme)
    }

    /// One level easier, saturating at L1.
    pub fn step_down(self) -> Self {
        self.index()
            .checked_sub(1)
            .map(|i| Self::ALL[i])
            .unwrap_or(DifficultyLevel::Trivial)
    }

    /// EXPERT and EXTREME failures count as critical.
    pub fn is_critical(&self) -> bool {
        matches!(self, DifficultyLevel::Expert | DifficultyLevel::Extreme)
    }

    fn label(&self) -> &'static str {
        match self {
            DifficultyLevel::Trivial => "Trivial",
            DifficultyLevel::Standard => "Standard",
            DifficultyLevel::Advanced => "Advanced",
            DifficultyLevel::Expert => "Expert",
            DifficultyLevel::Extreme => "Extreme",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.label())
    }
}

impl FromStr for DifficultyLevel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(level) = Self::from_code(&trimmed.to_uppercase()) {
            return Ok(level);
        }
        Self::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| TelemetryError::UnknownDifficulty(s.to_string()))
    }
}

/// Grouping key for checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    CoreCompetency,
    EdgeCase,
    Collaboration,
    Stress,
    Novelty,
    Evolution,
}

impl TestCategory {
    pub const ALL: [TestCategory; 6] = [
        TestCategory::CoreCompetency,
        TestCategory::EdgeCase,
        TestCategory::Collaboration,
        TestCategory::Stress,
        TestCategory::Novelty,
        TestCategory::Evolution,
    ];

    /// The snake_case name used as a map key.
    pub fn name(&self) -> &'static str {
        match self {
            TestCategory::CoreCompetency => "core_competency",
            TestCategory::EdgeCase => "edge_case",
            TestCategory::Collaboration => "collaboration",
            TestCategory::Stress => "stress",
            TestCategory::Novelty => "novelty",
            TestCategory::Evolution => "evolution",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TestCategory {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|category| category.name() == normalized)
            .ok_or_else(|| TelemetryError::UnknownCategory(s.to_string()))
    }
}

/// Derived per-result metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckMetrics {
    /// Level base score scaled by up to 2x for slow runs.
    pub complexity_score: f64,
    /// 1.0 when passed, 0.0 otherwise.
    pub reliability_indicator: f64,
    /// Expected time over actual time, capped at 2.0.
    pub efficiency_ratio: f64,
}

/// Advisory signals attached to each result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSignals {
    pub capability_demonstrated: Option<String>,
    pub capability_gap: Option<String>,
    /// Set on failure: this level may be beyond current capability.
    pub difficulty_ceiling: Option<DifficultyLevel>,
    pub evolution_priority: f64,
    pub collaboration_candidates: Vec<String>,
}

/// Outcome of a single instrumented check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub id: Uuid,
    pub name: String,
    pub agent_id: String,
    pub agent_label: String,
    pub difficulty: DifficultyLevel,
    pub category: TestCategory,
    pub passed: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    pub input: Value,
    pub expected: Value,
    /// Output of the check; `None` when it errored before producing one.
    pub actual: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Panic location and stack for panics. For errors, the cause chain,
    /// plus a backtrace when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub metrics: CheckMetrics,
    pub recommendations: Vec<String>,
    pub signals: CheckSignals,
    pub timestamp: DateTime<Utc>,
}

/// Truncated renderings of a result's payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadDisplay {
    pub input: String,
    pub expected: String,
    pub actual: String,
}

impl CheckResult {
    /// Renders input/expected/actual as strings of at most `limit` characters.
    pub fn display_payloads(&self, limit: usize) -> PayloadDisplay {
        PayloadDisplay {
            input: truncate_chars(&self.input.to_string(), limit),
            expected: truncate_chars(&self.expected.to_string(), limit),
            actual: match &self.actual {
                Some(value) => truncate_chars(&value.to_string(), limit),
                None => "<none>".to_string(),
            },
        }
    }
}

/// Truncates on a character boundary, appending "..." when shortened.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}

/// Pass/fail counts for one difficulty level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBreakdown {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    /// Mean duration in milliseconds.
    pub avg_time: f64,
}

/// Pass/fail counts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

/// A ranked failure re-expressed for the synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionVector {
    pub area: String,
    pub priority: f64,
    pub category: String,
}

/// Compact digest an agent hands to the collective synthesizer.
///
/// Every field defaults so partially populated packages still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffPackage {
    pub overall_capability_score: f64,
    pub difficulty_ceiling: String,
    pub capability_gaps: Vec<String>,
    pub evolution_vectors: Vec<EvolutionVector>,
    pub collaboration_graph: BTreeMap<String, usize>,
    pub performance_signature: BTreeMap<String, f64>,
}

impl Default for HandoffPackage {
    fn default() -> Self {
        Self {
            overall_capability_score: 0.0,
            difficulty_ceiling: DifficultyLevel::Trivial.code().to_string(),
            capability_gaps: Vec::new(),
            evolution_vectors: Vec::new(),
            collaboration_graph: BTreeMap::new(),
            performance_signature: BTreeMap::new(),
        }
    }
}

/// Statistical summary of one agent's run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub agent_label: String,
    pub agent_specialty: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_duration_ms: f64,
    /// Keyed by difficulty code; only levels that occurred.
    pub difficulty_breakdown: BTreeMap<String, DifficultyBreakdown>,
    /// Keyed by category name; only categories that occurred.
    pub category_breakdown: BTreeMap<String, CategoryBreakdown>,
    pub critical_failures: Vec<CheckResult>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub evolution_recommendations: Vec<String>,
    pub collaboration_insights: Vec<String>,
    pub handoff_package: HandoffPackage,
    pub results: Vec<CheckResult>,
    pub generated_at: DateTime<Utc>,
}

impl AgentSummary {
    /// Difficulty ceiling as a typed level.
    pub fn difficulty_ceiling(&self) -> DifficultyLevel {
        DifficultyLevel::from_code(&self.handoff_package.difficulty_ceiling)
            .unwrap_or(DifficultyLevel::Trivial)
    }

    /// The synthesizer-facing view of this summary.
    pub fn report(&self) -> AgentReport {
        AgentReport {
            agent_id: self.agent_id.clone(),
            agent_codename: self.agent_label.clone(),
            agent_specialty: self.agent_specialty.clone(),
            total: self.total,
            passed: self.passed,
            failed: self.failed,
            pass_rate: self.pass_rate,
            avg_duration_ms: self.avg_duration_ms,
            strengths: self.strengths.clone(),
            weaknesses: self.weaknesses.clone(),
            critical_failures: self
                .critical_failures
                .iter()
                .map(|r| CriticalFailure {
                    name: r.name.clone(),
                    difficulty: r.difficulty.code().to_string(),
                    category: r.category.name().to_string(),
                })
                .collect(),
            handoff_package: self.handoff_package.clone(),
        }
    }
}

/// A critical failure as seen by the synthesizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalFailure {
    pub name: String,
    pub difficulty: String,
    pub category: String,
}

/// Per-agent input to the collective synthesizer.
///
/// Missing keys default to empty or zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentReport {
    pub agent_id: String,
    pub agent_codename: String,
    pub agent_specialty: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_duration_ms: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub critical_failures: Vec<CriticalFailure>,
    pub handoff_package: HandoffPackage,
}

impl AgentReport {
    /// Parses a report from loosely structured JSON.
    pub fn from_value(agent_id: &str, value: &Value) -> TelemetryResult<Self> {
        let mut report: AgentReport =
            serde_json::from_value(value.clone()).map_err(|source| {
                TelemetryError::MalformedReport {
                    agent: agent_id.to_string(),
                    source,
                }
            })?;
        if report.agent_id.is_empty() {
            report.agent_id = agent_id.to_string();
        }
        Ok(report)
    }

    /// Pass rate, falling back to the handoff score when no totals were supplied.
    pub fn effective_pass_rate(&self) -> f64 {
        if self.total == 0 && self.pass_rate == 0.0 {
            self.handoff_package.overall_capability_score
        } else {
            self.pass_rate
        }
    }
}

/// Rollup for one tier of agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierPerformance {
    pub agents: Vec<String>,
    pub total_tests: usize,
    pub passed: usize,
    pub pass_rate: f64,
    /// Mean pass rate per code over members that have data for it.
    pub difficulty_distribution: BTreeMap<String, f64>,
}

/// One agent's entry in the ranked evolution list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionPriority {
    pub agent: String,
    pub gaps: Vec<String>,
    pub ceiling: String,
    pub priority_score: f64,
    pub actions: Vec<String>,
}

/// How a learning vector should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningApproach {
    CollectiveTraining,
    KnowledgeTransfer,
}

/// A detected cross-agent pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "vector_type", rename_all = "snake_case")]
pub enum LearningVector {
    /// Two or more agents report the same weakness.
    SharedWeakness {
        weakness: String,
        agents: Vec<String>,
        recommended_approach: LearningApproach,
    },
    /// An agent reliable enough to teach others.
    MentorCandidate {
        mentor: String,
        pass_rate: f64,
        strengths: Vec<String>,
        recommended_approach: LearningApproach,
    },
}

/// Compact per-agent digest carried in the collective report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDigest {
    pub codename: String,
    pub specialty: String,
    pub total_tests: usize,
    pub pass_rate: f64,
    pub difficulty_ceiling: String,
    pub critical_failures: usize,
}

/// The collective report over every agent in a synthesis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectiveIntelligence {
    pub timestamp: DateTime<Utc>,
    pub agent_count: usize,
    pub total_tests: usize,
    pub collective_pass_rate: f64,
    pub tier_performance: BTreeMap<String, TierPerformance>,
    pub capability_matrix: BTreeMap<String, BTreeMap<String, f64>>,
    pub collaboration_graph: BTreeMap<String, Vec<String>>,
    pub evolution_priorities: Vec<EvolutionPriority>,
    pub collective_strengths: Vec<String>,
    pub collective_weaknesses: Vec<String>,
    pub critical_gaps: Vec<String>,
    pub learning_vectors: Vec<LearningVector>,
    pub optimization_targets: Vec<String>,
    pub agent_summaries: BTreeMap<String, AgentDigest>,
}
