//! Fixed lookup tables.
//!
//! Every per-level constant the pipeline uses lives here as plain data,
//! indexed by [`DifficultyLevel::index`]. Lookups keyed by a raw code string
//! fall back to a documented default instead of failing.

use crate::models::{DifficultyLevel, TestCategory};

/// Importance multiplier per level (L1..L5). Sums to 1.0.
pub const DIFFICULTY_WEIGHT: [f64; 5] = [0.10, 0.20, 0.30, 0.25, 0.15];

/// Base complexity score per level, scaled up by slow runs.
pub const COMPLEXITY_BASE: [f64; 5] = [0.2, 0.4, 0.6, 0.8, 1.0];

/// Expected wall-clock time per level in milliseconds.
pub const EXPECTED_TIME_MS: [f64; 5] = [100.0, 500.0, 2000.0, 5000.0, 10000.0];

/// Base urgency per difficulty ceiling. A lower ceiling is more urgent.
pub const CEILING_WEIGHT: [f64; 5] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Default calibration benchmarks: (code, max_time_ms, expected_pass_rate).
pub const DEFAULT_BENCHMARKS: [(&str, f64, f64); 5] = [
    ("L1", 100.0, 0.95),
    ("L2", 500.0, 0.85),
    ("L3", 2000.0, 0.70),
    ("L4", 5000.0, 0.55),
    ("L5", 10000.0, 0.40),
];

/// Benchmark used for codes missing from the table.
pub const FALLBACK_MAX_TIME_MS: f64 = 1000.0;
pub const FALLBACK_PASS_RATE: f64 = 0.5;

/// Suggested reviewer roles per category.
pub const COLLABORATOR_ROLES: [(TestCategory, &[&str]); 6] = [
    (TestCategory::CoreCompetency, &["domain_specialist"]),
    (
        TestCategory::EdgeCase,
        &["edge_case_reviewer", "qa_validator"],
    ),
    (
        TestCategory::Collaboration,
        &["integration_coordinator", "protocol_mediator"],
    ),
    (TestCategory::Stress, &["performance_engineer"]),
    (TestCategory::Novelty, &["research_explorer"]),
    (
        TestCategory::Evolution,
        &["evolution_architect", "domain_specialist"],
    ),
];

/// Named capabilities and the specialty keyword that boosts each one.
pub const DEFAULT_CAPABILITIES: [(&str, &str); 6] = [
    ("code_generation", "code"),
    ("security_analysis", "security"),
    ("performance_optimization", "performance"),
    ("test_design", "test"),
    ("documentation", "documentation"),
    ("architecture_design", "architecture"),
];

/// Default tier membership.
pub const DEFAULT_TIERS: [(&str, &[&str]); 3] = [
    ("foundation", &["agent-01", "agent-02", "agent-03"]),
    ("specialist", &["agent-04", "agent-05", "agent-06"]),
    ("orchestration", &["agent-07", "agent-08"]),
];

/// Default suggested-partner adjacency.
pub const DEFAULT_COLLABORATION_GRAPH: [(&str, &[&str]); 8] = [
    ("agent-01", &["agent-02", "agent-04"]),
    ("agent-02", &["agent-01", "agent-05"]),
    ("agent-03", &["agent-06"]),
    ("agent-04", &["agent-01", "agent-07"]),
    ("agent-05", &["agent-02", "agent-08"]),
    ("agent-06", &["agent-03", "agent-07"]),
    ("agent-07", &["agent-04", "agent-06", "agent-08"]),
    ("agent-08", &["agent-05", "agent-07"]),
];

/// Fixed advisory list carried into every collective report.
pub const DEFAULT_OPTIMIZATION_TARGETS: [&str; 5] = [
    "Reduce mean check latency at L4/L5 below benchmark time",
    "Raise collective pass rate on core competency checks",
    "Pair mentor candidates with agents sharing weaknesses",
    "Expand edge case coverage for agents with low ceilings",
    "Re-run calibration after each evolution cycle",
];

/// Collaborator roles for a category.
pub fn collaborator_roles(category: TestCategory) -> &'static [&'static str] {
    COLLABORATOR_ROLES
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, roles)| *roles)
        .unwrap_or(&[])
}

/// Ceiling urgency for a raw code. Unknown codes are treated as L1.
pub fn ceiling_weight(code: &str) -> f64 {
    DifficultyLevel::from_code(code)
        .map(|level| CEILING_WEIGHT[level.index()])
        .unwrap_or(CEILING_WEIGHT[0])
}
