//! Execution instrumentation harness.
//!
//! A [`TestHarness`] owns the ordered result list for one agent. Each call to
//! [`TestHarness::run_check`] invokes a user-supplied check, times it, and
//! records a fully populated [`CheckResult`]. Errors and panics raised by the
//! check become failed results; they never escape the harness.

use crate::analysis::summarize_agent;
use crate::config::HarnessConfig;
use crate::models::{
    truncate_chars, AgentSummary, CheckMetrics, CheckResult, CheckSignals, DifficultyLevel,
    TestCategory,
};
use crate::tables;
use chrono::Utc;
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Decides whether an actual output matches the expected one.
pub trait Comparator {
    fn matches(&self, expected: &Value, actual: &Value) -> bool;
}

impl<F> Comparator for F
where
    F: Fn(&Value, &Value) -> bool,
{
    fn matches(&self, expected: &Value, actual: &Value) -> bool {
        self(expected, actual)
    }
}

/// Plain structural equality. Used when no comparator is supplied.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEquality;

impl Comparator for StructuralEquality {
    fn matches(&self, expected: &Value, actual: &Value) -> bool {
        expected == actual
    }
}

/// Numeric comparison within an absolute tolerance.
///
/// Falls back to structural equality when either side is not a number.
#[derive(Debug, Clone, Copy)]
pub struct ApproxEq {
    pub tolerance: f64,
}

impl Comparator for ApproxEq {
    fn matches(&self, expected: &Value, actual: &Value) -> bool {
        match (expected.as_f64(), actual.as_f64()) {
            (Some(e), Some(a)) => (e - a).abs() <= self.tolerance,
            _ => expected == actual,
        }
    }
}

/// Identity of the agent a harness records results for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentProfile {
    pub id: String,
    pub codename: String,
    pub specialty: String,
}

impl AgentProfile {
    pub fn new(
        id: impl Into<String>,
        codename: impl Into<String>,
        specialty: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            codename: codename.into(),
            specialty: specialty.into(),
        }
    }
}

/// Runs checks for a single agent and keeps their results in call order.
#[derive(Debug)]
pub struct TestHarness {
    profile: AgentProfile,
    config: HarnessConfig,
    results: Vec<CheckResult>,
}

impl TestHarness {
    pub fn new(profile: AgentProfile) -> Self {
        Self::with_config(profile, HarnessConfig::default())
    }

    pub fn with_config(profile: AgentProfile, config: HarnessConfig) -> Self {
        Self {
            profile,
            config,
            results: Vec::new(),
        }
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Results recorded so far, in call order.
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<CheckResult> {
        self.results
    }

    /// Summarizes every result recorded so far.
    pub fn summarize(&self) -> AgentSummary {
        summarize_agent(&self.profile, &self.results)
    }

    /// Runs a check and compares its output by structural equality.
    pub fn run_check<F>(
        &mut self,
        name: &str,
        difficulty: DifficultyLevel,
        category: TestCategory,
        check: F,
        input: Value,
        expected: Value,
    ) -> &CheckResult
    where
        F: FnOnce(&Value) -> anyhow::Result<Value>,
    {
        self.run_check_with(
            name,
            difficulty,
            category,
            check,
            input,
            expected,
            &StructuralEquality,
        )
    }

    /// Runs a check and compares its output with `comparator`.
    #[allow(clippy::too_many_arguments)]
    pub fn run_check_with<F, C>(
        &mut self,
        name: &str,
        difficulty: DifficultyLevel,
        category: TestCategory,
        check: F,
        input: Value,
        expected: Value,
        comparator: &C,
    ) -> &CheckResult
    where
        F: FnOnce(&Value) -> anyhow::Result<Value>,
        C: Comparator + ?Sized,
    {
        let start = Instant::now();
        let outcome = catch_check_panic(|| check(&input));
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let (actual, error, trace) = match outcome {
            Ok(Ok(value)) => (Some(value), None, None),
            Ok(Err(err)) => (None, Some(err.to_string()), Some(format!("{:?}", err))),
            Err((payload, captured)) => {
                let message = panic_message(payload.as_ref());
                let trace = captured.unwrap_or_else(|| format!("check panicked: {}", message));
                (None, Some(message), Some(trace))
            }
        };

        let passed = match (&actual, &error) {
            (Some(value), None) => comparator.matches(&expected, value),
            _ => false,
        };

        let metrics = compute_metrics(difficulty, passed, duration_ms);
        let signals = compute_signals(name, difficulty, category, passed);
        let recommendations = build_recommendations(
            difficulty,
            passed,
            error.as_deref(),
            self.config.error_excerpt_chars,
        );

        if passed {
            debug!(
                agent = %self.profile.id,
                check = name,
                difficulty = difficulty.code(),
                duration_ms,
                "check passed"
            );
        } else {
            let limit = self.config.payload_display_chars;
            warn!(
                agent = %self.profile.id,
                check = name,
                difficulty = difficulty.code(),
                expected = %truncate_chars(&expected.to_string(), limit),
                error = error.as_deref().unwrap_or("output mismatch"),
                "check failed"
            );
        }

        let index = self.results.len();
        self.results.push(CheckResult {
            id: Uuid::new_v4(),
            name: name.to_string(),
            agent_id: self.profile.id.clone(),
            agent_label: self.profile.codename.clone(),
            difficulty,
            category,
            passed,
            duration_ms,
            input,
            expected,
            actual,
            error,
            trace,
            metrics,
            recommendations,
            signals,
            timestamp: Utc::now(),
        });

        &self.results[index]
    }
}

thread_local! {
    static IN_CHECK: Cell<bool> = const { Cell::new(false) };
    static PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Installs a process-wide hook that records the location and backtrace of
/// panics raised inside a check. Panics elsewhere go to the previous hook.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if IN_CHECK.with(Cell::get) {
                let trace = format!(
                    "{}\n\nstack backtrace:\n{}",
                    info,
                    Backtrace::force_capture()
                );
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            } else {
                previous(info);
            }
        }));
    });
}

type PanicOutcome = (Box<dyn Any + Send>, Option<String>);

/// Runs `f`, turning a panic into its payload plus the captured trace.
fn catch_check_panic<T>(f: impl FnOnce() -> T) -> Result<T, PanicOutcome> {
    install_panic_hook();
    let outer = IN_CHECK.with(|flag| flag.replace(true));
    PANIC_TRACE.with(|slot| slot.borrow_mut().take());

    let outcome = panic::catch_unwind(AssertUnwindSafe(f));

    IN_CHECK.with(|flag| flag.set(outer));
    let captured = PANIC_TRACE.with(|slot| slot.borrow_mut().take());
    outcome.map_err(|payload| (payload, captured))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "check panicked with a non-string payload".to_string()
    }
}

/// Derived metrics for one result.
pub fn compute_metrics(difficulty: DifficultyLevel, passed: bool, duration_ms: f64) -> CheckMetrics {
    let i = difficulty.index();
    CheckMetrics {
        complexity_score: tables::COMPLEXITY_BASE[i] * (1.0 + (duration_ms / 1000.0).min(1.0)),
        reliability_indicator: if passed { 1.0 } else { 0.0 },
        efficiency_ratio: (tables::EXPECTED_TIME_MS[i] / duration_ms.max(1.0)).min(2.0),
    }
}

/// Advisory signals for one result.
///
/// Failures weigh nine times a success, and core competency failures half
/// again as much.
pub fn compute_signals(
    name: &str,
    difficulty: DifficultyLevel,
    category: TestCategory,
    passed: bool,
) -> CheckSignals {
    let evolution_priority = if passed {
        0.1 * difficulty.weight()
    } else {
        let category_factor = if category == TestCategory::CoreCompetency {
            1.5
        } else {
            1.0
        };
        0.9 * difficulty.weight() * category_factor
    };

    CheckSignals {
        capability_demonstrated: passed.then(|| name.to_string()),
        capability_gap: (!passed).then(|| name.to_string()),
        difficulty_ceiling: (!passed).then_some(difficulty),
        evolution_priority,
        collaboration_candidates: tables::collaborator_roles(category)
            .iter()
            .map(|role| role.to_string())
            .collect(),
    }
}

fn build_recommendations(
    difficulty: DifficultyLevel,
    passed: bool,
    error: Option<&str>,
    excerpt_chars: usize,
) -> Vec<String> {
    if passed {
        return Vec::new();
    }

    let mut recommendations = Vec::new();
    if difficulty.is_critical() {
        recommendations.push(format!(
            "{} capability needs enhanced attention",
            difficulty
        ));
    }
    match error {
        Some(message) => recommendations.push(format!(
            "Investigate error: {}",
            truncate_chars(message, excerpt_chars)
        )),
        None => recommendations.push("Output did not match the expected value".to_string()),
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    fn harness() -> TestHarness {
        TestHarness::new(AgentProfile::new("agent-01", "Atlas", "code generation"))
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_passing_check() {
        let mut h = harness();
        let result = h.run_check(
            "double",
            DifficultyLevel::Trivial,
            TestCategory::CoreCompetency,
            |input| Ok(json!(input.as_i64().unwrap_or(0) * 2)),
            json!(21),
            json!(42),
        );

        assert!(result.passed);
        assert_eq!(result.actual, Some(json!(42)));
        assert!(result.error.is_none());
        assert!(result.recommendations.is_empty());
        assert_eq!(result.metrics.reliability_indicator, 1.0);
        assert_eq!(result.signals.capability_demonstrated.as_deref(), Some("double"));
        assert!(result.signals.capability_gap.is_none());
        assert!(result.signals.difficulty_ceiling.is_none());
        assert!(approx(result.signals.evolution_priority, 0.1 * 0.10));
        assert_eq!(result.agent_id, "agent-01");
        assert_eq!(result.agent_label, "Atlas");
    }

    #[test]
    fn test_mismatch_fails_without_error() {
        let mut h = harness();
        let result = h.run_check(
            "off_by_one",
            DifficultyLevel::Standard,
            TestCategory::EdgeCase,
            |_| Ok(json!(2)),
            json!(null),
            json!(3),
        );

        assert!(!result.passed);
        assert!(result.error.is_none());
        assert_eq!(result.signals.capability_gap.as_deref(), Some("off_by_one"));
        assert_eq!(result.signals.difficulty_ceiling, Some(DifficultyLevel::Standard));
        assert_eq!(
            result.signals.collaboration_candidates,
            vec!["edge_case_reviewer", "qa_validator"]
        );
        assert_eq!(result.recommendations.len(), 1);
    }

    #[test]
    fn test_error_is_captured() {
        let mut h = harness();
        let long_message = "x".repeat(300);
        let result = h.run_check(
            "explodes",
            DifficultyLevel::Extreme,
            TestCategory::CoreCompetency,
            move |_| Err(anyhow!(long_message)),
            json!({}),
            json!(1),
        );

        assert!(!result.passed);
        assert!(result.actual.is_none());
        assert_eq!(result.error.as_ref().map(|e| e.len()), Some(300));
        assert!(result.trace.is_some());
        assert!(approx(result.signals.evolution_priority, 0.2025));
        assert_eq!(result.recommendations.len(), 2);
        assert!(result.recommendations[0].contains("enhanced attention"));
        // 100 char excerpt plus the ellipsis
        assert!(result.recommendations[1].ends_with(&format!("{}...", "x".repeat(100))));
    }

    #[test]
    fn test_panic_is_isolated() {
        let mut h = harness();
        h.run_check(
            "panics",
            DifficultyLevel::Advanced,
            TestCategory::Stress,
            |_| panic!("boom"),
            json!(null),
            json!(null),
        );
        h.run_check(
            "after",
            DifficultyLevel::Trivial,
            TestCategory::Stress,
            |_| Ok(json!(true)),
            json!(null),
            json!(true),
        );

        let results = h.results();
        assert_eq!(results.len(), 2);
        assert!(!results[0].passed);
        assert_eq!(results[0].error.as_deref(), Some("boom"));
        let trace = results[0].trace.as_deref().unwrap_or_default();
        assert!(trace.contains("harness.rs"), "no panic location in {}", trace);
        assert!(trace.contains("stack backtrace"));
        assert!(results[1].passed);
    }

    #[test]
    fn test_custom_comparator() {
        let mut h = harness();
        let result = h.run_check_with(
            "pi",
            DifficultyLevel::Standard,
            TestCategory::Novelty,
            |_| Ok(json!(3.14159)),
            json!(null),
            json!(3.14),
            &ApproxEq { tolerance: 0.01 },
        );
        assert!(result.passed);

        let case_insensitive = |expected: &Value, actual: &Value| {
            expected.as_str().map(str::to_lowercase) == actual.as_str().map(str::to_lowercase)
        };
        let result = h.run_check_with(
            "shout",
            DifficultyLevel::Trivial,
            TestCategory::Novelty,
            |_| Ok(json!("HELLO")),
            json!(null),
            json!("hello"),
            &case_insensitive,
        );
        assert!(result.passed);
    }

    #[test]
    fn test_results_keep_call_order() {
        let mut h = harness();
        for name in ["a", "b", "c"] {
            h.run_check(
                name,
                DifficultyLevel::Trivial,
                TestCategory::CoreCompetency,
                |_| Ok(json!(0)),
                json!(null),
                json!(0),
            );
        }
        let names: Vec<_> = h.results().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_compute_metrics() {
        let fast = compute_metrics(DifficultyLevel::Advanced, true, 0.5);
        assert!(approx(fast.complexity_score, 0.6 * 1.0005));
        assert_eq!(fast.efficiency_ratio, 2.0);

        let slow = compute_metrics(DifficultyLevel::Advanced, false, 4000.0);
        assert!(approx(slow.complexity_score, 1.2));
        assert!(approx(slow.efficiency_ratio, 0.5));
        assert_eq!(slow.reliability_indicator, 0.0);
    }

    #[test]
    fn test_evolution_priority_asymmetry() {
        let core = compute_signals("x", DifficultyLevel::Expert, TestCategory::CoreCompetency, false);
        let edge = compute_signals("x", DifficultyLevel::Expert, TestCategory::EdgeCase, false);
        let pass = compute_signals("x", DifficultyLevel::Expert, TestCategory::CoreCompetency, true);
        assert!(approx(core.evolution_priority, 0.9 * 0.25 * 1.5));
        assert!(approx(edge.evolution_priority, 0.9 * 0.25));
        assert!(approx(pass.evolution_priority, 0.025));
    }

    #[test]
    fn test_display_payloads() {
        let mut h = harness();
        let result = h.run_check(
            "echo",
            DifficultyLevel::Trivial,
            TestCategory::CoreCompetency,
            |_| Err(anyhow!("nope")),
            json!("abcdefghij"),
            json!([1, 2, 3]),
        );
        let shown = result.display_payloads(5);
        assert_eq!(shown.input, "\"abcd...");
        assert_eq!(shown.expected, "[1,2,...");
        assert_eq!(shown.actual, "<none>");
    }
}
