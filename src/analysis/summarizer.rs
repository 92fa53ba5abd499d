//! Per-agent summarization.
//!
//! Folds one agent's ordered result list into an [`AgentSummary`]: headline
//! counts, sparse breakdowns by difficulty and category, ranked follow-ups
//! and the compact handoff package consumed by the collective synthesizer.

use crate::harness::AgentProfile;
use crate::models::{
    AgentSummary, CategoryBreakdown, CheckResult, DifficultyBreakdown, DifficultyLevel,
    EvolutionVector, HandoffPackage,
};
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Number of entries kept in each ranked list.
pub const TOP_N: usize = 3;

/// Pass rate at or above which a level is listed as a strength.
pub const STRENGTH_THRESHOLD: f64 = 0.9;

/// Pass rate below which a level is listed as a weakness.
pub const WEAKNESS_THRESHOLD: f64 = 0.5;

/// Minimum pass rate for a level to count toward the ceiling.
pub const CEILING_THRESHOLD: f64 = 0.5;

/// Pass/fail tallies over a subset of results.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_time: f64,
}

/// The one breakdown computation shared by every grouping.
pub fn tally<'a, I>(results: I) -> Tally
where
    I: IntoIterator<Item = &'a CheckResult>,
{
    let mut tally = Tally::default();
    let mut total_time = 0.0;

    for result in results {
        tally.total += 1;
        if result.passed {
            tally.passed += 1;
        }
        total_time += result.duration_ms;
    }

    tally.failed = tally.total - tally.passed;
    if tally.total > 0 {
        tally.pass_rate = tally.passed as f64 / tally.total as f64;
        tally.avg_time = total_time / tally.total as f64;
    }
    tally
}

/// Breakdown per difficulty code, only for codes that occurred.
pub fn difficulty_breakdown(results: &[CheckResult]) -> BTreeMap<String, DifficultyBreakdown> {
    DifficultyLevel::ALL
        .into_iter()
        .filter_map(|level| {
            let t = tally(results.iter().filter(|r| r.difficulty == level));
            (t.total > 0).then(|| {
                (
                    level.code().to_string(),
                    DifficultyBreakdown {
                        total: t.total,
                        passed: t.passed,
                        failed: t.failed,
                        pass_rate: t.pass_rate,
                        avg_time: t.avg_time,
                    },
                )
            })
        })
        .collect()
}

/// Breakdown per category name, only for categories that occurred.
pub fn category_breakdown(results: &[CheckResult]) -> BTreeMap<String, CategoryBreakdown> {
    crate::models::TestCategory::ALL
        .into_iter()
        .filter_map(|category| {
            let t = tally(results.iter().filter(|r| r.category == category));
            (t.total > 0).then(|| {
                (
                    category.name().to_string(),
                    CategoryBreakdown {
                        total: t.total,
                        passed: t.passed,
                        failed: t.failed,
                        pass_rate: t.pass_rate,
                    },
                )
            })
        })
        .collect()
}

/// Highest level whose pass rate is still at least 0.5; L1 when none is.
pub fn difficulty_ceiling(breakdown: &BTreeMap<String, DifficultyBreakdown>) -> DifficultyLevel {
    DifficultyLevel::ALL
        .into_iter()
        .rev()
        .find(|level| {
            breakdown
                .get(level.code())
                .is_some_and(|b| b.pass_rate >= CEILING_THRESHOLD)
        })
        .unwrap_or(DifficultyLevel::Trivial)
}

/// Failed results ranked by evolution priority, highest first.
///
/// Ties keep their original order.
pub fn ranked_failures(results: &[CheckResult], n: usize) -> Vec<&CheckResult> {
    let mut failures: Vec<&CheckResult> = results.iter().filter(|r| !r.passed).collect();
    failures.sort_by(|a, b| {
        b.signals
            .evolution_priority
            .partial_cmp(&a.signals.evolution_priority)
            .unwrap_or(Ordering::Equal)
    });
    failures.truncate(n);
    failures
}

/// Most frequent collaboration candidates, ties broken by first appearance.
pub fn top_collaborators(results: &[CheckResult], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    for candidate in results
        .iter()
        .flat_map(|r| r.signals.collaboration_candidates.iter())
    {
        let count = counts.entry(candidate.as_str()).or_insert(0);
        if *count == 0 {
            first_seen.push(candidate.as_str());
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = first_seen
        .into_iter()
        .map(|name| (name.to_string(), counts[name]))
        .collect();
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    ranked.truncate(n);
    ranked
}

/// Text used for a level listed as a strength.
pub fn strength_note(level: DifficultyLevel) -> String {
    format!("Reliable at {} difficulty checks", level)
}

/// Text used for a level listed as a weakness.
pub fn weakness_note(level: DifficultyLevel) -> String {
    format!("Struggles with {} difficulty checks", level)
}

/// Summarizes one agent's results.
pub fn summarize_agent(profile: &AgentProfile, results: &[CheckResult]) -> AgentSummary {
    let overall = tally(results);
    let difficulty_breakdown = difficulty_breakdown(results);
    let category_breakdown = category_breakdown(results);

    let critical_failures: Vec<CheckResult> = results
        .iter()
        .filter(|r| !r.passed && r.difficulty.is_critical())
        .cloned()
        .collect();

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for (code, breakdown) in &difficulty_breakdown {
        let Some(level) = DifficultyLevel::from_code(code) else {
            continue;
        };
        if breakdown.pass_rate >= STRENGTH_THRESHOLD {
            strengths.push(strength_note(level));
        }
        if breakdown.pass_rate < WEAKNESS_THRESHOLD {
            weaknesses.push(weakness_note(level));
        }
    }

    let top_failures = ranked_failures(results, TOP_N);
    let evolution_recommendations = top_failures
        .iter()
        .map(|r| {
            format!(
                "Prioritize '{}' ({}): evolution priority {:.4}",
                r.name,
                r.difficulty.code(),
                r.signals.evolution_priority
            )
        })
        .collect();

    let collaborators = top_collaborators(results, TOP_N);
    let collaboration_insights = collaborators
        .iter()
        .map(|(name, count)| format!("Pair with {} ({} overlapping checks)", name, count))
        .collect();

    let ceiling = difficulty_ceiling(&difficulty_breakdown);

    let handoff_package = HandoffPackage {
        overall_capability_score: overall.pass_rate,
        difficulty_ceiling: ceiling.code().to_string(),
        capability_gaps: critical_failures.iter().map(|r| r.name.clone()).collect(),
        evolution_vectors: top_failures
            .iter()
            .map(|r| EvolutionVector {
                area: r.name.clone(),
                priority: r.signals.evolution_priority,
                category: r.category.name().to_string(),
            })
            .collect(),
        collaboration_graph: collaborators.into_iter().collect(),
        performance_signature: difficulty_breakdown
            .iter()
            .map(|(code, b)| (code.clone(), b.pass_rate))
            .collect(),
    };

    info!(
        agent = %profile.id,
        total = overall.total,
        passed = overall.passed,
        ceiling = ceiling.code(),
        "summarized agent run"
    );

    AgentSummary {
        agent_id: profile.id.clone(),
        agent_label: profile.codename.clone(),
        agent_specialty: profile.specialty.clone(),
        total: overall.total,
        passed: overall.passed,
        failed: overall.failed,
        pass_rate: overall.pass_rate,
        avg_duration_ms: overall.avg_time,
        difficulty_breakdown,
        category_breakdown,
        critical_failures,
        strengths,
        weaknesses,
        evolution_recommendations,
        collaboration_insights,
        handoff_package,
        results: results.to_vec(),
        generated_at: Utc::now(),
    }
}
