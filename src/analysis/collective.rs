//! Collective synthesis across agents.
//!
//! [`CollectiveSynthesizer`] cross-aggregates every agent's report into a
//! [`CollectiveIntelligence`]: tier rollups, a capability matrix, a ranked
//! evolution-priority list, gap analysis and learning vectors.
//!
//! Output ordering depends only on input order and the configured registries,
//! so two runs over the same input produce the same lists.

use crate::config::SynthesisConfig;
use crate::models::{
    AgentDigest, AgentReport, CollectiveIntelligence, DifficultyLevel, EvolutionPriority,
    LearningApproach, LearningVector, TestCategory, TierPerformance,
};
use crate::tables;
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Gaps that get a named action in an evolution priority.
const MAX_GAP_ACTIONS: usize = 3;

/// Builds collective reports from per-agent reports.
#[derive(Debug, Clone, Default)]
pub struct CollectiveSynthesizer {
    config: SynthesisConfig,
}

impl CollectiveSynthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Synthesizes a collective report. `reports` is taken in insertion order.
    pub fn synthesize(&self, reports: &[AgentReport]) -> CollectiveIntelligence {
        let total_tests: usize = reports.iter().map(|r| r.total).sum();
        let total_passed: usize = reports.iter().map(|r| r.passed).sum();
        let collective_pass_rate = ratio(total_passed, total_tests);

        let evolution_priorities = self.evolution_priorities(reports);
        let learning_vectors = self.learning_vectors(reports);

        info!(
            agents = reports.len(),
            total_tests,
            priorities = evolution_priorities.len(),
            vectors = learning_vectors.len(),
            "synthesized collective report"
        );

        CollectiveIntelligence {
            timestamp: Utc::now(),
            agent_count: reports.len(),
            total_tests,
            collective_pass_rate,
            tier_performance: self.tier_performance(reports),
            capability_matrix: self.capability_matrix(reports),
            collaboration_graph: self.config.collaboration_graph.clone(),
            evolution_priorities,
            collective_strengths: self
                .dedup_capped(reports.iter().flat_map(|r| r.strengths.iter().cloned())),
            collective_weaknesses: self
                .dedup_capped(reports.iter().flat_map(|r| r.weaknesses.iter().cloned())),
            critical_gaps: self.critical_gaps(reports),
            learning_vectors,
            optimization_targets: self.config.optimization_targets.clone(),
            agent_summaries: agent_digests(reports),
        }
    }

    /// Synthesizes from a JSON object keyed by agent id.
    ///
    /// Entries that fail to parse are replaced by an empty report for that
    /// agent. A value that is not an object yields an empty collective.
    pub fn synthesize_value(&self, packages: &Value) -> CollectiveIntelligence {
        let reports: Vec<AgentReport> = match packages.as_object() {
            Some(map) => map
                .iter()
                .map(|(agent_id, value)| {
                    AgentReport::from_value(agent_id, value).unwrap_or_else(|err| {
                        warn!("{}; substituting an empty report", err);
                        AgentReport {
                            agent_id: agent_id.clone(),
                            ..AgentReport::default()
                        }
                    })
                })
                .collect(),
            None => {
                warn!("agent packages are not a JSON object; synthesizing an empty report");
                Vec::new()
            }
        };
        self.synthesize(&reports)
    }

    /// Rollup per configured tier that has at least one reporting member.
    pub fn tier_performance(&self, reports: &[AgentReport]) -> BTreeMap<String, TierPerformance> {
        let mut tiers = BTreeMap::new();

        for tier in &self.config.tiers {
            let members: Vec<&AgentReport> = reports
                .iter()
                .filter(|r| tier.agents.contains(&r.agent_id))
                .collect();
            if members.is_empty() {
                continue;
            }

            let total_tests: usize = members.iter().map(|r| r.total).sum();
            let passed: usize = members.iter().map(|r| r.passed).sum();

            let mut difficulty_distribution = BTreeMap::new();
            for level in DifficultyLevel::ALL {
                let rates: Vec<f64> = members
                    .iter()
                    .filter_map(|r| {
                        r.handoff_package
                            .performance_signature
                            .get(level.code())
                            .copied()
                    })
                    .collect();
                if !rates.is_empty() {
                    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
                    difficulty_distribution.insert(level.code().to_string(), mean);
                }
            }

            tiers.insert(
                tier.name.clone(),
                TierPerformance {
                    agents: members.iter().map(|r| r.agent_id.clone()).collect(),
                    total_tests,
                    passed,
                    pass_rate: ratio(passed, total_tests),
                    difficulty_distribution,
                },
            );
        }

        tiers
    }

    /// Capability scores per agent, boosted when the specialty matches.
    pub fn capability_matrix(
        &self,
        reports: &[AgentReport],
    ) -> BTreeMap<String, BTreeMap<String, f64>> {
        reports
            .iter()
            .map(|report| {
                let specialty = report.agent_specialty.to_lowercase();
                let pass_rate = report.effective_pass_rate();
                let scores = self
                    .config
                    .capabilities
                    .iter()
                    .map(|capability| {
                        let keyword = capability.keyword.to_lowercase();
                        let weight = if !keyword.is_empty() && specialty.contains(&keyword) {
                            self.config.specialty_weight
                        } else {
                            1.0
                        };
                        (capability.name.clone(), (pass_rate * weight).min(1.0))
                    })
                    .collect();
                (report.agent_id.clone(), scores)
            })
            .collect()
    }

    /// Agents that need work, most urgent first.
    pub fn evolution_priorities(&self, reports: &[AgentReport]) -> Vec<EvolutionPriority> {
        let mut priorities: Vec<EvolutionPriority> = reports
            .iter()
            .filter_map(|report| {
                let package = &report.handoff_package;
                let ceiling = DifficultyLevel::from_code(&package.difficulty_ceiling)
                    .unwrap_or_else(|| {
                        warn!(
                            agent = %report.agent_id,
                            ceiling = %package.difficulty_ceiling,
                            "unknown difficulty ceiling, treating as L1"
                        );
                        DifficultyLevel::Trivial
                    });
                let gaps = &package.capability_gaps;
                if gaps.is_empty() && ceiling > DifficultyLevel::Advanced {
                    return None;
                }

                let priority_score = tables::ceiling_weight(ceiling.code())
                    * (1.0 + 0.1 * gaps.len() as f64);

                Some(EvolutionPriority {
                    agent: report.agent_id.clone(),
                    gaps: gaps.clone(),
                    ceiling: ceiling.code().to_string(),
                    priority_score,
                    actions: evolution_actions(ceiling, gaps),
                })
            })
            .collect();

        priorities.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(Ordering::Equal)
        });
        priorities
    }

    /// `"{agent}: {check}"` for each critical core competency failure.
    pub fn critical_gaps(&self, reports: &[AgentReport]) -> Vec<String> {
        let core = TestCategory::CoreCompetency.name();
        self.dedup_capped(reports.iter().flat_map(|report| {
            report
                .critical_failures
                .iter()
                .filter(move |f| f.category == core)
                .map(move |f| format!("{}: {}", report.agent_id, f.name))
        }))
    }

    /// Shared-weakness clusters followed by mentor candidates.
    pub fn learning_vectors(&self, reports: &[AgentReport]) -> Vec<LearningVector> {
        let mut clusters: Vec<(&str, Vec<String>)> = Vec::new();
        for report in reports {
            for weakness in &report.weaknesses {
                match clusters.iter_mut().find(|(text, _)| *text == weakness.as_str()) {
                    Some((_, agents)) => {
                        if !agents.contains(&report.agent_id) {
                            agents.push(report.agent_id.clone());
                        }
                    }
                    None => clusters.push((weakness.as_str(), vec![report.agent_id.clone()])),
                }
            }
        }

        let shared = clusters
            .into_iter()
            .filter(|(_, agents)| agents.len() >= 2)
            .map(|(weakness, agents)| LearningVector::SharedWeakness {
                weakness: weakness.to_string(),
                agents,
                recommended_approach: LearningApproach::CollectiveTraining,
            });

        let mentors = reports
            .iter()
            .filter(|r| r.effective_pass_rate() >= self.config.mentor_threshold)
            .map(|r| LearningVector::MentorCandidate {
                mentor: r.agent_id.clone(),
                pass_rate: r.effective_pass_rate(),
                strengths: r.strengths.clone(),
                recommended_approach: LearningApproach::KnowledgeTransfer,
            });

        shared.chain(mentors).collect()
    }

    /// First-seen unique entries, capped at `max_listed`.
    fn dedup_capped<I>(&self, items: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .take(self.config.max_listed)
            .collect()
    }
}

fn evolution_actions(ceiling: DifficultyLevel, gaps: &[String]) -> Vec<String> {
    let mut actions = Vec::new();
    match ceiling {
        DifficultyLevel::Trivial | DifficultyLevel::Standard => actions.push(format!(
            "Foundational training to lift the {} ceiling",
            ceiling.code()
        )),
        DifficultyLevel::Advanced => actions.push(
            "Advanced technique practice to break through the L3 ceiling".to_string(),
        ),
        _ => {}
    }
    actions.extend(
        gaps.iter()
            .take(MAX_GAP_ACTIONS)
            .map(|gap| format!("Targeted remediation for '{}'", gap)),
    );
    actions
}

fn agent_digests(reports: &[AgentReport]) -> BTreeMap<String, AgentDigest> {
    reports
        .iter()
        .map(|r| {
            (
                r.agent_id.clone(),
                AgentDigest {
                    codename: r.agent_codename.clone(),
                    specialty: r.agent_specialty.clone(),
                    total_tests: r.total,
                    pass_rate: r.effective_pass_rate(),
                    difficulty_ceiling: r.handoff_package.difficulty_ceiling.clone(),
                    critical_failures: r.critical_failures.len(),
                },
            )
        })
        .collect()
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapabilityDefinition, TierDefinition};
    use crate::models::{CriticalFailure, HandoffPackage};

    fn report(id: &str, total: usize, passed: usize) -> AgentReport {
        AgentReport {
            agent_id: id.to_string(),
            agent_codename: id.to_uppercase(),
            total,
            passed,
            failed: total - passed,
            pass_rate: ratio(passed, total),
            handoff_package: HandoffPackage {
                overall_capability_score: ratio(passed, total),
                difficulty_ceiling: "L5".to_string(),
                ..HandoffPackage::default()
            },
            ..AgentReport::default()
        }
    }

    fn with_signature(mut r: AgentReport, entries: &[(&str, f64)]) -> AgentReport {
        r.handoff_package.performance_signature = entries
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        r
    }

    fn synthesizer() -> CollectiveSynthesizer {
        CollectiveSynthesizer::new(SynthesisConfig {
            tiers: vec![
                TierDefinition {
                    name: "front".to_string(),
                    agents: vec!["a".to_string(), "b".to_string()],
                },
                TierDefinition {
                    name: "back".to_string(),
                    agents: vec!["z".to_string()],
                },
            ],
            ..SynthesisConfig::default()
        })
    }

    #[test]
    fn test_empty_input() {
        let collective = synthesizer().synthesize(&[]);
        assert_eq!(collective.agent_count, 0);
        assert_eq!(collective.total_tests, 0);
        assert_eq!(collective.collective_pass_rate, 0.0);
        assert!(collective.tier_performance.is_empty());
        assert!(collective.evolution_priorities.is_empty());
        assert!(collective.learning_vectors.is_empty());
        assert!(!collective.optimization_targets.is_empty());
    }

    #[test]
    fn test_tier_rollup_excludes_missing_codes() {
        let a = with_signature(report("a", 10, 8), &[("L1", 1.0), ("L2", 0.6)]);
        let b = with_signature(report("b", 10, 4), &[("L1", 0.5)]);
        let outsider = report("q", 5, 5);

        let tiers = synthesizer().tier_performance(&[a, b, outsider]);
        assert_eq!(tiers.len(), 1);

        let front = &tiers["front"];
        assert_eq!(front.agents, vec!["a", "b"]);
        assert_eq!(front.total_tests, 20);
        assert_eq!(front.passed, 12);
        assert_eq!(front.pass_rate, 0.6);
        assert_eq!(front.difficulty_distribution["L1"], 0.75);
        // Only agent a has L2 data.
        assert_eq!(front.difficulty_distribution["L2"], 0.6);
        assert!(!front.difficulty_distribution.contains_key("L3"));
    }

    #[test]
    fn test_capability_matrix_specialty_boost() {
        let synth = CollectiveSynthesizer::new(SynthesisConfig {
            capabilities: vec![
                CapabilityDefinition {
                    name: "security_analysis".to_string(),
                    keyword: "security".to_string(),
                },
                CapabilityDefinition {
                    name: "documentation".to_string(),
                    keyword: "documentation".to_string(),
                },
            ],
            ..SynthesisConfig::default()
        });

        let mut guard = report("guard", 10, 5);
        guard.agent_specialty = "Security auditing".to_string();
        let mut ace = report("ace", 10, 9);
        ace.agent_specialty = "security".to_string();

        let matrix = synth.capability_matrix(&[guard, ace]);
        assert!((matrix["guard"]["security_analysis"] - 0.6).abs() < 1e-9);
        assert_eq!(matrix["guard"]["documentation"], 0.5);
        // 0.9 * 1.2 caps at 1.0
        assert_eq!(matrix["ace"]["security_analysis"], 1.0);
    }

    #[test]
    fn test_evolution_priorities_ranking() {
        let mut low = report("low", 10, 2);
        low.handoff_package.difficulty_ceiling = "L1".to_string();

        let mut mid = report("mid", 10, 6);
        mid.handoff_package.difficulty_ceiling = "L3".to_string();

        let mut gappy = report("gappy", 10, 8);
        gappy.handoff_package.difficulty_ceiling = "L5".to_string();
        gappy.handoff_package.capability_gaps =
            vec!["g1".into(), "g2".into(), "g3".into(), "g4".into()];

        let healthy = report("healthy", 10, 10);

        let priorities = synthesizer().evolution_priorities(&[gappy, healthy, mid, low]);
        let order: Vec<_> = priorities.iter().map(|p| p.agent.as_str()).collect();
        assert_eq!(order, vec!["low", "mid", "gappy"]);

        assert_eq!(priorities[0].priority_score, 1.0);
        assert!(priorities[0].actions[0].starts_with("Foundational training"));
        assert!(priorities[1].actions[0].starts_with("Advanced technique"));

        let gappy = &priorities[2];
        assert!((gappy.priority_score - 0.2 * 1.4).abs() < 1e-9);
        // No ceiling action at L5, and gap actions cap at three.
        assert_eq!(gappy.actions.len(), 3);
        assert_eq!(gappy.gaps.len(), 4);
    }

    #[test]
    fn test_evolution_priorities_stable_on_ties() {
        let mut first = report("first", 4, 1);
        first.handoff_package.difficulty_ceiling = "L2".to_string();
        let mut second = report("second", 4, 1);
        second.handoff_package.difficulty_ceiling = "L2".to_string();

        let priorities = synthesizer().evolution_priorities(&[first, second]);
        assert_eq!(priorities[0].agent, "first");
        assert_eq!(priorities[1].agent, "second");
    }

    #[test]
    fn test_unknown_ceiling_treated_as_l1() {
        let mut odd = report("odd", 3, 3);
        odd.handoff_package.difficulty_ceiling = "L7".to_string();
        let priorities = synthesizer().evolution_priorities(&[odd]);
        assert_eq!(priorities.len(), 1);
        assert_eq!(priorities[0].ceiling, "L1");
    }

    #[test]
    fn test_gap_analysis_dedup_and_cap() {
        let synth = CollectiveSynthesizer::new(SynthesisConfig {
            max_listed: 2,
            ..SynthesisConfig::default()
        });

        let mut a = report("a", 1, 1);
        a.strengths = vec!["s1".into(), "s2".into()];
        a.weaknesses = vec!["w1".into()];
        a.critical_failures = vec![
            CriticalFailure {
                name: "parse".into(),
                difficulty: "L4".into(),
                category: "core_competency".into(),
            },
            CriticalFailure {
                name: "fuzz".into(),
                difficulty: "L5".into(),
                category: "edge_case".into(),
            },
        ];
        let mut b = report("b", 1, 1);
        b.strengths = vec!["s2".into(), "s3".into()];
        b.weaknesses = vec!["w1".into(), "w2".into()];
        b.critical_failures = vec![
            CriticalFailure {
                name: "plan".into(),
                difficulty: "L4".into(),
                category: "core_competency".into(),
            },
            CriticalFailure {
                name: "plan".into(),
                difficulty: "L4".into(),
                category: "core_competency".into(),
            },
            CriticalFailure {
                name: "prove".into(),
                difficulty: "L5".into(),
                category: "core_competency".into(),
            },
        ];

        let collective = synth.synthesize(&[a, b]);
        assert_eq!(collective.collective_strengths, vec!["s1", "s2"]);
        assert_eq!(collective.collective_weaknesses, vec!["w1", "w2"]);
        assert_eq!(collective.critical_gaps, vec!["a: parse", "b: plan"]);

        let mut repeat = report("c", 2, 0);
        repeat.critical_failures = vec![
            CriticalFailure {
                name: "x".into(),
                difficulty: "L4".into(),
                category: "core_competency".into(),
            };
            2
        ];
        assert_eq!(synth.critical_gaps(&[repeat]), vec!["c: x"]);
    }

    #[test]
    fn test_shared_weakness_vector() {
        let mut a = report("a", 10, 5);
        a.weaknesses = vec!["Struggles with L4 (Expert) difficulty checks".into()];
        let mut b = report("b", 10, 5);
        b.weaknesses = vec![
            "Struggles with L4 (Expert) difficulty checks".into(),
            "Struggles with L5 (Extreme) difficulty checks".into(),
        ];

        let vectors = synthesizer().learning_vectors(&[a, b]);
        assert_eq!(vectors.len(), 1);
        match &vectors[0] {
            LearningVector::SharedWeakness {
                weakness,
                agents,
                recommended_approach,
            } => {
                assert!(weakness.contains("L4"));
                assert_eq!(agents, &vec!["a".to_string(), "b".to_string()]);
                assert_eq!(*recommended_approach, LearningApproach::CollectiveTraining);
            }
            other => panic!("unexpected vector: {:?}", other),
        }
    }

    #[test]
    fn test_mentor_threshold() {
        let mut star = report("star", 20, 19);
        star.pass_rate = 0.95;
        let mut almost = report("almost", 100, 89);
        almost.pass_rate = 0.89;

        let vectors = synthesizer().learning_vectors(&[star, almost]);
        assert_eq!(vectors.len(), 1);
        assert!(matches!(
            &vectors[0],
            LearningVector::MentorCandidate { mentor, recommended_approach: LearningApproach::KnowledgeTransfer, .. }
                if mentor == "star"
        ));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let mut inputs = Vec::new();
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            let mut r = report(id, 10, 3 + i);
            r.handoff_package.difficulty_ceiling = "L2".to_string();
            r.weaknesses = vec!["shared".into()];
            inputs.push(r);
        }

        let synth = synthesizer();
        let first = synth.synthesize(&inputs);
        let second = synth.synthesize(&inputs);
        assert_eq!(
            serde_json::to_string(&first.evolution_priorities).unwrap(),
            serde_json::to_string(&second.evolution_priorities).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&first.learning_vectors).unwrap(),
            serde_json::to_string(&second.learning_vectors).unwrap()
        );
    }

    #[test]
    fn test_synthesize_value_tolerates_malformed_entries() {
        let packages: Value =
            serde_json::from_str(include_str!("../../fixtures/agent_reports.json")).unwrap();
        let collective = synthesizer().synthesize_value(&packages);

        assert_eq!(collective.agent_count, 3);
        assert!(collective.agent_summaries.contains_key("broken"));
        assert_eq!(collective.agent_summaries["broken"].total_tests, 0);
        // The sparse entry still parses with defaults.
        assert_eq!(collective.agent_summaries["sparse"].difficulty_ceiling, "L1");
        assert_eq!(collective.total_tests, 20);
    }

    #[test]
    fn test_synthesize_value_keeps_input_order() {
        let packages = serde_json::json!({
            "zeta": {
                "weaknesses": ["w"],
                "handoff_package": { "difficulty_ceiling": "L2" }
            },
            "alpha": {
                "weaknesses": ["w"],
                "handoff_package": { "difficulty_ceiling": "L2" }
            }
        });
        let collective = synthesizer().synthesize_value(&packages);

        let order: Vec<&str> = collective
            .evolution_priorities
            .iter()
            .map(|p| p.agent.as_str())
            .collect();
        assert_eq!(order, vec!["zeta", "alpha"]);
        match &collective.learning_vectors[0] {
            LearningVector::SharedWeakness { agents, .. } => {
                assert_eq!(agents, &vec!["zeta".to_string(), "alpha".to_string()]);
            }
            other => panic!("expected a shared weakness, got {:?}", other),
        }
    }

    #[test]
    fn test_synthesize_value_non_object() {
        let collective = synthesizer().synthesize_value(&serde_json::json!([1, 2, 3]));
        assert_eq!(collective.agent_count, 0);
    }
}
