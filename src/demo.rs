//! Built-in demo suite.
//!
//! A few toy checks run against simulated agents. Each agent answers
//! correctly up to its skill level and returns a wrong answer above it; one
//! agent errors out on the hardest checks.

use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};
use telemetry_synth::config::HarnessConfig;
use telemetry_synth::{AgentProfile, ApproxEq, DifficultyLevel, TestCategory, TestHarness};

type CheckFn = fn(&Value) -> Result<Value>;

/// A simulated agent.
pub struct DemoAgent {
    pub profile: AgentProfile,
    pub skill: DifficultyLevel,
    pub errors_above_skill: bool,
}

struct DemoCheck {
    name: &'static str,
    difficulty: DifficultyLevel,
    category: TestCategory,
    run: CheckFn,
    input: fn() -> Value,
    expected: fn() -> Value,
}

pub fn agents() -> Vec<DemoAgent> {
    vec![
        DemoAgent {
            profile: AgentProfile::new("agent-01", "Atlas", "code generation"),
            skill: DifficultyLevel::Extreme,
            errors_above_skill: false,
        },
        DemoAgent {
            profile: AgentProfile::new("agent-02", "Beacon", "test design"),
            skill: DifficultyLevel::Advanced,
            errors_above_skill: false,
        },
        DemoAgent {
            profile: AgentProfile::new("agent-04", "Cipher", "security analysis"),
            skill: DifficultyLevel::Standard,
            errors_above_skill: true,
        },
        DemoAgent {
            profile: AgentProfile::new("agent-07", "Docent", "architecture and documentation"),
            skill: DifficultyLevel::Standard,
            errors_above_skill: false,
        },
    ]
}

fn suite() -> Vec<DemoCheck> {
    vec![
        DemoCheck {
            name: "reverse_string",
            difficulty: DifficultyLevel::Trivial,
            category: TestCategory::CoreCompetency,
            run: reverse_string,
            input: || json!("telemetry"),
            expected: || json!("yrtemelet"),
        },
        DemoCheck {
            name: "sum_list",
            difficulty: DifficultyLevel::Standard,
            category: TestCategory::CoreCompetency,
            run: sum_list,
            input: || json!([1, 2, 3, 4]),
            expected: || json!(10),
        },
        DemoCheck {
            name: "sort_empty",
            difficulty: DifficultyLevel::Standard,
            category: TestCategory::EdgeCase,
            run: sort_numbers,
            input: || json!([]),
            expected: || json!([]),
        },
        DemoCheck {
            name: "fibonacci_40",
            difficulty: DifficultyLevel::Advanced,
            category: TestCategory::Stress,
            run: fibonacci,
            input: || json!(40),
            expected: || json!(102334155),
        },
        DemoCheck {
            name: "balanced_brackets",
            difficulty: DifficultyLevel::Expert,
            category: TestCategory::CoreCompetency,
            run: balanced_brackets,
            input: || json!("{[()()]}([])"),
            expected: || json!(true),
        },
        DemoCheck {
            name: "collatz_steps",
            difficulty: DifficultyLevel::Expert,
            category: TestCategory::Novelty,
            run: collatz_steps,
            input: || json!(27),
            expected: || json!(111),
        },
        DemoCheck {
            name: "merge_schedules",
            difficulty: DifficultyLevel::Extreme,
            category: TestCategory::Collaboration,
            run: merge_schedules,
            input: || json!([[1, 3], [2, 6], [8, 10], [9, 12]]),
            expected: || json!([[1, 6], [8, 12]]),
        },
    ]
}

/// Runs the suite for one agent on a fresh harness.
pub fn run_agent(agent: &DemoAgent, config: &HarnessConfig) -> TestHarness {
    let mut harness = TestHarness::with_config(agent.profile.clone(), config.clone());

    for check in suite() {
        let within_skill = check.difficulty <= agent.skill;
        let errors = agent.errors_above_skill;
        let run = check.run;
        let attempt = move |input: &Value| -> Result<Value> {
            if within_skill {
                run(input)
            } else if errors {
                bail!("gave up on input {}", input)
            } else {
                Ok(Value::Null)
            }
        };

        if check.name == "fibonacci_40" {
            harness.run_check_with(
                check.name,
                check.difficulty,
                check.category,
                attempt,
                (check.input)(),
                (check.expected)(),
                &ApproxEq { tolerance: 0.5 },
            );
        } else {
            harness.run_check(
                check.name,
                check.difficulty,
                check.category,
                attempt,
                (check.input)(),
                (check.expected)(),
            );
        }
    }

    harness
}

fn reverse_string(input: &Value) -> Result<Value> {
    let s = input.as_str().ok_or_else(|| anyhow!("expected a string"))?;
    Ok(json!(s.chars().rev().collect::<String>()))
}

fn numbers(input: &Value) -> Result<Vec<i64>> {
    input
        .as_array()
        .ok_or_else(|| anyhow!("expected an array"))?
        .iter()
        .map(|v| v.as_i64().ok_or_else(|| anyhow!("expected integers")))
        .collect()
}

fn sum_list(input: &Value) -> Result<Value> {
    Ok(json!(numbers(input)?.iter().sum::<i64>()))
}

fn sort_numbers(input: &Value) -> Result<Value> {
    let mut values = numbers(input)?;
    values.sort_unstable();
    Ok(json!(values))
}

fn fibonacci(input: &Value) -> Result<Value> {
    let n = input.as_u64().ok_or_else(|| anyhow!("expected a count"))?;
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a.checked_add(b).ok_or_else(|| anyhow!("overflow"))?;
        a = b;
        b = next;
    }
    Ok(json!(a))
}

fn balanced_brackets(input: &Value) -> Result<Value> {
    let s = input.as_str().ok_or_else(|| anyhow!("expected a string"))?;
    let mut stack = Vec::new();
    for c in s.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Ok(json!(false));
                }
            }
            _ => {}
        }
    }
    Ok(json!(stack.is_empty()))
}

fn collatz_steps(input: &Value) -> Result<Value> {
    let mut n = input.as_u64().ok_or_else(|| anyhow!("expected a number"))?;
    if n == 0 {
        bail!("collatz is undefined for 0");
    }
    let mut steps = 0u64;
    while n != 1 {
        n = if n % 2 == 0 { n / 2 } else { 3 * n + 1 };
        steps += 1;
    }
    Ok(json!(steps))
}

fn merge_schedules(input: &Value) -> Result<Value> {
    let mut spans: Vec<(i64, i64)> = input
        .as_array()
        .ok_or_else(|| anyhow!("expected a list of spans"))?
        .iter()
        .map(|span| -> Result<(i64, i64)> {
            let pair = numbers(span)?;
            match pair.as_slice() {
                [start, end] => Ok((*start, *end)),
                _ => bail!("span must have two ends"),
            }
        })
        .collect::<Result<_>>()?;
    spans.sort_unstable();

    let mut merged: Vec<(i64, i64)> = Vec::new();
    for (start, end) in spans {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    Ok(json!(merged
        .into_iter()
        .map(|(s, e)| vec![s, e])
        .collect::<Vec<_>>()))
}
