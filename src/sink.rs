//! Hand-off of finished agent summaries.
//!
//! A harness run ends by passing its [`AgentSummary`] to a [`SummarySink`].
//! [`MemorySink`] keeps the synthesizer-facing reports in arrival order so
//! they can be synthesized once every contributing run has finished.

use crate::analysis::CollectiveSynthesizer;
use crate::models::{AgentReport, AgentSummary, CollectiveIntelligence};
use anyhow::Result;
use tracing::debug;

/// Receives finished agent summaries.
pub trait SummarySink {
    fn accept(&mut self, summary: &AgentSummary) -> Result<()>;
}

/// Collects reports in memory, replacing an earlier report for the same agent.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: Vec<AgentReport>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> &[AgentReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Synthesizes everything collected so far.
    pub fn synthesize(&self, synthesizer: &CollectiveSynthesizer) -> CollectiveIntelligence {
        synthesizer.synthesize(&self.reports)
    }
}

impl SummarySink for MemorySink {
    fn accept(&mut self, summary: &AgentSummary) -> Result<()> {
        let report = summary.report();
        match self
            .reports
            .iter_mut()
            .find(|r| r.agent_id == report.agent_id)
        {
            Some(existing) => {
                debug!(agent = %report.agent_id, "replacing earlier report");
                *existing = report;
            }
            None => self.reports.push(report),
        }
        Ok(())
    }
}
