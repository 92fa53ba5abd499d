//! Telemetry Synth - test-telemetry aggregation and priority synthesis.
//!
//! The pipeline has three stages. A [`TestHarness`] runs instrumented checks
//! for one agent. [`summarize_agent`] folds its results into an
//! [`AgentSummary`]. A [`CollectiveSynthesizer`] cross-aggregates every
//! agent's report into a [`CollectiveIntelligence`] that ranks where
//! improvement effort should go.
//!
//! The core performs no file or network I/O. Results and reports are plain
//! serde-serializable values.

pub mod analysis;
pub mod calibration;
pub mod config;
pub mod error;
pub mod harness;
pub mod models;
pub mod sink;
pub mod tables;

pub use analysis::{summarize_agent, CollectiveSynthesizer};
pub use calibration::{DifficultyCalibrator, DifficultyValidation};
pub use config::Config;
pub use error::{TelemetryError, TelemetryResult};
pub use harness::{AgentProfile, ApproxEq, Comparator, StructuralEquality, TestHarness};
pub use models::{
    AgentReport, AgentSummary, CheckResult, CollectiveIntelligence, DifficultyLevel,
    HandoffPackage, LearningVector, TestCategory,
};
pub use sink::{MemorySink, SummarySink};
