//! Error types for lookups and report parsing.
//!
//! None of these abort a pipeline run: callers inside the core fall back to
//! defaults and log a warning.

use thiserror::Error;

/// Errors produced while parsing codes or agent reports.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A difficulty code or name outside L1..L5.
    #[error("unknown difficulty level: {0}")]
    UnknownDifficulty(String),

    /// A category name not in the fixed set.
    #[error("unknown test category: {0}")]
    UnknownCategory(String),

    /// An agent report whose fields have the wrong shape.
    #[error("malformed report for agent '{agent}': {source}")]
    MalformedReport {
        agent: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience result alias.
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;
