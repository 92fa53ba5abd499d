//! Analysis stages.
//!
//! Per-agent summarization feeds collective synthesis; neither stage mutates
//! its input.

pub mod collective;
pub mod summarizer;

pub use collective::CollectiveSynthesizer;
pub use summarizer::summarize_agent;
