//! The accumulation engine for chainfold.
//!
//! A run walks an ordered list of segments, asking a [`Generator`] to fold
//! each one into a growing aggregate, then finishes with an optional
//! synthesis call. Two shapes are provided:
//! - [`TrendAnalysis`]: narrative notes per time period plus a running summary
//! - [`PaperExtraction`]: a deduplicated, capped entity/relationship graph
//!
//! [`Generator`]: chainfold_llm::Generator

pub mod aggregate;
pub mod cap;
pub mod engine;
pub mod extraction;
pub mod merge;
pub mod parse;
pub mod prompts;
pub mod repair;
pub mod trends;

#[cfg(test)]
mod test_support;

pub use aggregate::{
    Aggregate, AggregateKind, Delta, FinalResult, NarrativeAggregate, NarrativeDelta,
    NarrativeReport, PeriodOutput, StructuredAggregate,
};
pub use cap::{CapPolicy, NameLengthCap, cap_category};
pub use engine::{Engine, Phase, RunObserver, SilentObserver, Strategy};
pub use extraction::PaperExtraction;
pub use merge::{merge, merge_extraction};
pub use repair::RetryPolicy;
pub use trends::TrendAnalysis;
