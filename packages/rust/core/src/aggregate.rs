//! Aggregate state, deltas, and final results.
//!
//! The aggregate is a plain value threaded through the loop: every step
//! consumes a borrowed aggregate and returns a new one, so the value seen
//! before a failed step is never half-updated.

use std::fmt;

use serde::Serialize;

use chainfold_shared::Extraction;

/// Which accumulation shape an aggregate or delta belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Narrative,
    Structured,
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Narrative => f.write_str("narrative"),
            Self::Structured => f.write_str("structured"),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Running notes plus a summary that is rewritten every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NarrativeAggregate {
    /// The query being analysed.
    pub source_id: Option<String>,
    /// Index of the next segment to process.
    pub cursor: usize,
    /// One labelled note per processed period, in order.
    pub period_notes: Vec<String>,
    /// Summary of everything processed so far.
    pub running_summary: String,
}

impl NarrativeAggregate {
    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            source_id: Some(query.into()),
            ..Default::default()
        }
    }
}

/// Deduplicated extraction records plus the loop cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredAggregate {
    pub extraction: Extraction,
    /// Index of the next segment to process.
    pub cursor: usize,
}

impl StructuredAggregate {
    pub fn new(extraction: Extraction) -> Self {
        Self {
            extraction,
            cursor: 0,
        }
    }
}

/// The accumulated result-so-far.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Narrative(NarrativeAggregate),
    Structured(StructuredAggregate),
}

impl Aggregate {
    pub fn kind(&self) -> AggregateKind {
        match self {
            Self::Narrative(_) => AggregateKind::Narrative,
            Self::Structured(_) => AggregateKind::Structured,
        }
    }

    /// Index of the next segment; the only thing that decides when the loop ends.
    pub fn cursor(&self) -> usize {
        match self {
            Self::Narrative(n) => n.cursor,
            Self::Structured(s) => s.cursor,
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            Self::Narrative(n) => n.source_id.as_deref(),
            Self::Structured(s) => s.extraction.source_id.as_deref(),
        }
    }

    /// The same aggregate with its cursor moved past the current segment.
    pub fn advanced(self) -> Self {
        match self {
            Self::Narrative(mut n) => {
                n.cursor += 1;
                Self::Narrative(n)
            }
            Self::Structured(mut s) => {
                s.cursor += 1;
                Self::Structured(s)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Deltas
// ---------------------------------------------------------------------------

/// What the model said about one period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodOutput {
    /// Both `PERIOD ANALYSIS:` and `UPDATED SUMMARY:` were present.
    Tagged {
        period_note: String,
        updated_summary: String,
    },
    /// At least one marker was missing; the note is synthesized from the raw text.
    MarkersAbsent {
        synthetic_note: String,
        updated_summary: String,
    },
}

impl PeriodOutput {
    pub fn note(&self) -> &str {
        match self {
            Self::Tagged { period_note, .. } => period_note,
            Self::MarkersAbsent { synthetic_note, .. } => synthetic_note,
        }
    }

    pub fn updated_summary(&self) -> &str {
        match self {
            Self::Tagged {
                updated_summary, ..
            }
            | Self::MarkersAbsent {
                updated_summary, ..
            } => updated_summary,
        }
    }
}

/// One period's contribution to a narrative aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeDelta {
    /// Period label the note is filed under.
    pub label: String,
    pub output: PeriodOutput,
}

/// One segment's parsed contribution, before merging.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Narrative(NarrativeDelta),
    /// New records, not yet deduplicated against the aggregate.
    Structured(Extraction),
}

impl Delta {
    pub fn kind(&self) -> AggregateKind {
        match self {
            Self::Narrative(_) => AggregateKind::Narrative,
            Self::Structured(_) => AggregateKind::Structured,
        }
    }
}

// ---------------------------------------------------------------------------
// Final results
// ---------------------------------------------------------------------------

/// The synthesized answer for a narrative run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeReport {
    pub query: Option<String>,
    /// Final answer produced by the synthesis call.
    pub answer: String,
    pub period_notes: Vec<String>,
    pub running_summary: String,
}

/// What a finished run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalResult {
    Narrative(NarrativeReport),
    Structured(Extraction),
}

impl FinalResult {
    /// Text suitable for direct display: the answer, or pretty-printed JSON.
    pub fn to_display_text(&self) -> String {
        match self {
            Self::Narrative(report) => report.answer.clone(),
            Self::Structured(extraction) => serde_json::to_string_pretty(extraction)
                .expect("extraction has only string keys and JSON values"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_moves_only_the_cursor() {
        let agg = Aggregate::Narrative(NarrativeAggregate::for_query("AI agents"));
        let next = agg.clone().advanced().advanced();
        assert_eq!(next.cursor(), 2);
        assert_eq!(next.source_id(), Some("AI agents"));
        assert_eq!(agg.cursor(), 0);
    }

    #[test]
    fn kinds_match_variants() {
        let structured = Aggregate::Structured(StructuredAggregate::new(Extraction::for_source("x")));
        assert_eq!(structured.kind(), AggregateKind::Structured);
        assert_eq!(Delta::Structured(Extraction::default()).kind(), AggregateKind::Structured);
        assert_eq!(AggregateKind::Narrative.to_string(), "narrative");
    }

    #[test]
    fn period_output_accessors() {
        let tagged = PeriodOutput::Tagged {
            period_note: "note".into(),
            updated_summary: "summary".into(),
        };
        assert_eq!(tagged.note(), "note");
        assert_eq!(tagged.updated_summary(), "summary");
    }

    #[test]
    fn structured_result_displays_as_json() {
        let result = FinalResult::Structured(Extraction::for_source("1706.03762"));
        let text = result.to_display_text();
        assert!(text.contains("\"source_id\": \"1706.03762\""));
    }
}
