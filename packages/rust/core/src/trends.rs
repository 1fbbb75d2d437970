//! Narrative trend analysis over consecutive time windows.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use chainfold_segment::period_segments;
use chainfold_shared::{ChainfoldError, PeriodWindow, Result, Segment, SegmentSource};
use chainfold_sources::SearchSource;

use crate::aggregate::{
    Aggregate, Delta, FinalResult, NarrativeAggregate, NarrativeReport, PeriodOutput,
};
use crate::engine::Strategy;
use crate::{parse, prompts};

/// Tracks how discussion of a query evolves across periods, then answers once.
pub struct TrendAnalysis {
    query: String,
    windows: Vec<PeriodWindow>,
    search: Arc<dyn SearchSource>,
}

impl TrendAnalysis {
    pub fn new(query: impl Into<String>, windows: Vec<PeriodWindow>, search: Arc<dyn SearchSource>) -> Self {
        Self {
            query: query.into(),
            windows,
            search,
        }
    }
}

fn narrative(aggregate: &Aggregate) -> Result<&NarrativeAggregate> {
    match aggregate {
        Aggregate::Narrative(n) => Ok(n),
        other => Err(ChainfoldError::validation(format!(
            "trend run received a {} aggregate",
            other.kind()
        ))),
    }
}

#[async_trait]
impl Strategy for TrendAnalysis {
    fn name(&self) -> &str {
        "trends"
    }

    fn plan(&self) -> Result<(Vec<Segment>, Aggregate)> {
        let segments = period_segments(self.windows.clone());
        let aggregate = NarrativeAggregate::for_query(self.query.clone());
        Ok((segments, Aggregate::Narrative(aggregate)))
    }

    async fn step_prompt(&self, segment: &Segment, aggregate: &Aggregate) -> Result<String> {
        let SegmentSource::Period(window) = &segment.source else {
            return Err(ChainfoldError::validation(format!(
                "trend run cannot process {}",
                segment.display_label()
            )));
        };
        let current = narrative(aggregate)?;

        let results = self.search.search(&self.query, window).await?;
        debug!(period = %window.label, chars = results.len(), "fetched period data");

        Ok(prompts::period_analysis_prompt(
            &self.query,
            window,
            current,
            &results,
        ))
    }

    fn parse_delta(&self, segment: &Segment, raw: &str) -> Result<Delta> {
        let delta = parse::parse_narrative(&segment.display_label(), raw);
        if matches!(delta.output, PeriodOutput::MarkersAbsent { .. }) {
            warn!(period = %delta.label, "analysis markers missing, using synthetic note");
        }
        Ok(Delta::Narrative(delta))
    }

    fn synthesis_prompt(&self, aggregate: &Aggregate) -> Option<String> {
        match aggregate {
            Aggregate::Narrative(n) => Some(prompts::synthesis_prompt(&self.query, n)),
            Aggregate::Structured(_) => None,
        }
    }

    fn finish(&self, aggregate: Aggregate, synthesis: Option<String>) -> Result<FinalResult> {
        let n = match aggregate {
            Aggregate::Narrative(n) => n,
            other => {
                return Err(ChainfoldError::validation(format!(
                    "trend run finished with a {} aggregate",
                    other.kind()
                )));
            }
        };
        let answer = synthesis
            .ok_or_else(|| ChainfoldError::validation("trend run finished without a synthesis"))?;

        Ok(FinalResult::Narrative(NarrativeReport {
            query: n.source_id,
            answer,
            period_notes: n.period_notes,
            running_summary: n.running_summary,
        }))
    }
}
