//! The accumulation loop.
//!
//! A run moves through `Planning -> Processing(0..n) -> Synthesizing -> Done`.
//! Each processing step builds a prompt from the current segment and the
//! whole aggregate, generates, parses (with bounded repair), merges, caps,
//! and advances the cursor. The cursor alone decides when processing stops.

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use chainfold_llm::{Generator, generate_text};
use chainfold_shared::{Result, RunId, Segment};

use crate::aggregate::{Aggregate, Delta, FinalResult};
use crate::merge::merge;
use crate::repair::RetryPolicy;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    /// Processing the segment at this index.
    Processing(usize),
    Synthesizing,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => f.write_str("planning"),
            Self::Processing(i) => write!(f, "processing segment {i}"),
            Self::Synthesizing => f.write_str("synthesizing"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// The phase that follows once the aggregate's cursor reads `cursor`.
pub fn next_phase(cursor: usize, segment_count: usize) -> Phase {
    if cursor < segment_count {
        Phase::Processing(cursor)
    } else {
        Phase::Synthesizing
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// The parts of a run that differ between accumulation shapes.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Produce the ordered segments and the initial aggregate. Never generates.
    fn plan(&self) -> Result<(Vec<Segment>, Aggregate)>;

    /// Build the step prompt from `segment` and the full current aggregate.
    async fn step_prompt(&self, segment: &Segment, aggregate: &Aggregate) -> Result<String>;

    /// Parse raw model output for `segment` into a delta.
    fn parse_delta(&self, segment: &Segment, raw: &str) -> Result<Delta>;

    /// Prompt asking the model to fix output that failed to parse. Shapes
    /// whose parsing cannot fail keep the default and never repair.
    fn repair_prompt(&self, _raw: &str) -> Option<String> {
        None
    }

    /// Prune the aggregate after a merge.
    fn cap(&self, aggregate: Aggregate) -> Aggregate {
        aggregate
    }

    /// Prompt for the single synthesis call, if this shape makes one.
    fn synthesis_prompt(&self, aggregate: &Aggregate) -> Option<String>;

    /// Turn the final aggregate (and synthesis output, if any) into the result.
    fn finish(&self, aggregate: Aggregate, synthesis: Option<String>) -> Result<FinalResult>;
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Callbacks for reporting run progress.
pub trait RunObserver: Send + Sync {
    fn phase(&self, phase: Phase);
    fn planned(&self, _segments: &[Segment]) {}
    fn segment_done(&self, segment: &Segment, total: usize);
}

/// No-op observer for when progress is not needed.
pub struct SilentObserver;

impl RunObserver for SilentObserver {
    fn phase(&self, _phase: Phase) {}
    fn segment_done(&self, _segment: &Segment, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives a [`Strategy`] against a [`Generator`].
pub struct Engine<'a> {
    generator: &'a dyn Generator,
    retry: RetryPolicy,
    observer: &'a dyn RunObserver,
}

impl<'a> Engine<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self {
            generator,
            retry: RetryPolicy::default(),
            observer: &SilentObserver,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn RunObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Run `strategy` to completion.
    ///
    /// Any step failure aborts the run with the segment index attached. A blank
    /// completion is a transport failure and is never sent for repair.
    #[instrument(skip_all, fields(run_id = %RunId::new(), strategy = strategy.name()))]
    pub async fn run(&self, strategy: &dyn Strategy) -> Result<FinalResult> {
        self.enter(Phase::Planning);
        let (segments, mut aggregate) = strategy.plan()?;
        self.observer.planned(&segments);
        info!(
            segments = segments.len(),
            kind = %aggregate.kind(),
            "planned run"
        );

        let mut phase = next_phase(aggregate.cursor(), segments.len());
        while let Phase::Processing(cursor) = phase {
            self.enter(phase);
            let segment = &segments[cursor];
            aggregate = self
                .step(strategy, segment, &aggregate)
                .await
                .map_err(|e| {
                    warn!(segment = segment.index, error = %e, "step failed");
                    e.at_segment(segment.index)
                })?;
            self.observer.segment_done(segment, segments.len());
            phase = next_phase(aggregate.cursor(), segments.len());
        }

        self.enter(Phase::Synthesizing);
        let synthesis = match strategy.synthesis_prompt(&aggregate) {
            Some(prompt) => Some(generate_text(self.generator, &prompt).await?),
            None => None,
        };
        let result = strategy.finish(aggregate, synthesis)?;

        self.enter(Phase::Done);
        Ok(result)
    }

    /// One accumulation step: prompt, generate, parse, merge, cap, advance.
    #[instrument(skip_all, fields(segment = %segment.display_label()))]
    async fn step(
        &self,
        strategy: &dyn Strategy,
        segment: &Segment,
        aggregate: &Aggregate,
    ) -> Result<Aggregate> {
        let prompt = strategy.step_prompt(segment, aggregate).await?;
        let raw = generate_text(self.generator, &prompt).await?;

        let delta = self
            .retry
            .parse_with_repair(
                self.generator,
                raw,
                |text| strategy.parse_delta(segment, text),
                |text| strategy.repair_prompt(text),
            )
            .await?;

        let merged = strategy.cap(merge(aggregate, delta)?);
        debug!(cursor = merged.cursor() + 1, "step complete");
        Ok(merged.advanced())
    }

    fn enter(&self, phase: Phase) {
        info!(%phase, "entering phase");
        self.observer.phase(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chainfold_shared::{ChainfoldError, Entity, Extraction, Page, SegmentSource};

    use crate::aggregate::StructuredAggregate;
    use crate::extraction::PaperExtraction;
    use crate::test_support::ScriptedGenerator;

    #[test]
    fn cursor_drives_phase() {
        assert_eq!(next_phase(0, 2), Phase::Processing(0));
        assert_eq!(next_phase(1, 2), Phase::Processing(1));
        assert_eq!(next_phase(2, 2), Phase::Synthesizing);
        assert_eq!(next_phase(0, 0), Phase::Synthesizing);
    }

    /// Three one-page chunks: each page is short enough to be its own chunk.
    fn three_chunk_run() -> PaperExtraction {
        let words = |tag: &str| vec![tag; 10].join(" ");
        PaperExtraction::new(
            "1706.03762",
            vec![
                Page::new(1, words("alpha")),
                Page::new(2, words("beta")),
                Page::new(3, words("gamma")),
            ],
        )
        .with_chunking(chainfold_shared::ChunkConfig {
            chunk_size_tokens: 13,
            overlap_tokens: 0,
        })
    }

    fn entities(names: &[&str]) -> String {
        let items: Vec<_> = names
            .iter()
            .map(|n| serde_json::json!({"name": n, "entity_type": "Paper"}))
            .collect();
        serde_json::json!({ "entities": items }).to_string()
    }

    #[tokio::test]
    async fn structured_run_unions_deltas_in_order() {
        let generator = ScriptedGenerator::new([
            entities(&["A"]),
            entities(&["A", "B"]),
            entities(&["B", "C"]),
        ]);

        let result = Engine::new(&generator).run(&three_chunk_run()).await.unwrap();

        let FinalResult::Structured(ext) = result else {
            panic!("expected structured result");
        };
        let names: Vec<_> = ext.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(ext.source_id.as_deref(), Some("1706.03762"));
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn each_prompt_sees_the_whole_aggregate() {
        let generator = ScriptedGenerator::new([
            entities(&["Attention"]),
            entities(&["Encoder"]),
            entities(&[]),
        ]);

        Engine::new(&generator).run(&three_chunk_run()).await.unwrap();

        let prompts = generator.prompts();
        assert!(!prompts[0].contains("\"name\": \"Attention\""));
        assert!(prompts[1].contains("\"name\": \"Attention\""));
        assert!(prompts[2].contains("\"name\": \"Attention\""));
        assert!(prompts[2].contains("\"name\": \"Encoder\""));
        assert!(prompts[2].contains("gamma gamma"));
    }

    #[tokio::test]
    async fn embedded_object_needs_no_repair() {
        let generator = ScriptedGenerator::new([
            format!("Here you go:\n```json\n{}\n```", entities(&["A"])),
            entities(&[]),
            entities(&[]),
        ]);

        Engine::new(&generator).run(&three_chunk_run()).await.unwrap();
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn refusal_gets_one_repair_then_fails_naming_segment() {
        let generator = ScriptedGenerator::new([
            entities(&["A"]),
            "I cannot comply".to_string(),
            "I still cannot comply".to_string(),
        ]);

        let err = Engine::new(&generator)
            .run(&three_chunk_run())
            .await
            .unwrap_err();

        assert!(matches!(err, ChainfoldError::Parse { segment: Some(1), .. }));
        assert!(err.to_string().contains("in segment 1"));
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[2].starts_with("Convert the following text"));
        assert!(prompts[2].contains("I cannot comply"));
    }

    #[tokio::test]
    async fn repaired_output_continues_the_run() {
        let generator = ScriptedGenerator::new([
            "nothing useful".to_string(),
            entities(&["A"]),
            entities(&["B"]),
            entities(&["C"]),
        ]);

        let result = Engine::new(&generator).run(&three_chunk_run()).await.unwrap();
        let FinalResult::Structured(ext) = result else {
            panic!("expected structured result");
        };
        assert_eq!(ext.entities.len(), 3);
        assert_eq!(generator.calls(), 4);
    }

    #[tokio::test]
    async fn transport_failure_aborts_with_segment() {
        let generator = ScriptedGenerator::new([entities(&["A"])]).then_fail("connection refused");

        let err = Engine::new(&generator)
            .run(&three_chunk_run())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainfoldError::Transport { segment: Some(1), .. }));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn blank_structured_reply_aborts_without_repair() {
        let generator = ScriptedGenerator::new([
            entities(&["A"]),
            "   ".to_string(),
            entities(&["B"]),
        ]);

        let err = Engine::new(&generator)
            .run(&three_chunk_run())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainfoldError::Transport { segment: Some(1), .. }));
        assert!(err.to_string().contains("empty response"));
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn blank_narrative_reply_aborts_the_run() {
        use std::sync::Arc;

        use crate::test_support::StubSearch;
        use crate::trends::TrendAnalysis;

        let windows = chainfold_segment::quarterly_periods(2024).unwrap();
        let run = TrendAnalysis::new("AI agents", windows, Arc::new(StubSearch::new()));
        let generator = ScriptedGenerator::new(["", "", "", "", "final"]);

        let err = Engine::new(&generator).run(&run).await.unwrap_err();
        assert!(matches!(err, ChainfoldError::Transport { segment: Some(0), .. }));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn blank_synthesis_is_transport_error() {
        use std::sync::Arc;

        use crate::test_support::StubSearch;
        use crate::trends::TrendAnalysis;

        let run = TrendAnalysis::new("AI agents", Vec::new(), Arc::new(StubSearch::new()));
        let generator = ScriptedGenerator::new(["\n\t"]);

        let err = Engine::new(&generator).run(&run).await.unwrap_err();
        assert!(matches!(err, ChainfoldError::Transport { segment: None, .. }));
    }

    #[tokio::test]
    async fn empty_document_makes_no_calls() {
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        let run = PaperExtraction::new("empty", Vec::new());

        let result = Engine::new(&generator).run(&run).await.unwrap();
        assert_eq!(
            result,
            FinalResult::Structured(Extraction::for_source("empty"))
        );
        assert_eq!(generator.calls(), 0);
    }

    struct Recorder(Mutex<Vec<Phase>>);

    impl RunObserver for Recorder {
        fn phase(&self, phase: Phase) {
            self.0.lock().unwrap().push(phase);
        }
        fn segment_done(&self, _segment: &Segment, _total: usize) {}
    }

    #[tokio::test]
    async fn phases_are_reported_in_order() {
        let generator = ScriptedGenerator::new([entities(&[]), entities(&[]), entities(&[])]);
        let recorder = Recorder(Mutex::new(Vec::new()));

        Engine::new(&generator)
            .with_observer(&recorder)
            .run(&three_chunk_run())
            .await
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                Phase::Planning,
                Phase::Processing(0),
                Phase::Processing(1),
                Phase::Processing(2),
                Phase::Synthesizing,
                Phase::Done,
            ]
        );
    }

    /// A strategy whose aggregate already starts past its only segment.
    struct PreAdvanced;

    #[async_trait]
    impl Strategy for PreAdvanced {
        fn name(&self) -> &str {
            "pre-advanced"
        }
        fn plan(&self) -> Result<(Vec<Segment>, Aggregate)> {
            let chunk = chainfold_shared::TextChunk {
                chunk_index: 0,
                total_chunks: 1,
                text: "unused".into(),
                page_start: 1,
                page_end: 1,
            };
            let mut aggregate = StructuredAggregate::new(Extraction::default());
            aggregate.extraction.entities.push(Entity::new("Seed", "Paper"));
            aggregate.cursor = 1;
            Ok((vec![Segment::chunk(chunk)], Aggregate::Structured(aggregate)))
        }
        async fn step_prompt(&self, segment: &Segment, _aggregate: &Aggregate) -> Result<String> {
            let SegmentSource::Chunk(chunk) = &segment.source else {
                unreachable!()
            };
            Ok(chunk.text.clone())
        }
        fn parse_delta(&self, _segment: &Segment, raw: &str) -> Result<Delta> {
            crate::parse::parse_extraction(raw).map(Delta::Structured)
        }
        fn synthesis_prompt(&self, _aggregate: &Aggregate) -> Option<String> {
            None
        }
        fn finish(&self, aggregate: Aggregate, _synthesis: Option<String>) -> Result<FinalResult> {
            let Aggregate::Structured(s) = aggregate else {
                unreachable!()
            };
            Ok(FinalResult::Structured(s.extraction))
        }
    }

    #[tokio::test]
    async fn cursor_past_segments_skips_processing() {
        let generator = ScriptedGenerator::new(Vec::<String>::new());
        let result = Engine::new(&generator).run(&PreAdvanced).await.unwrap();
        let FinalResult::Structured(ext) = result else {
            panic!("expected structured result");
        };
        assert_eq!(ext.entities[0].name, "Seed");
        assert_eq!(generator.calls(), 0);
    }
}
