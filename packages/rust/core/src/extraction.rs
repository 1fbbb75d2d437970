//! Structured extraction over a chunked document.

use async_trait::async_trait;

use chainfold_segment::document_segments;
use chainfold_shared::{AppConfig, ChainfoldError, ChunkConfig, Page, Result, Segment, SegmentSource};

use crate::aggregate::{Aggregate, Delta, FinalResult, StructuredAggregate};
use crate::cap::{CapPolicy, NameLengthCap};
use crate::engine::Strategy;
use crate::{parse, prompts};

/// Default category bounded after every merge.
pub const DEFAULT_CAPPED_CATEGORY: &str = "Technology";

/// Default limit for the capped category.
pub const DEFAULT_MAX_PER_CATEGORY: usize = 20;

/// Builds a deduplicated knowledge graph from a document's pages.
pub struct PaperExtraction {
    source_id: String,
    pages: Vec<Page>,
    chunking: ChunkConfig,
    cap: Box<dyn CapPolicy>,
}

impl PaperExtraction {
    pub fn new(source_id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            source_id: source_id.into(),
            pages,
            chunking: ChunkConfig::default(),
            cap: Box::new(NameLengthCap::new(
                DEFAULT_CAPPED_CATEGORY,
                DEFAULT_MAX_PER_CATEGORY,
            )),
        }
    }

    /// Chunking and capping taken from the `[extraction]` config section.
    pub fn from_config(source_id: impl Into<String>, pages: Vec<Page>, config: &AppConfig) -> Self {
        Self::new(source_id, pages)
            .with_chunking(ChunkConfig::from(config))
            .with_cap(NameLengthCap::new(
                config.extraction.capped_category.clone(),
                config.extraction.max_per_category,
            ))
    }

    pub fn with_chunking(mut self, chunking: ChunkConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_cap(mut self, cap: impl CapPolicy + 'static) -> Self {
        self.cap = Box::new(cap);
        self
    }
}

fn structured(aggregate: &Aggregate) -> Result<&StructuredAggregate> {
    match aggregate {
        Aggregate::Structured(s) => Ok(s),
        other => Err(ChainfoldError::validation(format!(
            "extraction run received a {} aggregate",
            other.kind()
        ))),
    }
}

#[async_trait]
impl Strategy for PaperExtraction {
    fn name(&self) -> &str {
        "extraction"
    }

    fn plan(&self) -> Result<(Vec<Segment>, Aggregate)> {
        let segments = document_segments(&self.pages, &self.chunking)?;
        let aggregate = StructuredAggregate::new(chainfold_shared::Extraction::for_source(
            self.source_id.clone(),
        ));
        Ok((segments, Aggregate::Structured(aggregate)))
    }

    async fn step_prompt(&self, segment: &Segment, aggregate: &Aggregate) -> Result<String> {
        let SegmentSource::Chunk(chunk) = &segment.source else {
            return Err(ChainfoldError::validation(format!(
                "extraction run cannot process {}",
                segment.display_label()
            )));
        };
        let running = &structured(aggregate)?.extraction;
        Ok(prompts::extraction_prompt(&chunk.text, running))
    }

    fn parse_delta(&self, _segment: &Segment, raw: &str) -> Result<Delta> {
        parse::parse_extraction(raw).map(Delta::Structured)
    }

    fn repair_prompt(&self, raw: &str) -> Option<String> {
        Some(prompts::repair_prompt(raw))
    }

    fn cap(&self, aggregate: Aggregate) -> Aggregate {
        match aggregate {
            Aggregate::Structured(s) => Aggregate::Structured(StructuredAggregate {
                extraction: self.cap.apply(s.extraction),
                cursor: s.cursor,
            }),
            narrative => narrative,
        }
    }

    fn synthesis_prompt(&self, _aggregate: &Aggregate) -> Option<String> {
        None
    }

    fn finish(&self, aggregate: Aggregate, _synthesis: Option<String>) -> Result<FinalResult> {
        match aggregate {
            Aggregate::Structured(s) => Ok(FinalResult::Structured(s.extraction)),
            other => Err(ChainfoldError::validation(format!(
                "extraction run finished with a {} aggregate",
                other.kind()
            ))),
        }
    }
}
