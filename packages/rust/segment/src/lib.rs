//! Segmenters: turn raw source material into an ordered sequence of segments.
//!
//! This crate provides:
//! - [`periods`] — calendar windows (quarters, consecutive months)
//! - [`chunker`] — overlapping word windows over document pages
//!
//! Both are deterministic: identical input always yields the same segments
//! in the same order.

pub mod chunker;
pub mod periods;

use chainfold_shared::{ChunkConfig, Page, PeriodWindow, Result, Segment};

pub use chunker::{TOKENS_PER_WORD, WordWindow, chunk_pages};
pub use periods::{monthly_periods, quarterly_periods};

/// Number period windows as consecutive segments.
pub fn period_segments(windows: Vec<PeriodWindow>) -> Vec<Segment> {
    windows
        .into_iter()
        .enumerate()
        .map(|(i, window)| Segment::period(i, window))
        .collect()
}

/// Chunk document pages into segments.
pub fn document_segments(pages: &[Page], config: &ChunkConfig) -> Result<Vec<Segment>> {
    Ok(chunk_pages(pages, config)?
        .into_iter()
        .map(Segment::chunk)
        .collect())
}
