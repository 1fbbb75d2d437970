//! Core domain types shared by every chainfold crate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying a single accumulation run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// A calendar window analysed as one narrative segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    /// First day of the window (inclusive).
    pub start: NaiveDate,
    /// Last day of the window (inclusive).
    pub end: NaiveDate,
    /// Display label, e.g. `Q1 2024` or `December 2024`.
    pub label: String,
}

/// One page of extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number in the source document.
    pub number: u32,
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// A word-window over the concatenated pages of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Zero-based position of the chunk.
    pub chunk_index: usize,
    /// Number of chunks produced for the whole document.
    pub total_chunks: usize,
    /// Chunk words joined by single spaces.
    pub text: String,
    /// First page the chunk touches (inclusive).
    pub page_start: u32,
    /// Last page the chunk touches (inclusive).
    pub page_end: u32,
}

/// Where a segment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentSource {
    /// A time window; the payload is fetched when the segment is processed.
    Period(PeriodWindow),
    /// A document chunk; the payload is the chunk text.
    Chunk(TextChunk),
}

/// One ordered unit of source material fed through one accumulation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Stable position in the run's segment sequence.
    pub index: usize,
    /// Optional human-readable label.
    pub label: Option<String>,
    pub source: SegmentSource,
}

impl Segment {
    /// Wrap a period window as the segment at `index`.
    pub fn period(index: usize, window: PeriodWindow) -> Self {
        Self {
            index,
            label: Some(window.label.clone()),
            source: SegmentSource::Period(window),
        }
    }

    /// Wrap a text chunk as a segment, indexed by its chunk position.
    pub fn chunk(chunk: TextChunk) -> Self {
        Self {
            index: chunk.chunk_index,
            label: Some(format!(
                "chunk {}/{} (pages {}-{})",
                chunk.chunk_index + 1,
                chunk.total_chunks,
                chunk.page_start,
                chunk.page_end
            )),
            source: SegmentSource::Chunk(chunk),
        }
    }

    /// Label for logs and progress output.
    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("segment {}", self.index))
    }
}

// ---------------------------------------------------------------------------
// Structured extraction records
// ---------------------------------------------------------------------------

/// Free-form key/value properties attached to entities and relationships.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// A node in the extracted knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Category, e.g. `Paper`, `Person`, `Technology`, `Article`.
    pub entity_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            properties: Properties::new(),
        }
    }

    /// Case-insensitive identity used for deduplication.
    pub fn identity_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// An edge in the extracted knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_entity: String,
    pub to_entity: String,
    /// Upper-case label, e.g. `AUTHORED` or `CITES`.
    pub relationship_type: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Relationship {
    pub fn new(
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            relationship_type: relationship_type.into(),
            properties: Properties::new(),
        }
    }

    /// Case-insensitive `(from, to, type)` identity used for deduplication.
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.from_entity.to_lowercase(),
            self.to_entity.to_lowercase(),
            self.relationship_type.to_lowercase(),
        )
    }
}

/// Entities, relationships and references extracted from one document.
///
/// Serializes to exactly `entities`, `relationships`, `references` and
/// `source_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// arXiv IDs or DOIs cited by the source.
    #[serde(default)]
    pub references: Vec<String>,
    /// arXiv ID or URL of the source document.
    #[serde(default)]
    pub source_id: Option<String>,
}

impl Extraction {
    /// An empty extraction tagged with its source.
    pub fn for_source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Default::default()
        }
    }
}
