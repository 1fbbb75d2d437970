//! Turning raw model output into deltas.
//!
//! Structured output goes through two stages: locate a JSON object in the
//! text, then normalize field-name variants into an [`Extraction`]. Narrative
//! output never fails to parse; missing markers fall back to a synthetic note.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use chainfold_shared::{ChainfoldError, Entity, Extraction, Properties, Relationship, Result};

use crate::aggregate::{NarrativeDelta, PeriodOutput};

/// Greedy span from the first `{` to the last `}`.
static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid JSON object regex"));

pub const PERIOD_ANALYSIS_MARKER: &str = "PERIOD ANALYSIS:";
pub const UPDATED_SUMMARY_MARKER: &str = "UPDATED SUMMARY:";

/// Characters of raw text kept in a synthesized period note.
const SYNTHETIC_NOTE_CHARS: usize = 200;

const ENTITY_TYPE_KEYS: &[&str] = &["entity_type", "type", "category"];
const REL_FROM_KEYS: &[&str] = &["from_entity", "subject", "from"];
const REL_TO_KEYS: &[&str] = &["to_entity", "object", "to"];
const REL_TYPE_KEYS: &[&str] = &["relationship_type", "relation", "predicate", "type"];

// ---------------------------------------------------------------------------
// Structured
// ---------------------------------------------------------------------------

/// Parse one structured delta from raw model output.
pub fn parse_extraction(raw: &str) -> Result<Extraction> {
    let value = locate_json(raw)?;
    normalize_extraction(value)
}

/// Find and decode the JSON value in `raw`.
///
/// The whole text is tried first; failing that, the widest `{...}` span.
pub fn locate_json(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Err(ChainfoldError::parse("response text is empty", raw));
    }

    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }

    let span = JSON_OBJECT_RE
        .find(raw)
        .ok_or_else(|| ChainfoldError::parse("no JSON object found in response", raw))?;

    serde_json::from_str(span.as_str())
        .map_err(|e| ChainfoldError::parse(format!("embedded JSON object is invalid: {e}"), raw))
}

/// Map a decoded JSON value onto the extraction schema.
///
/// Missing or null sections become empty lists. Relationship and entity
/// fields accept the aliases models commonly produce; the first non-empty
/// alias wins. Relationship types are upper-cased.
pub fn normalize_extraction(value: Value) -> Result<Extraction> {
    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ChainfoldError::validation(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            )));
        }
    };

    let entities = array_field(&obj, "entities")?
        .iter()
        .enumerate()
        .map(|(i, item)| normalize_entity(i, item))
        .collect::<Result<Vec<_>>>()?;

    let relationships = array_field(&obj, "relationships")?
        .iter()
        .enumerate()
        .map(|(i, item)| normalize_relationship(i, item))
        .collect::<Result<Vec<_>>>()?;

    let references = array_field(&obj, "references")?
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(ChainfoldError::validation(format!(
                "references[{i}] must be a string, got {}",
                json_kind(other)
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let source_id = match obj.get("source_id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            return Err(ChainfoldError::validation(format!(
                "source_id must be a string, got {}",
                json_kind(other)
            )));
        }
    };

    Ok(Extraction {
        entities,
        relationships,
        references,
        source_id,
    })
}

fn normalize_entity(index: usize, item: &Value) -> Result<Entity> {
    let obj = item.as_object().ok_or_else(|| {
        ChainfoldError::validation(format!("entities[{index}] must be an object"))
    })?;

    let name = first_non_empty(obj, &["name"])
        .ok_or_else(|| ChainfoldError::validation(format!("entities[{index}] has no name")))?;
    let entity_type = first_non_empty(obj, ENTITY_TYPE_KEYS).ok_or_else(|| {
        ChainfoldError::validation(format!("entities[{index}] ({name}) has no entity_type"))
    })?;

    Ok(Entity {
        name,
        entity_type,
        properties: properties_field(obj, "entities", index)?,
    })
}

fn normalize_relationship(index: usize, item: &Value) -> Result<Relationship> {
    let obj = item.as_object().ok_or_else(|| {
        ChainfoldError::validation(format!("relationships[{index}] must be an object"))
    })?;

    let missing = |field: &str| {
        ChainfoldError::validation(format!("relationships[{index}] has no {field}"))
    };

    let from_entity = first_non_empty(obj, REL_FROM_KEYS).ok_or_else(|| missing("from_entity"))?;
    let to_entity = first_non_empty(obj, REL_TO_KEYS).ok_or_else(|| missing("to_entity"))?;
    let relationship_type = first_non_empty(obj, REL_TYPE_KEYS)
        .ok_or_else(|| missing("relationship_type"))?
        .to_uppercase();

    Ok(Relationship {
        from_entity,
        to_entity,
        relationship_type,
        properties: properties_field(obj, "relationships", index)?,
    })
}

fn array_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a [Value]> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(other) => Err(ChainfoldError::validation(format!(
            "{key} must be an array, got {}",
            json_kind(other)
        ))),
    }
}

fn properties_field(obj: &Map<String, Value>, section: &str, index: usize) -> Result<Properties> {
    match obj.get("properties") {
        None | Some(Value::Null) => Ok(Properties::new()),
        Some(Value::Object(props)) => Ok(props.clone()),
        Some(other) => Err(ChainfoldError::validation(format!(
            "{section}[{index}].properties must be an object, got {}",
            json_kind(other)
        ))),
    }
}

/// The first alias holding a non-empty string.
fn first_non_empty(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Narrative
// ---------------------------------------------------------------------------

/// Split a period analysis into its note and updated summary.
///
/// When both markers are present the note is the text after the last
/// `PERIOD ANALYSIS:` up to the next `UPDATED SUMMARY:`, and the summary is
/// everything after the last `UPDATED SUMMARY:`. Otherwise the summary is
/// the trimmed text after `UPDATED SUMMARY:` if present, else the whole
/// response verbatim, and the note is synthesized from the start of the response.
pub fn parse_narrative(label: &str, raw: &str) -> NarrativeDelta {
    let summary_tail = raw
        .rfind(UPDATED_SUMMARY_MARKER)
        .map(|pos| &raw[pos + UPDATED_SUMMARY_MARKER.len()..]);

    let output = match (raw.rfind(PERIOD_ANALYSIS_MARKER), summary_tail) {
        (Some(pos), Some(summary)) => {
            let after = &raw[pos + PERIOD_ANALYSIS_MARKER.len()..];
            let note = after
                .find(UPDATED_SUMMARY_MARKER)
                .map_or(after, |end| &after[..end]);
            PeriodOutput::Tagged {
                period_note: note.trim().to_string(),
                updated_summary: summary.trim().to_string(),
            }
        }
        _ => {
            let preview: String = raw.chars().take(SYNTHETIC_NOTE_CHARS).collect();
            PeriodOutput::MarkersAbsent {
                synthetic_note: format!("Analysis of {label}: {preview}"),
                updated_summary: summary_tail.map_or(raw, str::trim).to_string(),
            }
        }
    };

    NarrativeDelta {
        label: label.to_string(),
        output,
    }
}
