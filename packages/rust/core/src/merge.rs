//! Folding one delta into the aggregate.
//!
//! Merging is pure: the input aggregate is borrowed and a new value is
//! returned. Structured merges are idempotent, so replaying a delta never
//! changes the result.

use std::collections::HashSet;

use tracing::debug;

use chainfold_shared::{ChainfoldError, Extraction, Result};

use crate::aggregate::{Aggregate, Delta, NarrativeAggregate, NarrativeDelta, StructuredAggregate};

/// Fold `delta` into `aggregate`. The cursor is left untouched.
pub fn merge(aggregate: &Aggregate, delta: Delta) -> Result<Aggregate> {
    match (aggregate, delta) {
        (Aggregate::Narrative(current), Delta::Narrative(delta)) => {
            Ok(Aggregate::Narrative(merge_narrative(current, delta)))
        }
        (Aggregate::Structured(current), Delta::Structured(delta)) => {
            Ok(Aggregate::Structured(StructuredAggregate {
                extraction: merge_extraction(&current.extraction, delta),
                cursor: current.cursor,
            }))
        }
        (aggregate, delta) => Err(ChainfoldError::validation(format!(
            "cannot merge a {} delta into a {} aggregate",
            delta.kind(),
            aggregate.kind()
        ))),
    }
}

/// Append the labelled period note and replace the running summary.
pub fn merge_narrative(current: &NarrativeAggregate, delta: NarrativeDelta) -> NarrativeAggregate {
    let mut next = current.clone();
    next.period_notes
        .push(format!("{}: {}", delta.label, delta.output.note()));
    next.running_summary = delta.output.updated_summary().to_string();
    next
}

/// Union `delta` into `current`, keeping the first occurrence of each identity.
///
/// Entities are keyed by lower-cased name, relationships by lower-cased
/// `(from, to, type)`, references by exact string. Records already present
/// keep their original spelling and properties. Duplicates inside the delta
/// collapse the same way. The source id is taken from the delta only when
/// the aggregate has none.
pub fn merge_extraction(current: &Extraction, delta: Extraction) -> Extraction {
    let mut merged = current.clone();
    if merged.source_id.is_none() {
        merged.source_id = delta.source_id;
    }

    let mut entity_keys: HashSet<String> =
        merged.entities.iter().map(|e| e.identity_key()).collect();
    let before = merged.entities.len();
    merged.entities.extend(
        delta
            .entities
            .into_iter()
            .filter(|e| entity_keys.insert(e.identity_key())),
    );
    let new_entities = merged.entities.len() - before;

    let mut rel_keys: HashSet<(String, String, String)> = merged
        .relationships
        .iter()
        .map(|r| r.identity_key())
        .collect();
    let before = merged.relationships.len();
    merged.relationships.extend(
        delta
            .relationships
            .into_iter()
            .filter(|r| rel_keys.insert(r.identity_key())),
    );
    let new_relationships = merged.relationships.len() - before;

    let mut ref_keys: HashSet<String> = merged.references.iter().cloned().collect();
    merged
        .references
        .extend(delta.references.into_iter().filter(|r| ref_keys.insert(r.clone())));

    debug!(new_entities, new_relationships, "merged structured delta");
    merged
}
