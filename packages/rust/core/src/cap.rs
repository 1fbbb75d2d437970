//! Bounding the size of one entity category.
//!
//! Documents mention far more technologies than are worth keeping, so after
//! every structured merge the capped category is filtered and trimmed.

use chainfold_shared::{Entity, Extraction};

/// Names shorter than this (after trimming) are noise.
const MIN_NAME_CHARS: usize = 4;

/// Generic words a model tends to emit as entity names.
const STOPWORDS: &[&str] = &["document", "article", "paper"];

/// A post-merge pruning rule.
pub trait CapPolicy: Send + Sync {
    fn apply(&self, extraction: Extraction) -> Extraction;
}

/// Keep the longest-named entities of one category.
///
/// Entities of `category` (exact, case-sensitive match on `entity_type`) are
/// dropped if their name is shorter than four characters or is a stopword,
/// then sorted by name length descending (stable) and cut to `max`. Other
/// categories pass through untouched and are listed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameLengthCap {
    pub category: String,
    pub max: usize,
}

impl NameLengthCap {
    pub fn new(category: impl Into<String>, max: usize) -> Self {
        Self {
            category: category.into(),
            max,
        }
    }

    fn is_meaningful(name: &str) -> bool {
        let trimmed = name.trim();
        trimmed.chars().count() >= MIN_NAME_CHARS
            && !STOPWORDS.contains(&trimmed.to_lowercase().as_str())
    }
}

impl CapPolicy for NameLengthCap {
    fn apply(&self, mut extraction: Extraction) -> Extraction {
        let (mut capped, mut kept): (Vec<Entity>, Vec<Entity>) = extraction
            .entities
            .into_iter()
            .partition(|e| e.entity_type == self.category);

        capped.retain(|e| Self::is_meaningful(&e.name));
        capped.sort_by_key(|e| std::cmp::Reverse(e.name.chars().count()));
        capped.truncate(self.max);

        kept.extend(capped);
        extraction.entities = kept;
        extraction
    }
}

/// Apply a [`NameLengthCap`] for `category` with limit `max`.
pub fn cap_category(extraction: Extraction, category: &str, max: usize) -> Extraction {
    NameLengthCap::new(category, max).apply(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, ty: &str) -> Entity {
        Entity::new(name, ty)
    }

    fn with(entities: Vec<Entity>) -> Extraction {
        Extraction {
            entities,
            ..Default::default()
        }
    }

    #[test]
    fn keeps_longest_names_up_to_max() {
        let ext = with(vec![
            entity("LSTM", "Technology"),
            entity("Transformer", "Technology"),
            entity("Multi-Head Attention", "Technology"),
            entity("Adam", "Technology"),
        ]);
        let capped = cap_category(ext, "Technology", 2);
        let names: Vec<_> = capped.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Multi-Head Attention", "Transformer"]);
    }

    #[test]
    fn ties_keep_original_order() {
        let ext = with(vec![
            entity("LSTM", "Technology"),
            entity("Adam", "Technology"),
            entity("BLEU", "Technology"),
        ]);
        let capped = cap_category(ext, "Technology", 2);
        let names: Vec<_> = capped.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["LSTM", "Adam"]);
    }

    #[test]
    fn short_names_and_stopwords_are_dropped() {
        let ext = with(vec![
            entity("RNN", "Technology"),
            entity("  CNN  ", "Technology"),
            entity("Paper", "Technology"),
            entity("DOCUMENT ", "Technology"),
            entity("Beam search", "Technology"),
        ]);
        let capped = cap_category(ext, "Technology", 20);
        assert_eq!(capped.entities, vec![entity("Beam search", "Technology")]);
    }

    #[test]
    fn other_categories_pass_through_first() {
        let ext = with(vec![
            entity("Transformer", "Technology"),
            entity("Vaswani", "Person"),
            entity("Doc", "Paper"),
        ]);
        let capped = cap_category(ext, "Technology", 0);
        assert_eq!(
            capped.entities,
            vec![entity("Vaswani", "Person"), entity("Doc", "Paper")]
        );
    }

    #[test]
    fn category_match_is_case_sensitive() {
        let ext = with(vec![entity("GPU", "technology")]);
        let capped = cap_category(ext.clone(), "Technology", 0);
        assert_eq!(capped, ext);
    }

    #[test]
    fn name_length_counts_characters() {
        let ext = with(vec![entity("Ñandú", "Technology"), entity("ab", "Technology")]);
        let capped = cap_category(ext, "Technology", 5);
        assert_eq!(capped.entities.len(), 1);
    }

    #[test]
    fn cardinality_never_exceeds_max() {
        let entities = (0..50)
            .map(|i| entity(&format!("Technology number {i}"), "Technology"))
            .collect();
        let capped = cap_category(with(entities), "Technology", 20);
        assert_eq!(capped.entities.len(), 20);
    }

    #[test]
    fn mixed_categories_keep_others_intact_past_the_cap() {
        let mut entities = vec![entity("Vaswani", "Person"), entity("WMT 2014", "Dataset")];
        entities.extend((0..30).map(|i| entity(&format!("Method {i:02}"), "Technology")));
        entities.push(entity("Google Brain", "Organization"));

        let capped = cap_category(with(entities), "Technology", 20);

        let (tech, others): (Vec<_>, Vec<_>) = capped
            .entities
            .iter()
            .partition(|e| e.entity_type == "Technology");
        assert_eq!(tech.len(), 20);
        assert_eq!(
            others,
            vec![
                &entity("Vaswani", "Person"),
                &entity("WMT 2014", "Dataset"),
                &entity("Google Brain", "Organization"),
            ]
        );
        assert_eq!(tech[0].name, "Method 00");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn entities() -> impl Strategy<Value = Vec<Entity>> {
            proptest::collection::vec(
                ("[A-Za-z ]{0,12}", prop_oneof!["Technology", "Person", "Dataset"])
                    .prop_map(|(name, ty)| Entity::new(name, ty)),
                0..60,
            )
        }

        proptest! {
            #[test]
            fn capped_category_never_exceeds_max(items in entities(), max in 0usize..25) {
                let capped = cap_category(with(items), "Technology", max);
                let tech = capped
                    .entities
                    .iter()
                    .filter(|e| e.entity_type == "Technology")
                    .count();
                prop_assert!(tech <= max);
            }

            #[test]
            fn other_categories_survive_in_order(items in entities(), max in 0usize..25) {
                let expected: Vec<Entity> = items
                    .iter()
                    .filter(|e| e.entity_type != "Technology")
                    .cloned()
                    .collect();
                let capped = cap_category(with(items), "Technology", max);
                prop_assert_eq!(&capped.entities[..expected.len()], expected.as_slice());
            }

            #[test]
            fn kept_names_are_meaningful(items in entities(), max in 0usize..25) {
                let capped = cap_category(with(items), "Technology", max);
                for e in capped.entities.iter().filter(|e| e.entity_type == "Technology") {
                    prop_assert!(e.name.trim().chars().count() >= MIN_NAME_CHARS);
                }
            }
        }
    }
}
