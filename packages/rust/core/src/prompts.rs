//! Prompt builders for the extraction and trend-analysis runs.

use chainfold_shared::{Extraction, PeriodWindow};

use crate::aggregate::NarrativeAggregate;
use crate::parse::{PERIOD_ANALYSIS_MARKER, UPDATED_SUMMARY_MARKER};

pub const ENTITY_TYPES: &[&str] = &["Article", "Paper", "Person", "Technology"];

pub const RELATIONSHIP_TYPES: &[&str] = &[
    "AUTHORED",
    "CITES",
    "COMPARED_IN",
    "DISCUSSES",
    "EXTENDS",
    "IMPLEMENTS",
    "INTRODUCED",
    "RELATES_TO",
];

fn schema_hint() -> String {
    let hint = serde_json::json!({
        "entities": [
            {"name": "string", "entity_type": ENTITY_TYPES.join("|"), "properties": {}}
        ],
        "relationships": [
            {
                "from_entity": "string",
                "to_entity": "string",
                "relationship_type": RELATIONSHIP_TYPES.join("|"),
                "properties": {}
            }
        ],
        "references": ["arxiv:1234.5678", "doi:10.xxxx/xxxx"]
    });
    serde_json::to_string_pretty(&hint).expect("a JSON value always serializes")
}

/// Ask for the entities and relationships in one chunk, given everything found so far.
pub fn extraction_prompt(chunk_text: &str, running: &Extraction) -> String {
    let running_json = serde_json::to_string_pretty(running).unwrap_or_default();
    format!(
        r#"You are an information extraction agent for AI/ML research papers.

Extract entities and relationships from the text chunk below.
Build on the running extraction and do not repeat anything already in it.

Allowed entity types: {entity_types}
Allowed relationship types (UPPERCASE only): {relationship_types}

Rules:
- Use exactly the keys from_entity, to_entity, relationship_type
- Do not use subject/object/predicate keys
- Return only valid JSON with no extra text and no markdown
- If nothing is found, return empty arrays

Return JSON in this format:
{schema}

Running extraction so far:
{running_json}

Text chunk:
"""
{chunk_text}
"""
"#,
        entity_types = ENTITY_TYPES.join(", "),
        relationship_types = RELATIONSHIP_TYPES.join(", "),
        schema = schema_hint(),
    )
}

/// Ask the model to turn its own unparsable output into schema JSON.
pub fn repair_prompt(bad_text: &str) -> String {
    format!(
        r#"Convert the following text into valid JSON matching this schema.
Return only JSON with no extra text and no markdown.

Schema:
{schema}

Text:
"""
{bad_text}
"""
"#,
        schema = schema_hint(),
    )
}

/// Ask for one period's analysis plus a rewritten running summary.
pub fn period_analysis_prompt(
    query: &str,
    window: &PeriodWindow,
    aggregate: &NarrativeAggregate,
    search_results: &str,
) -> String {
    let previous_notes = if aggregate.period_notes.is_empty() {
        "(none yet)".to_string()
    } else {
        aggregate.period_notes.join("\n")
    };

    format!(
        r#"You are analyzing Hacker News discussions about "{query}"
for the time period {label} ({start} to {end}).

PREVIOUS PERIOD NOTES:
{previous_notes}

PREVIOUS RUNNING SUMMARY:
{summary}

NEW DATA FROM {label}:
{search_results}

YOUR TASK:
1. Analyse the new data for this time period
2. Identify key themes, sentiments, and notable discussions
3. Compare with the previous summary: what changed and what is new?
4. Write an updated running summary that incorporates both old and new insights

RESPOND WITH:
{PERIOD_ANALYSIS_MARKER} (2-3 sentences about this specific period)
{UPDATED_SUMMARY_MARKER} (comprehensive summary including all periods analysed so far)
"#,
        label = window.label,
        start = window.start,
        end = window.end,
        summary = aggregate.running_summary,
    )
}

/// Ask for the final answer across all analysed periods.
pub fn synthesis_prompt(query: &str, aggregate: &NarrativeAggregate) -> String {
    format!(
        r#"You are creating a final comprehensive answer about "{query}" based on the analysis of Hacker News discussions across multiple time periods.

INDIVIDUAL PERIOD ANALYSES:
{notes}

RUNNING SUMMARY:
{summary}

YOUR TASK:
Create a well-structured final answer that:
1. Summarizes the overall trends across all time periods
2. Highlights key themes and how they evolved over time
3. Notes any significant shifts in sentiment or focus
4. Provides actionable insights

Format your response in a clear, professional manner suitable for someone researching this topic. Use bullet points when appropriate.
"#,
        notes = aggregate.period_notes.join("\n"),
        summary = aggregate.running_summary,
    )
}
