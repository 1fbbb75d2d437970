//! Loading extracted document pages from disk.
//!
//! Two layouts are accepted:
//! - `.json`: `[[1, "page text"], ...]` or `[{"page": 1, "text": "..."}, ...]`
//! - anything else: plain text with pages separated by form feeds (`\x0c`),
//!   numbered from 1
//!
//! Pages with no visible text are dropped, matching what a PDF text
//! extractor reports for blank pages.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use chainfold_shared::{ChainfoldError, Page, Result};

/// Page separator in plain-text dumps (what `pdftotext` emits).
const FORM_FEED: char = '\x0c';

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageRecord {
    Pair(u32, String),
    Object {
        #[serde(alias = "page_number", alias = "number")]
        page: u32,
        text: String,
    },
}

impl From<PageRecord> for Page {
    fn from(record: PageRecord) -> Self {
        match record {
            PageRecord::Pair(number, text) | PageRecord::Object { page: number, text } => {
                Page::new(number, text)
            }
        }
    }
}

/// Read pages from `path`, choosing the layout by file extension.
pub fn load_pages(path: &Path) -> Result<Vec<Page>> {
    let content = std::fs::read_to_string(path).map_err(|e| ChainfoldError::io(path, e))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let pages = if is_json {
        parse_json_pages(&content).map_err(|e| {
            ChainfoldError::validation(format!("{}: {e}", path.display()))
        })?
    } else {
        split_form_feeds(&content)
    };

    info!(path = %path.display(), pages = pages.len(), "loaded document pages");
    Ok(pages)
}

/// Parse the JSON page layouts.
pub fn parse_json_pages(content: &str) -> Result<Vec<Page>> {
    let records: Vec<PageRecord> = serde_json::from_str(content).map_err(|e| {
        ChainfoldError::validation(format!("expected a JSON array of pages: {e}"))
    })?;
    Ok(records
        .into_iter()
        .map(Page::from)
        .filter(|p| !p.text.trim().is_empty())
        .collect())
}

/// Split a form-feed separated text dump into numbered pages.
pub fn split_form_feeds(content: &str) -> Vec<Page> {
    content
        .split(FORM_FEED)
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Page::new(i as u32 + 1, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pairs() {
        let pages = parse_json_pages(r#"[[1, "Attention"], [2, "  "], [3, "is all"]]"#).unwrap();
        assert_eq!(pages, vec![Page::new(1, "Attention"), Page::new(3, "is all")]);
    }

    #[test]
    fn json_objects() {
        let pages =
            parse_json_pages(r#"[{"page": 4, "text": "a"}, {"page_number": 5, "text": "b"}]"#)
                .unwrap();
        assert_eq!(pages[0].number, 4);
        assert_eq!(pages[1].number, 5);
    }

    #[test]
    fn json_must_be_an_array() {
        let err = parse_json_pages(r#"{"pages": []}"#).unwrap_err();
        assert!(matches!(err, ChainfoldError::Validation { .. }));
    }

    #[test]
    fn form_feeds_keep_original_numbering() {
        let pages = split_form_feeds("first page\x0c\x0cthird page\x0c");
        assert_eq!(pages, vec![Page::new(1, "first page"), Page::new(3, "third page")]);
    }

    #[test]
    fn load_pages_from_disk() {
        let dir = std::env::temp_dir().join(format!("chainfold-pages-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let txt = dir.join("paper.txt");
        std::fs::write(&txt, "one\x0ctwo").unwrap();
        assert_eq!(load_pages(&txt).unwrap().len(), 2);

        let json = dir.join("paper.json");
        std::fs::write(&json, r#"[[1, "one"]]"#).unwrap();
        assert_eq!(load_pages(&json).unwrap(), vec![Page::new(1, "one")]);

        let missing = load_pages(&dir.join("missing.txt")).unwrap_err();
        assert!(matches!(missing, ChainfoldError::Io { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
