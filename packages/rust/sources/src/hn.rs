//! Hacker News story search over the Algolia API.
//!
//! Results for one period window are rendered into a preformatted text block
//! that is pasted verbatim into the analysis prompt.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use chainfold_shared::{ChainfoldError, PeriodWindow, Result, TrendsConfig};

use crate::{SearchSource, build_client};

/// Default timeout in seconds for search requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Search source backed by `hn.algolia.com/api/v1/search_by_date`.
pub struct HnSearch {
    client: Client,
    endpoint: Url,
    limit: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, rename = "nbHits")]
    nb_hits: u64,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    title: Option<String>,
    points: Option<i64>,
    num_comments: Option<i64>,
    created_at: Option<String>,
}

impl HnSearch {
    /// Create a search source rooted at `base_url` (e.g. `https://hn.algolia.com/api/v1`).
    pub fn new(base_url: &str, limit: u32) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}/search_by_date", base_url.trim_end_matches('/')))
            .map_err(|e| ChainfoldError::config(format!("invalid HN base URL '{base_url}': {e}")))?;
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
            endpoint,
            limit,
        })
    }

    pub fn from_config(config: &TrendsConfig) -> Result<Self> {
        Self::new(&config.hn_base_url, config.search_limit)
    }
}

#[async_trait]
impl SearchSource for HnSearch {
    #[instrument(skip_all, fields(query = %query, period = %window.label))]
    async fn search(&self, query: &str, window: &PeriodWindow) -> Result<String> {
        let start_ts = midnight_utc(window.start);
        let end_ts = midnight_utc(window.end);
        let numeric_filters = format!("created_at_i>={start_ts},created_at_i<={end_ts}");
        let limit = self.limit.to_string();

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("query", query),
                ("tags", "story"),
                ("numericFilters", numeric_filters.as_str()),
                ("hitsPerPage", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ChainfoldError::network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainfoldError::network(format!(
                "{}: HTTP {status}",
                self.endpoint
            )));
        }

        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| ChainfoldError::network(format!("invalid search response: {e}")))?;

        debug!(hits = data.hits.len(), total = data.nb_hits, "search complete");
        Ok(format_results(query, window, self.limit, &data))
    }
}

fn midnight_utc(date: chrono::NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp()
}

fn format_results(query: &str, window: &PeriodWindow, limit: u32, data: &SearchResponse) -> String {
    let mut lines = vec![
        format!(
            "=== Hacker News Search Results for '{query}' from {} to {} ===",
            window.start, window.end
        ),
        format!(
            "Found {} total results. Showing top {limit}:\n",
            data.nb_hits
        ),
    ];

    for (i, hit) in data.hits.iter().enumerate() {
        lines.push(format!(
            "{}. {}",
            i + 1,
            hit.title.as_deref().unwrap_or("No Title")
        ));
        lines.push(format!(
            "   Points: {} | Comments: {} | Date: {}",
            hit.points.unwrap_or(0),
            hit.num_comments.unwrap_or(0),
            hit.created_at.as_deref().unwrap_or("Unknown Date")
        ));
        lines.push(String::new());
    }

    if data.hits.is_empty() {
        lines.push("No stories found in the specified date range.".into());
    }

    lines.join("\n")
}
