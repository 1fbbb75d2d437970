//! Source collaborators: where segment payloads come from.
//!
//! - [`SearchSource`] / [`HnSearch`] — time-windowed story search rendered as text
//! - [`ArxivPdf`] — arXiv papers downloaded and split into page texts
//! - [`load_pages`] — extracted document pages read from disk
//!
//! The accumulation engine performs no retries on behalf of these
//! collaborators; a failed fetch aborts the run.

mod arxiv;
mod hn;
mod pages;

use async_trait::async_trait;
use reqwest::Client;

use chainfold_shared::{ChainfoldError, PeriodWindow, Result};

pub use arxiv::{ArxivPdf, normalize_id, pdf_pages};
pub use hn::HnSearch;
pub use pages::{load_pages, parse_json_pages, split_form_feeds};

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("chainfold/", env!("CARGO_PKG_VERSION"));

/// Something that can describe what happened to `query` during one time window.
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Return a preformatted text block of results for `window`.
    async fn search(&self, query: &str, window: &PeriodWindow) -> Result<String>;
}

/// Build a reqwest client with appropriate settings.
fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ChainfoldError::network(format!("failed to build HTTP client: {e}")))
}
