//! arXiv paper download and PDF page extraction.
//!
//! Papers are fetched from `{base}/{id}.pdf` and split into per-page text.
//! Pages with no extractable text are skipped, so page numbers may have gaps.

use reqwest::Client;
use tracing::{debug, instrument, warn};

use chainfold_shared::{ChainfoldError, ExtractionConfig, Page, Result};

use crate::build_client;

/// PDFs can be large; allow longer than a search request.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Downloads arXiv PDFs and turns them into pages.
pub struct ArxivPdf {
    client: Client,
    base_url: String,
}

impl ArxivPdf {
    /// Create a fetcher rooted at `base_url` (e.g. `https://arxiv.org/pdf`).
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT_SECS)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Self::new(&config.arxiv_pdf_base_url)
    }

    /// Download the paper and extract its non-blank pages.
    #[instrument(skip(self))]
    pub async fn fetch_pages(&self, arxiv_id: &str) -> Result<Vec<Page>> {
        let bytes = self.download(arxiv_id).await?;
        let pages = pdf_pages(&bytes)?;
        if pages.is_empty() {
            warn!("no extractable text in PDF");
        }
        Ok(pages)
    }

    /// Download the raw PDF bytes. Redirects are followed.
    pub async fn download(&self, arxiv_id: &str) -> Result<Vec<u8>> {
        let id = normalize_id(arxiv_id)?;
        let url = format!("{}/{id}.pdf", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainfoldError::network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainfoldError::network(format!("{url}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChainfoldError::network(format!("{url}: {e}")))?;
        debug!(bytes = bytes.len(), "downloaded PDF");
        Ok(bytes.to_vec())
    }
}

/// Strip an `arxiv:` prefix and surrounding whitespace.
pub fn normalize_id(arxiv_id: &str) -> Result<&str> {
    let trimmed = arxiv_id.trim();
    let id = trimmed
        .strip_prefix("arxiv:")
        .or_else(|| trimmed.strip_prefix("arXiv:"))
        .unwrap_or(trimmed)
        .trim();
    if id.is_empty() {
        return Err(ChainfoldError::validation("arXiv id is empty"));
    }
    Ok(id)
}

/// Extract per-page text from PDF bytes, dropping blank pages.
pub fn pdf_pages(bytes: &[u8]) -> Result<Vec<Page>> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| ChainfoldError::validation(format!("not a readable PDF: {e}")))?;

    let texts = doc.get_pages().into_keys().map(|number| {
        let text = doc.extract_text(&[number]).unwrap_or_else(|e| {
            warn!(page = number, error = %e, "page text extraction failed");
            String::new()
        });
        (number, text)
    });
    Ok(non_blank_pages(texts))
}

fn non_blank_pages(texts: impl IntoIterator<Item = (u32, String)>) -> Vec<Page> {
    texts
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(number, text)| Page::new(number, text))
        .collect()
}
