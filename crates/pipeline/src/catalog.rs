//! Page catalog access
//!
//! The page store obtains the ordered page sequence for a book from the
//! catalog collaborator. Any failure (network, empty result) falls back
//! to a bundled sample story: the viewer must never render an empty
//! book. A fresh fetch happens whenever the open book changes; nothing
//! is cached across books.

use async_trait::async_trait;
use readalong_core::Page;
use serde::Deserialize;
use std::sync::Arc;

use crate::PipelineError;

/// Catalog collaborator contract.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Fetch the ordered pages of a book.
    async fn pages(&self, book_id: &str) -> Result<Vec<Page>, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    pages: Vec<Page>,
}

/// HTTP catalog client (`GET {base}/books/{id}/pages`).
pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CatalogService for HttpCatalogClient {
    async fn pages(&self, book_id: &str) -> Result<Vec<Page>, PipelineError> {
        let url = format!("{}/books/{}/pages", self.base_url, book_id);
        let response = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PipelineError::Catalog(e.to_string()))?;

        let body: PagesResponse = response.json().await?;
        Ok(body.pages)
    }
}

/// Supplies the page sequence for the currently open book.
pub struct PageStore {
    catalog: Arc<dyn CatalogService>,
}

impl PageStore {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self { catalog }
    }

    /// Load the pages for `book_id`, falling back to the bundled sample
    /// story on any failure or empty result.
    pub async fn load(&self, book_id: &str) -> Vec<Page> {
        match self.catalog.pages(book_id).await {
            Ok(pages) if !pages.is_empty() => {
                tracing::debug!(book_id, count = pages.len(), "loaded pages from catalog");
                pages
            }
            Ok(_) => {
                tracing::warn!(book_id, "catalog returned no pages, using sample story");
                sample_pages()
            }
            Err(e) => {
                tracing::warn!(book_id, error = %e, "catalog fetch failed, using sample story");
                sample_pages()
            }
        }
    }
}

/// Bundled fallback story shown when the catalog is unreachable.
pub fn sample_pages() -> Vec<Page> {
    const STORY: [&str; 5] = [
        "Once upon a time, a little fox named Pırıl lived at the edge of a great forest.",
        "One morning, Pırıl found a glowing acorn under the oldest oak tree.",
        "The acorn whispered: plant me where the river bends, and you will see a wonder.",
        "Pırıl ran to the river bend and dug a tiny hole with her paws.",
        "By evening, a silver sapling had grown there, and the whole forest came to sing to it.",
    ];

    STORY
        .iter()
        .enumerate()
        .map(|(i, text)| Page::new(i, *text, format!("asset://sample/page-{}.jpg", i)))
        .collect()
}
