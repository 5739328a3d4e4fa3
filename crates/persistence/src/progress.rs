//! Reading progress persistence
//!
//! One record per book under `reader:progress:{book_id}`. Saved on every
//! committed page change while resume is enabled; deleted when the
//! reader closes.

use readalong_core::ReadingProgress;
use std::sync::Arc;

use crate::{KeyValueStore, PersistenceError};

fn progress_key(book_id: &str) -> String {
    format!("reader:progress:{}", book_id)
}

pub struct ProgressStore {
    kv: Arc<dyn KeyValueStore>,
}

impl ProgressStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn save(&self, book_id: &str, page: usize) -> Result<(), PersistenceError> {
        let record = ReadingProgress::new(book_id, page);
        let raw = serde_json::to_string(&record)?;
        self.kv.set(&progress_key(book_id), &raw).await
    }

    /// Last saved page for the book, if any. A corrupt record reads as
    /// absent rather than erroring.
    pub async fn load(&self, book_id: &str) -> Option<usize> {
        match self.kv.get(&progress_key(book_id)).await {
            Ok(Some(raw)) => match serde_json::from_str::<ReadingProgress>(&raw) {
                Ok(record) => Some(record.page),
                Err(e) => {
                    tracing::warn!(book_id, error = %e, "corrupt progress record, ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(book_id, error = %e, "progress read failed");
                None
            }
        }
    }

    pub async fn clear(&self, book_id: &str) -> Result<(), PersistenceError> {
        self.kv.remove(&progress_key(book_id)).await
    }
}
