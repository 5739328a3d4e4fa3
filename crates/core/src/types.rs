//! Domain types shared across the workspace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single page of an open book.
///
/// Immutable once loaded for a given book; owned by the page store and
/// read-only everywhere else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position within the book.
    pub index: usize,
    /// Narration text displayed on the page.
    pub text: String,
    /// Location of the page illustration.
    #[serde(alias = "image", alias = "imageUrl")]
    pub image_url: String,
}

impl Page {
    pub fn new(index: usize, text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            image_url: image_url.into(),
        }
    }
}

/// Process-wide reader settings, independent of any single book.
///
/// Loaded from durable storage at startup and written back on every
/// change. Injected explicitly into the session rather than read from
/// ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderSettings {
    /// Finishing a page's narration automatically turns to the next page.
    pub autoplay_enabled: bool,
    /// Remember the last-read page per book and reopen there.
    pub resume_enabled: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            autoplay_enabled: true,
            resume_enabled: true,
        }
    }
}

/// Last-read position for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub book_id: String,
    pub page: usize,
    pub last_read_at: DateTime<Utc>,
}

impl ReadingProgress {
    pub fn new(book_id: impl Into<String>, page: usize) -> Self {
        Self {
            book_id: book_id.into(),
            page,
            last_read_at: Utc::now(),
        }
    }
}

/// Direction of a page turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirection {
    Next,
    Prev,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_to_enabled() {
        let settings = ReaderSettings::default();
        assert!(settings.autoplay_enabled);
        assert!(settings.resume_enabled);
    }

    #[test]
    fn page_accepts_alias_image_field() {
        let page: Page =
            serde_json::from_str(r#"{"index":0,"text":"Bir varmış","image":"https://x/p0.jpg"}"#)
                .unwrap();
        assert_eq!(page.image_url, "https://x/p0.jpg");
    }
}
