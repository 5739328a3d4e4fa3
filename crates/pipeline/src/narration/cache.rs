//! Per-page narration cache
//!
//! Owns the narration slots for the current book session, keyed by page
//! index. Concurrent requests for the same page before resolution share
//! a single in-flight synthesis call; a slot that resolved (or failed)
//! is returned as-is without a new request. The cache is cleared when
//! the open book changes and is never persisted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};

use super::{NarrationGenerator, SynthesisService};

/// Resolution state of a page's narration slot.
///
/// A pending request is an unresolved slot; once the cell is set it
/// never changes for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationStatus {
    /// Narration is ready to play.
    Ready(String),
    /// Synthesis failed; the page plays image-only.
    Failed,
}

type Slot = Arc<OnceCell<NarrationStatus>>;

pub struct NarrationCache {
    generator: NarrationGenerator,
    slots: Mutex<HashMap<usize, Slot>>,
}

impl NarrationCache {
    pub fn new(service: Arc<dyn SynthesisService>) -> Self {
        Self {
            generator: NarrationGenerator::new(service),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Resolved status for a page, if any. Pending slots report `None`.
    pub fn peek(&self, page: usize) -> Option<NarrationStatus> {
        let slots = self.slots.lock();
        slots.get(&page).and_then(|slot| slot.get().cloned())
    }

    /// Whether a slot exists for the page, pending or resolved.
    pub fn is_requested(&self, page: usize) -> bool {
        self.slots.lock().contains_key(&page)
    }

    /// Return the page's slot, issuing a synthesis request only if no
    /// slot exists yet. Callers arriving while the request is in flight
    /// await the same result; only the first caller's progress channel
    /// is observed.
    pub async fn get_or_create(
        &self,
        page: usize,
        text: &str,
        progress: Option<watch::Sender<u8>>,
    ) -> NarrationStatus {
        let slot: Slot = {
            let mut slots = self.slots.lock();
            slots.entry(page).or_default().clone()
        };

        slot.get_or_init(|| async {
            match self.generator.generate(text, progress).await {
                Ok(audio_url) => {
                    tracing::debug!(page, "narration ready");
                    NarrationStatus::Ready(audio_url)
                }
                Err(_) => {
                    tracing::warn!(page, "narration unavailable, page plays image-only");
                    NarrationStatus::Failed
                }
            }
        })
        .await
        .clone()
    }

    /// Drop all slots; called when the open book changes.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PipelineError, SynthesisResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts synthesis calls and resolves after a short delay.
    struct CountingSynthesis {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingSynthesis {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl SynthesisService for CountingSynthesis {
        async fn synthesize(&self, text: &str) -> Result<SynthesisResponse, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                return Err(PipelineError::Synthesis("boom".into()));
            }
            Ok(SynthesisResponse {
                audio_url: format!("https://cdn/audio/{}.mp3", text.len()),
                voice_id: None,
            })
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_synthesis_call() {
        let service = Arc::new(CountingSynthesis::new(false));
        let cache = Arc::new(NarrationCache::new(service.clone()));

        let a = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_create(2, "sayfa", None).await })
        };
        let b = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_create(2, "sayfa", None).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_slot_is_cached_and_not_retried() {
        let service = Arc::new(CountingSynthesis::new(true));
        let cache = NarrationCache::new(service.clone());

        assert_eq!(cache.get_or_create(0, "sayfa", None).await, NarrationStatus::Failed);
        assert_eq!(cache.get_or_create(0, "sayfa", None).await, NarrationStatus::Failed);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek(0), Some(NarrationStatus::Failed));
    }

    #[tokio::test]
    async fn clear_drops_slots() {
        let service = Arc::new(CountingSynthesis::new(false));
        let cache = NarrationCache::new(service.clone());

        cache.get_or_create(0, "sayfa", None).await;
        assert!(cache.is_requested(0));

        cache.clear();
        assert!(!cache.is_requested(0));
        assert_eq!(cache.peek(0), None);

        cache.get_or_create(0, "sayfa", None).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
