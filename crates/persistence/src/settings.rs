//! Reader settings persistence
//!
//! Two process-wide flags (autoplay, resume) stored as one JSON record.
//! Loaded once at startup; written back on every change.

use readalong_core::ReaderSettings;
use std::sync::Arc;

use crate::{KeyValueStore, PersistenceError};

const SETTINGS_KEY: &str = "reader:settings";

pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load settings, falling back to defaults when absent or corrupt.
    pub async fn load(&self) -> ReaderSettings {
        match self.kv.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(error = %e, "corrupt settings record, using defaults");
                    ReaderSettings::default()
                }
            },
            Ok(None) => ReaderSettings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "settings read failed, using defaults");
                ReaderSettings::default()
            }
        }
    }

    pub async fn save(&self, settings: ReaderSettings) -> Result<(), PersistenceError> {
        let raw = serde_json::to_string(&settings)?;
        self.kv.set(SETTINGS_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn defaults_when_missing() {
        let store = SettingsStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.load().await, ReaderSettings::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = SettingsStore::new(Arc::new(MemoryStore::new()));
        let settings = ReaderSettings {
            autoplay_enabled: false,
            resume_enabled: true,
        };
        store.save(settings).await.unwrap();
        assert_eq!(store.load().await, settings);
    }

    #[tokio::test]
    async fn defaults_when_corrupt() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(SETTINGS_KEY, "{broken").await.unwrap();

        let store = SettingsStore::new(kv);
        assert_eq!(store.load().await, ReaderSettings::default());
    }
}
