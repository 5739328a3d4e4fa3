//! Durable local storage for the read-along reader
//!
//! Provides persistent storage for:
//! - Reader settings (autoplay / resume flags, process-wide)
//! - Reading progress (last-read page, one record per book)
//!
//! Everything is JSON-encoded under namespaced string keys on top of a
//! small `KeyValueStore` abstraction. Records are tiny; storage I/O is
//! treated as effectively synchronous at this scale.

pub mod error;
pub mod progress;
pub mod settings;
pub mod store;

pub use error::PersistenceError;
pub use progress::ProgressStore;
pub use settings::SettingsStore;
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
