//! Core types for the read-along playback engine
//!
//! Shared domain types used by the pipeline, persistence, and player
//! crates. No I/O lives here; collaborator traits are defined next to
//! their implementations in the crates that own them.

mod types;

pub use types::{Page, ReaderSettings, ReadingProgress, TurnDirection};
