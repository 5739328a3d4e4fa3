//! Read-along playback controller
//!
//! `ReaderSession` is the single source of truth for the book viewer:
//! current page, play/pause state, page-turn transitions, autoplay mode,
//! and asset readiness. It consumes the page store and narration cache,
//! drives narration generation (with next-page prefetch), persists
//! resume state, and broadcasts events the UI shell renders from.
//!
//! The shell owns all drawing and the actual audio element; it routes
//! user input into the session's imperative actions and reports audio
//! and image lifecycle back through the `notify_*` methods.

pub mod gestures;
pub mod session;
pub mod state;

pub use gestures::SwipeTracker;
pub use session::{ReaderEvent, ReaderSession};
pub use state::{ReaderConfig, ReaderPhase, SessionSnapshot};
