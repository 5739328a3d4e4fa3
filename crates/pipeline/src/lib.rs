//! Asset pipeline for the read-along book viewer
//!
//! Provides:
//! - Catalog access with a bundled fallback story (the viewer never
//!   renders an empty book)
//! - Narration synthesis behind the `SynthesisService` trait, with
//!   coarse progress reporting for UI feedback
//! - A per-page narration cache that coalesces concurrent requests for
//!   the same page into a single synthesis call

pub mod catalog;
pub mod error;
pub mod narration;

pub use catalog::{CatalogService, HttpCatalogClient, PageStore};
pub use error::PipelineError;
pub use narration::{
    HttpSynthesisClient, NarrationGenerator, StubSynthesis, SynthesisResponse, SynthesisService,
};
pub use narration::cache::{NarrationCache, NarrationStatus};
