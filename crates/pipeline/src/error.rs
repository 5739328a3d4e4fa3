//! Pipeline error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The catalog collaborator failed or returned nothing usable.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Narration synthesis failed; the affected page plays image-only.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
