//! Persistence error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
