//! Error types surfaced by the pipelines and HTTP entry points.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Contract violation at an entry point: malformed payload, out-of-range
    /// coordinates, missing required field. Rejected synchronously.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    /// Persistence failure. Reported upward to the caller of the pipeline
    /// step that required the write; in-memory registry state is unaffected.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}
