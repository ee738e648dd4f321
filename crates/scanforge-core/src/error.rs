use thiserror::Error;

/// Errors that can actually be raised past a stage boundary.
///
/// Load and schema problems never appear here: the loader and normalizer
/// absorb them by contract and surface them as data (`LoadFailure` records
/// and `Unknown` findings). Only a bad configuration can end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// External text-generation call failure after exhausting retries.
    #[error("text-generation service call failed: {0}")]
    Service(#[from] ServiceError),

    /// Missing or empty credential. Fatal, checked once at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A single failed external call attempt.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("response had no generated text")]
    EmptyResponse,
}
