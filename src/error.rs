//! Error types for the intrinsics data pipeline

use std::io;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum ProviderError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Download stalled past the inactivity timeout
    #[error("Download timed out: {0}")]
    Timeout(String),

    /// Retry budget exhausted without a successful response
    #[error("Resource unreachable after {attempts} attempts: {url}")]
    Unreachable { url: String, attempts: u32 },

    /// Malformed XML from either the network or the on-disk mirror
    #[error("XML parse error: {0}")]
    Parse(String),

    /// Failure reading or writing the binary dataset store
    #[error("Store error: {0}")]
    Store(String),

    /// The consumer requested cancellation
    #[error("Operation cancelled")]
    Cancelled,
}
