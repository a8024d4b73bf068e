//! Core error types for subgauge.

use thiserror::Error;

/// Error returned by vendor usage fetches.
///
/// Every variant aborts the request that triggered the fetch; nothing is
/// cached for the failed call and no retry is attempted.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The network call itself failed (connect, TLS, timeout).
    #[error("usage request failed: {0}")]
    Request(String),

    /// The vendor answered with a non-success status code.
    #[error("unexpected status code: {0}")]
    Status(u16),

    /// The payload could not be parsed into the expected shape.
    #[error("failed to parse usage payload: {0}")]
    Parse(String),

    /// The vendor returned zero totals, indistinguishable from an
    /// unpopulated account.
    #[error("usage totals not populated")]
    EmptyUsage,
}
