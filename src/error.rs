use thiserror::Error;

/// Failure kinds surfaced by the scrapers.
///
/// Batch operations convert the first underlying failure into a single
/// connection-level abort; partial progress is discarded.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Request-level failure: DNS, TLS, timeout or a non-success status.
    #[error("connection to Vinted was interrupted: {0}")]
    Connection(String),

    /// Expected markup or embedded JSON structure was absent.
    #[error("failed to parse page structure: {0}")]
    Parse(String),
}
