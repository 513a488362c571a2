//! Error types for the ledger and its collaborators.

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised while reading or writing the ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be read or written
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The store content is not a valid ledger document
    #[error("store content is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors raised while sealing a record.
#[derive(Debug, Error)]
pub enum MiningError {
    /// Every worker stopped without committing a solution
    #[error("no worker sealed record {index}")]
    Unsolved { index: u64 },

    /// A SHA-256 hex digest has only 64 characters
    #[error("difficulty {0} exceeds the 64 hex characters of a digest")]
    DifficultyTooHigh(usize),
}

/// Rejected configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("difficulty {0} exceeds the 64 hex characters of a digest")]
    DifficultyTooHigh(usize),
}

/// Ledger-level failures surfaced to the caller.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// One or more workers of a parallel pass panicked or could not start
    #[error("{operation} failed on workers {workers:?}")]
    WorkerFailed {
        operation: &'static str,
        workers: Vec<usize>,
    },

    /// Prices must be finite and non-negative
    #[error("invalid price {price} for product {product_code}")]
    InvalidPrice { product_code: String, price: f64 },

    /// A revision back-link does not point at an earlier revision of the same product
    #[error("record {index} has an invalid previous revision link to {target}")]
    BrokenRevisionChain { index: u64, target: u64 },
}

/// Failures that end an interactive console session.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("console I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("could not render records: {0}")]
    Render(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_failure_message() {
        let err = LedgerError::WorkerFailed {
            operation: "search",
            workers: vec![1, 3],
        };
        assert_eq!(err.to_string(), "search failed on workers [1, 3]");
    }

    #[test]
    fn test_invalid_price_message() {
        let err = LedgerError::InvalidPrice {
            product_code: "A".into(),
            price: -5.0,
        };
        assert_eq!(err.to_string(), "invalid price -5 for product A");
    }

    #[test]
    fn test_store_error_wraps_into_ledger_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: LedgerError = StoreError::from(io).into();
        assert!(matches!(err, LedgerError::Store(StoreError::Io(_))));
        assert!(err.to_string().contains("read-only"));
    }
}
