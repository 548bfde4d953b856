//! Error types for the importer

use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Failures that end an import run
///
/// Per-batch write faults never show up here: the batch writer absorbs them
/// and reports an abandoned batch through its outcome instead.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The input file could not be opened
    #[error("Failed to open input file '{}': {source}", path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the input file failed mid-stream
    #[error("Failed to read input file: {0}")]
    Csv(#[from] csv::Error),

    /// The store did not answer the startup liveness check
    #[error("Failed to connect to document store: {0}")]
    Connectivity(#[source] StoreError),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run finished but some batches were abandoned after retries
    #[error("Import incomplete: {failed_batches} batch(es) abandoned after exhausting retries")]
    Incomplete { failed_batches: u64 },
}

impl ImportError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Map a failure to build the store client. A connection string the
    /// driver can't parse is a configuration problem, not an outage.
    pub fn client_setup(err: StoreError) -> Self {
        match err {
            StoreError::InvalidUri(msg) => Self::Config(format!("Invalid connection string: {}", msg)),
            other => Self::Connectivity(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ImportError::OpenInput {
            path: PathBuf::from("missing.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert!(err.to_string().contains("missing.csv"));

        let err = ImportError::Incomplete { failed_batches: 2 };
        assert!(err.to_string().contains("2 batch(es)"));

        let err = ImportError::Connectivity(StoreError::Unreachable("timed out".into()));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_client_setup_classification() {
        let err = ImportError::client_setup(StoreError::InvalidUri("missing scheme".into()));
        assert!(matches!(err, ImportError::Config(ref msg) if msg.contains("missing scheme")));

        let err = ImportError::client_setup(StoreError::Unreachable("no route".into()));
        assert!(matches!(err, ImportError::Connectivity(_)));
    }
}
