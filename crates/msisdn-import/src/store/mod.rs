//! Document store boundary
//!
//! The importer only needs three things from a store: a liveness check, an
//! unordered bulk insert that reports failures per operation, and teardown.
//!
//! - [`mongo::MongoStore`]: MongoDB / Cosmos DB for MongoDB via the official driver
//! - `memory::MemoryStore`: in-process store with fault injection, built
//!   for tests and behind the `test-util` feature

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use thiserror::Error;

use crate::document::MsisdnDocument;

/// Server error code for a unique index violation
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Store-level failure not attributable to a single document
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid connection string: {0}")]
    InvalidUri(String),

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),
}

/// Per-operation failure inside an unordered bulk insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    /// Position of the failed document in the submitted batch
    pub index: usize,
    pub code: i32,
    pub message: String,
}

impl WriteFailure {
    pub fn is_duplicate_key(&self) -> bool {
        self.code == DUPLICATE_KEY_CODE
    }
}

/// Result of a bulk insert that reached the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Every document was inserted
    Inserted,
    /// The store attempted every document and rejected these
    Partial(Vec<WriteFailure>),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Liveness check, run once before any write
    async fn ping(&self) -> Result<(), StoreError>;

    /// Insert `docs` in one unordered bulk call.
    ///
    /// A rejected document must not stop the rest of the batch from being
    /// attempted. `Err` is reserved for failures with no per-document report.
    async fn insert_unordered(&self, docs: &[MsisdnDocument]) -> Result<InsertOutcome, StoreError>;

    /// Release the connection
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_classification() {
        let dup = WriteFailure {
            index: 0,
            code: 11000,
            message: "E11000 duplicate key error collection: dxlrewardsdb.msisdn_records".into(),
        };
        let other = WriteFailure {
            index: 1,
            code: 16500,
            message: "Request rate is large".into(),
        };

        assert!(dup.is_duplicate_key());
        assert!(!other.is_duplicate_key());
    }
}
