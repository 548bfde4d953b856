//! MSISDN Import Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Bulk-loads MSISDNs from a CSV export into a MongoDB collection keyed by
//! MSISDN. Rows are batched, each batch goes out as one unordered bulk
//! insert, and duplicate-key conflicts count as already-imported records
//! rather than failures.
//!
//! # Modules
//!
//! - [`source`]: CSV rows to [`source::Record`]s
//! - [`document`]: the stored document shape
//! - [`store`]: the [`store::DocumentStore`] seam and its MongoDB / in-memory backends
//! - [`writer`]: per-batch retry and duplicate accounting
//! - [`import`]: the run loop, tally and progress logging
//!
//! # Example
//!
//! ```no_run
//! use msisdn_import::{config::ImportConfig, import, store::mongo::MongoStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::new("mongodb://localhost:27017", "msisdn.csv");
//!     let store = MongoStore::connect(&config.store).await?;
//!     let summary = import::import_and_close(&store, &config).await?;
//!     println!("{} inserted, {} duplicates", summary.inserted, summary.duplicates);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod import;
pub mod source;
pub mod store;
pub mod writer;

pub use error::{ImportError, Result};
