//! Import configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::document::DEFAULT_REQUEST_ID;
use crate::error::{ImportError, Result};
use crate::writer::{BackoffShape, RetryPolicy};

// ============================================================================
// Import Configuration Constants
// ============================================================================

/// Default target database.
pub const DEFAULT_DATABASE: &str = "dxlrewardsdb";

/// Default target collection.
pub const DEFAULT_COLLECTION: &str = "msisdn_records";

/// Default input file.
pub const DEFAULT_INPUT_FILE: &str = "SAMPLE_MSISDN_slim.csv";

/// Documents per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Successful batches between progress lines.
pub const DEFAULT_LOG_FREQUENCY: u64 = 10;

/// Attempts per batch before it is abandoned.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay between attempts, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Duplicate-only outcomes above this size are logged on the first attempt.
pub const DEFAULT_DUPLICATE_LOG_THRESHOLD: usize = 100;

/// How long the driver waits for a usable server, in seconds.
pub const DEFAULT_SERVER_SELECTION_TIMEOUT_SECS: u64 = 30;

/// Where documents go
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// MongoDB connection string
    pub connection_string: String,

    pub database: String,
    pub collection: String,

    pub server_selection_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            server_selection_timeout: Duration::from_secs(DEFAULT_SERVER_SELECTION_TIMEOUT_SECS),
        }
    }
}

/// Everything one import run needs
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub store: StoreConfig,

    /// CSV file to read
    pub input_file: PathBuf,

    /// Documents per bulk insert
    pub batch_size: usize,

    /// Successful batches between progress lines
    pub log_frequency: u64,

    /// Attempts per batch, including the first
    pub max_retries: u32,

    pub retry_delay: Duration,

    /// Backoff after a partial failure with non-duplicate errors
    pub write_error_backoff: BackoffShape,

    /// Backoff after a failure with no per-document report
    pub fault_backoff: BackoffShape,

    /// `None` disables the duplicate-only log line
    pub duplicate_log_threshold: Option<usize>,

    /// Tag written to every document's `requestId`
    pub request_id: String,

    /// Stop after this many records (None = read everything)
    pub record_limit: Option<usize>,

    /// Finish with success even if batches were abandoned
    pub allow_partial: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            input_file: PathBuf::from(DEFAULT_INPUT_FILE),
            batch_size: DEFAULT_BATCH_SIZE,
            log_frequency: DEFAULT_LOG_FREQUENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            write_error_backoff: BackoffShape::Fixed,
            fault_backoff: BackoffShape::Linear,
            duplicate_log_threshold: Some(DEFAULT_DUPLICATE_LOG_THRESHOLD),
            request_id: DEFAULT_REQUEST_ID.to_string(),
            record_limit: None,
            allow_partial: false,
        }
    }
}

impl ImportConfig {
    pub fn new(connection_string: impl Into<String>, input_file: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.store.connection_string = connection_string.into();
        config.input_file = input_file.into();
        config
    }

    pub fn with_target(mut self, database: impl Into<String>, collection: impl Into<String>) -> Self {
        self.store.database = database.into();
        self.store.collection = collection.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_log_frequency(mut self, batches: u64) -> Self {
        self.log_frequency = batches;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_backoff(mut self, write_error: BackoffShape, fault: BackoffShape) -> Self {
        self.write_error_backoff = write_error;
        self.fault_backoff = fault;
        self
    }

    pub fn with_duplicate_log_threshold(mut self, threshold: Option<usize>) -> Self {
        self.duplicate_log_threshold = threshold;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set record limit for testing
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = Some(limit);
        self
    }

    pub fn with_allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    /// Retry knobs for the batch writer
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            write_error_backoff: self.write_error_backoff,
            fault_backoff: self.fault_backoff,
            duplicate_log_threshold: self.duplicate_log_threshold,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.connection_string.trim().is_empty() {
            return Err(ImportError::config("Connection string cannot be empty"));
        }

        if self.store.database.is_empty() {
            return Err(ImportError::config("Database name cannot be empty"));
        }

        if self.store.collection.is_empty() {
            return Err(ImportError::config("Collection name cannot be empty"));
        }

        if self.batch_size == 0 {
            return Err(ImportError::config("Batch size must be greater than 0"));
        }

        if self.log_frequency == 0 {
            return Err(ImportError::config("Log frequency must be greater than 0"));
        }

        if self.max_retries == 0 {
            return Err(ImportError::config("Max retries must be at least 1"));
        }

        Ok(())
    }
}
