//! Import run driver
//!
//! Pulls records from the CSV source, groups them into batches of
//! `batch_size`, hands each batch to the [`BatchWriter`] and keeps the
//! running tally. Batches are written one at a time.

use std::time::{Duration, Instant};

use tracing::{error, info, info_span, Instrument};

use crate::config::ImportConfig;
use crate::document::MsisdnDocument;
use crate::error::{ImportError, Result};
use crate::source::RecordSource;
use crate::store::DocumentStore;
use crate::writer::{BatchOutcome, BatchWriter};

/// Running totals for one import run
#[derive(Debug)]
pub struct RunTally {
    /// Records read from the input file
    pub records_read: u64,
    /// Documents newly inserted by successful batches
    pub total_processed: u64,
    /// Duplicate-key conflicts, failed batches included
    pub total_duplicates: u64,
    /// Batches that ended successfully
    pub batch_count: u64,
    pub failed_batches: u64,
    started: Instant,
}

impl RunTally {
    pub fn start() -> Self {
        Self {
            records_read: 0,
            total_processed: 0,
            total_duplicates: 0,
            batch_count: 0,
            failed_batches: 0,
            started: Instant::now(),
        }
    }

    /// Fold one batch outcome in. Returns true when the progress line is due.
    pub fn record(&mut self, batch_len: usize, outcome: &BatchOutcome, log_frequency: u64) -> bool {
        self.total_duplicates += outcome.duplicates as u64;

        if !outcome.success {
            self.failed_batches += 1;
            return false;
        }

        self.total_processed += batch_len.saturating_sub(outcome.duplicates) as u64;
        self.batch_count += 1;
        log_frequency > 0 && self.batch_count % log_frequency == 0
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Inserted records per second since the run started
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total_processed as f64 / secs
        } else {
            0.0
        }
    }

    fn summary(&self) -> ImportSummary {
        ImportSummary {
            records_read: self.records_read,
            inserted: self.total_processed,
            duplicates: self.total_duplicates,
            batches_written: self.batch_count,
            batches_failed: self.failed_batches,
            elapsed: self.elapsed(),
        }
    }
}

/// Final numbers of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub records_read: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
    pub elapsed: Duration,
}

impl ImportSummary {
    pub fn is_complete(&self) -> bool {
        self.batches_failed == 0
    }

    /// Inserted records per second over the whole run
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.inserted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Run an import against `store`, then close it whatever the outcome.
pub async fn import_and_close<S: DocumentStore + ?Sized>(
    store: &S,
    config: &ImportConfig,
) -> Result<ImportSummary> {
    let result = run_import(store, config).await;
    store.close().await;
    info!("Connection closed");
    result
}

/// Run an import against an already constructed store.
///
/// Returns `Err` for a failed liveness check or an unreadable input file.
/// Abandoned batches do not make this fail; check
/// [`ImportSummary::is_complete`].
pub async fn run_import<S: DocumentStore + ?Sized>(
    store: &S,
    config: &ImportConfig,
) -> Result<ImportSummary> {
    config.validate()?;

    if let Err(e) = store.ping().await {
        error!(error = %e, "Failed to connect to document store: {}", e);
        return Err(ImportError::Connectivity(e));
    }
    info!(
        database = %config.store.database,
        collection = %config.store.collection,
        "Connected to document store successfully"
    );

    let source = RecordSource::open(&config.input_file)?;
    info!(input = %config.input_file.display(), batch_size = config.batch_size, "Reading input file");

    let writer = BatchWriter::new(store, config.retry_policy());
    let mut tally = RunTally::start();
    let mut batch: Vec<MsisdnDocument> = Vec::with_capacity(config.batch_size);

    let limit = config.record_limit.unwrap_or(usize::MAX);
    for record in source.take(limit) {
        let record = record?;
        tally.records_read += 1;
        batch.push(MsisdnDocument::new(record.msisdn, &config.request_id));

        if batch.len() >= config.batch_size {
            flush(&writer, &mut batch, &mut tally, config.log_frequency).await;
        }
    }

    if !batch.is_empty() {
        flush(&writer, &mut batch, &mut tally, config.log_frequency).await;
    }

    let summary = tally.summary();
    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        failed_batches = summary.batches_failed,
        "Import completed. {} records inserted, {} duplicates skipped in {:.2}s ({:.2} records/s)",
        summary.inserted,
        summary.duplicates,
        summary.elapsed.as_secs_f64(),
        summary.rate()
    );

    Ok(summary)
}

/// Write the pending batch and clear it, successful or not
async fn flush<S: DocumentStore + ?Sized>(
    writer: &BatchWriter<'_, S>,
    batch: &mut Vec<MsisdnDocument>,
    tally: &mut RunTally,
    log_frequency: u64,
) {
    let batch_number = tally.batch_count + tally.failed_batches + 1;
    let span = info_span!("batch", number = batch_number, size = batch.len());

    let outcome = writer.write_batch(batch.as_slice()).instrument(span.clone()).await;
    let _entered = span.enter();

    if tally.record(batch.len(), &outcome, log_frequency) {
        info!(
            processed = tally.total_processed,
            duplicates = tally.total_duplicates,
            "Progress: {} records processed, {} duplicates skipped ({:.2} records/s)",
            tally.total_processed,
            tally.total_duplicates,
            tally.rate()
        );
    } else if !outcome.success {
        error!(
            attempts = outcome.attempts,
            dropped = batch.len(),
            "Batch abandoned after {} attempts, {} records not written",
            outcome.attempts,
            batch.len()
        );
    }

    batch.clear();
}
