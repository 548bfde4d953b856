//! Resilient batch writer
//!
//! Submits a whole batch as one unordered bulk insert and retries the whole
//! batch while non-duplicate failures remain. Re-sending documents that made
//! it in on an earlier attempt is harmless: they come back as duplicate-key
//! conflicts, which count as success.
//!
//! Retried documents are the same values as the first attempt (the batch is
//! borrowed, never rebuilt), so a retry cannot change any stored field.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::document::MsisdnDocument;
use crate::store::{DocumentStore, InsertOutcome};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffShape {
    /// Always wait the base delay
    #[default]
    Fixed,
    /// Wait the base delay times the attempt number just made
    Linear,
}

impl BackoffShape {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay(self, base: Duration, attempt: u32) -> Duration {
        match self {
            BackoffShape::Fixed => base,
            BackoffShape::Linear => base.saturating_mul(attempt.max(1)),
        }
    }
}

impl std::str::FromStr for BackoffShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "constant" => Ok(BackoffShape::Fixed),
            "linear" => Ok(BackoffShape::Linear),
            _ => Err(format!("Invalid backoff shape '{}' (expected fixed or linear)", s)),
        }
    }
}

impl std::fmt::Display for BackoffShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffShape::Fixed => write!(f, "fixed"),
            BackoffShape::Linear => write!(f, "linear"),
        }
    }
}

/// Retry knobs for [`BatchWriter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per batch, including the first
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub write_error_backoff: BackoffShape,
    pub fault_backoff: BackoffShape,
    /// Log duplicate-only first attempts with more duplicates than this
    pub duplicate_log_threshold: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
            write_error_backoff: BackoffShape::Fixed,
            fault_backoff: BackoffShape::Linear,
            duplicate_log_threshold: Some(100),
        }
    }
}

/// What happened to one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    /// False only if failures persisted through the last attempt
    pub success: bool,
    /// Duplicate-key conflicts summed over every attempt
    pub duplicates: usize,
    /// Bulk calls made for this batch
    pub attempts: u32,
}

pub struct BatchWriter<'a, S: ?Sized> {
    store: &'a S,
    policy: RetryPolicy,
}

impl<'a, S: DocumentStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Write `batch`, retrying per the policy. Never returns an error: an
    /// abandoned batch is reported with `success == false`.
    pub async fn write_batch(&self, batch: &[MsisdnDocument]) -> BatchOutcome {
        let max_retries = self.policy.max_retries.max(1);
        let mut duplicates = 0usize;

        for attempt in 1..=max_retries {
            let last_attempt = attempt == max_retries;

            let delay = match self.store.insert_unordered(batch).await {
                Ok(InsertOutcome::Inserted) => {
                    return BatchOutcome {
                        success: true,
                        duplicates,
                        attempts: attempt,
                    };
                },
                Ok(InsertOutcome::Partial(failures)) => {
                    let new_duplicates = failures.iter().filter(|f| f.is_duplicate_key()).count();
                    let other_errors = failures.len() - new_duplicates;
                    duplicates += new_duplicates;

                    if other_errors == 0 {
                        if attempt == 1
                            && self
                                .policy
                                .duplicate_log_threshold
                                .is_some_and(|threshold| new_duplicates > threshold)
                        {
                            info!(duplicates = new_duplicates, "Bulk write: {} duplicates ignored", new_duplicates);
                        }
                        return BatchOutcome {
                            success: true,
                            duplicates,
                            attempts: attempt,
                        };
                    }

                    let sample = failures
                        .iter()
                        .find(|f| !f.is_duplicate_key())
                        .map(|f| format!("code {}: {}", f.code, f.message))
                        .unwrap_or_default();
                    warn!(
                        duplicates = new_duplicates,
                        other_errors,
                        attempt,
                        max_retries,
                        sample = %sample,
                        "Bulk write: {} duplicates, {} other errors on attempt {}/{}",
                        new_duplicates,
                        other_errors,
                        attempt,
                        max_retries
                    );

                    self.policy.write_error_backoff.delay(self.policy.retry_delay, attempt)
                },
                Err(e) => {
                    error!(
                        error = %e,
                        attempt,
                        max_retries,
                        "Error on attempt {}/{}: {}",
                        attempt,
                        max_retries,
                        e
                    );

                    self.policy.fault_backoff.delay(self.policy.retry_delay, attempt)
                },
            };

            if last_attempt {
                break;
            }

            tokio::time::sleep(delay).await;
        }

        BatchOutcome {
            success: false,
            duplicates,
            attempts: max_retries,
        }
    }
}
