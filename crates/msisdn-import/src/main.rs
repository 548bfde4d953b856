//! msisdn-import - load MSISDNs from CSV into MongoDB

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use msisdn_common::logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
use msisdn_import::{
    config::{self, ImportConfig},
    import,
    store::mongo::MongoStore,
    writer::BackoffShape,
    ImportError,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "msisdn-import")]
#[command(author, version, about = "Bulk-load MSISDNs from a CSV file into MongoDB")]
struct Cli {
    /// MongoDB connection string
    #[arg(long, env = "MONGODB_CONNECTION_STRING", hide_env_values = true)]
    connection_string: String,

    /// Target database
    #[arg(long, env = "MSISDN_DATABASE", default_value = config::DEFAULT_DATABASE)]
    database: String,

    /// Target collection
    #[arg(long, env = "MSISDN_COLLECTION", default_value = config::DEFAULT_COLLECTION)]
    collection: String,

    /// CSV file with a header row and the MSISDN in the first column
    #[arg(short, long, env = "MSISDN_INPUT_FILE", default_value = config::DEFAULT_INPUT_FILE)]
    input: PathBuf,

    /// Documents per bulk insert
    #[arg(long, env = "MSISDN_BATCH_SIZE", default_value_t = config::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Attempts per batch before it is abandoned
    #[arg(long, env = "MSISDN_MAX_RETRIES", default_value_t = config::DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Base delay between attempts
    #[arg(long, env = "MSISDN_RETRY_DELAY_SECS", default_value_t = config::DEFAULT_RETRY_DELAY_SECS)]
    retry_delay_secs: u64,

    /// Successful batches between progress lines
    #[arg(long, env = "MSISDN_LOG_FREQUENCY", default_value_t = config::DEFAULT_LOG_FREQUENCY)]
    log_frequency: u64,

    /// Backoff after per-document write errors (fixed or linear)
    #[arg(long, env = "MSISDN_WRITE_ERROR_BACKOFF", default_value_t = BackoffShape::Fixed)]
    write_error_backoff: BackoffShape,

    /// Backoff after failures with no per-document report (fixed or linear)
    #[arg(long, env = "MSISDN_FAULT_BACKOFF", default_value_t = BackoffShape::Linear)]
    fault_backoff: BackoffShape,

    /// Log duplicate-only batches with more duplicates than this
    #[arg(
        long,
        env = "MSISDN_DUPLICATE_LOG_THRESHOLD",
        default_value_t = config::DEFAULT_DUPLICATE_LOG_THRESHOLD,
        conflicts_with = "no_duplicate_log"
    )]
    duplicate_log_threshold: usize,

    /// Never log duplicate-only batches
    #[arg(long)]
    no_duplicate_log: bool,

    /// Value written to every document's requestId
    #[arg(long, env = "MSISDN_REQUEST_ID", default_value = msisdn_import::document::DEFAULT_REQUEST_ID)]
    request_id: String,

    /// Stop after this many records
    #[arg(long, env = "MSISDN_RECORD_LIMIT")]
    limit: Option<usize>,

    /// Exit successfully even if some batches were abandoned
    #[arg(long, env = "MSISDN_ALLOW_PARTIAL")]
    allow_partial: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log destination: console, file or both (LOG_OUTPUT overrides)
    #[arg(long)]
    log_output: Option<LogOutput>,

    /// Log line format: text or json (LOG_FORMAT overrides)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Logging settings from the flags, before `LOG_*` overrides
    fn log_config(&self) -> LogConfig {
        let level = if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        };

        let mut config = LogConfig::default()
            .with_level(level)
            .with_filter_directives("mongodb=warn");
        if let Some(output) = self.log_output {
            config = config.with_output(output);
        }
        if let Some(format) = self.log_format {
            config = config.with_format(format);
        }
        config
    }

    fn into_config(self) -> ImportConfig {
        let threshold = (!self.no_duplicate_log).then_some(self.duplicate_log_threshold);

        let mut config = ImportConfig::new(self.connection_string, self.input)
            .with_target(self.database, self.collection)
            .with_batch_size(self.batch_size)
            .with_max_retries(self.max_retries)
            .with_retry_delay(Duration::from_secs(self.retry_delay_secs))
            .with_log_frequency(self.log_frequency)
            .with_backoff(self.write_error_backoff, self.fault_backoff)
            .with_duplicate_log_threshold(threshold)
            .with_request_id(self.request_id)
            .with_allow_partial(self.allow_partial);

        if let Some(limit) = self.limit {
            config = config.with_record_limit(limit);
        }

        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Environment variables take precedence over the flags
    let log_config = cli.log_config().merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = cli.into_config();
    config.validate()?;

    let store = MongoStore::connect(&config.store).await.map_err(|e| {
        error!(error = %e, "Failed to create MongoDB client");
        ImportError::client_setup(e)
    })?;

    let summary = import::import_and_close(&store, &config).await?;

    if !summary.is_complete() {
        if config.allow_partial {
            info!(failed_batches = summary.batches_failed, "Finished with abandoned batches");
        } else {
            return Err(ImportError::Incomplete {
                failed_batches: summary.batches_failed,
            }
            .into());
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_into_config() {
        let cli = Cli::try_parse_from([
            "msisdn-import",
            "--connection-string",
            "mongodb://db:27017",
            "--input",
            "numbers.csv",
            "--batch-size",
            "500",
            "--fault-backoff",
            "fixed",
            "--no-duplicate-log",
            "--limit",
            "20",
        ])
        .unwrap();

        let config = cli.into_config();
        assert_eq!(config.store.connection_string, "mongodb://db:27017");
        assert_eq!(config.input_file, PathBuf::from("numbers.csv"));
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.fault_backoff, BackoffShape::Fixed);
        assert_eq!(config.write_error_backoff, BackoffShape::Fixed);
        assert_eq!(config.duplicate_log_threshold, None);
        assert_eq!(config.record_limit, Some(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cli_log_flags() {
        let cli = Cli::try_parse_from([
            "msisdn-import",
            "--connection-string",
            "mongodb://db:27017",
            "-v",
            "--log-output",
            "both",
            "--log-format",
            "json",
        ])
        .unwrap();

        let log_config = cli.log_config();
        assert_eq!(log_config.level, LogLevel::Debug);
        assert_eq!(log_config.output, LogOutput::Both);
        assert_eq!(log_config.format, LogFormat::Json);
        assert_eq!(log_config.filter_directives.as_deref(), Some("mongodb=warn"));

        let cli = Cli::try_parse_from(["msisdn-import", "--connection-string", "mongodb://db:27017"]).unwrap();
        let log_config = cli.log_config();
        assert_eq!(log_config.output, LogOutput::Console);
        assert_eq!(log_config.format, LogFormat::Text);
    }
}
