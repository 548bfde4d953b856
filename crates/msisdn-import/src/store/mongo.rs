//! MongoDB-backed store
//!
//! Works against MongoDB and Azure Cosmos DB for MongoDB. Duplicate MSISDNs
//! surface as code 11000 write errors inside `ErrorKind::InsertMany`.

use async_trait::async_trait;
use bson::doc;
use mongodb::{
    error::{Error as DriverError, ErrorKind},
    options::ClientOptions,
    Client, Collection, Database,
};
use tracing::{debug, info};

use super::{DocumentStore, InsertOutcome, StoreError, WriteFailure};
use crate::config::StoreConfig;
use crate::document::MsisdnDocument;

/// Application name reported to the server when the URI doesn't set one
pub const APP_NAME: &str = "msisdn-import";

pub struct MongoStore {
    client: Client,
    database: Database,
    collection: Collection<MsisdnDocument>,
}

impl MongoStore {
    /// Build a client for `config`.
    ///
    /// The driver connects lazily, so an unreachable server is only detected
    /// by [`DocumentStore::ping`].
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.connection_string)
            .await
            .map_err(|e| StoreError::InvalidUri(e.to_string()))?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_string());
        options.server_selection_timeout = Some(config.server_selection_timeout);

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        let collection = database.collection::<MsisdnDocument>(&config.collection);

        debug!(
            database = %config.database,
            collection = %config.collection,
            "MongoDB client created"
        );

        Ok(Self {
            client,
            database,
            collection,
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;
        Ok(())
    }

    async fn insert_unordered(&self, docs: &[MsisdnDocument]) -> Result<InsertOutcome, StoreError> {
        if docs.is_empty() {
            return Ok(InsertOutcome::Inserted);
        }

        match self.collection.insert_many(docs).ordered(false).await {
            Ok(result) => {
                debug!(inserted = result.inserted_ids.len(), "Bulk insert acknowledged");
                Ok(InsertOutcome::Inserted)
            },
            Err(e) => classify_insert_error(e),
        }
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("MongoDB client shut down");
    }
}

/// Split per-document write errors from everything else.
///
/// A failure that carries only a write concern error has no per-document
/// report and is returned as `Err`.
fn classify_insert_error(err: DriverError) -> Result<InsertOutcome, StoreError> {
    if let ErrorKind::InsertMany(ref failure) = *err.kind {
        if let Some(write_errors) = failure.write_errors.as_ref().filter(|e| !e.is_empty()) {
            let failures = write_errors
                .iter()
                .map(|e| WriteFailure {
                    index: e.index,
                    code: e.code,
                    message: e.message.clone(),
                })
                .collect();
            return Ok(InsertOutcome::Partial(failures));
        }
    }

    Err(StoreError::Driver(err))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_malformed_uri_is_rejected_before_connecting() {
        let config = StoreConfig {
            connection_string: "localhost:27017".to_string(),
            ..StoreConfig::default()
        };

        let err = MongoStore::connect(&config).await.err().unwrap();
        assert!(matches!(err, StoreError::InvalidUri(_)));
    }
}
