//! End-to-end tests against a real MongoDB in Docker
//!
//! Run with `cargo test -p msisdn-import --test mongo_e2e_tests -- --ignored`

use std::io::Write;
use std::time::Duration;

use msisdn_import::{
    config::ImportConfig,
    document::MsisdnDocument,
    import::import_and_close,
    store::{mongo::MongoStore, DocumentStore, InsertOutcome},
};
use testcontainers_modules::{mongo::Mongo, testcontainers::runners::AsyncRunner};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_import_and_rerun_against_mongo() {
    let container = Mongo::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(27017).await.unwrap();
    let uri = format!("mongodb://{}:{}", host, port);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "msisdn\n\"628001\"\n\"628002\"\n\n\"628001\"\n\"628003\"").unwrap();
    file.flush().unwrap();

    let config = ImportConfig::new(uri, file.path())
        .with_target("msisdn_e2e", "records")
        .with_batch_size(3)
        .with_retry_delay(Duration::from_millis(50));

    let store = MongoStore::connect(&config.store).await.unwrap();
    let first = import_and_close(&store, &config).await.unwrap();
    assert_eq!(first.records_read, 4);
    assert_eq!(first.inserted, 3);
    assert_eq!(first.duplicates, 1);
    assert!(first.is_complete());

    let store = MongoStore::connect(&config.store).await.unwrap();
    let second = import_and_close(&store, &config).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 4);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_duplicate_key_errors_are_reported_per_document() {
    let container = Mongo::default().start().await.unwrap();
    let port = container.get_host_port_ipv4(27017).await.unwrap();

    let config = ImportConfig::new(format!("mongodb://127.0.0.1:{}", port), "unused.csv")
        .with_target("msisdn_e2e", "classify");
    let store = MongoStore::connect(&config.store).await.unwrap();
    store.ping().await.unwrap();

    let docs: Vec<MsisdnDocument> = ["1", "2", "1"]
        .iter()
        .map(|id| MsisdnDocument::new(*id, "e2e"))
        .collect();

    match store.insert_unordered(&docs).await.unwrap() {
        InsertOutcome::Partial(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 2);
            assert!(failures[0].is_duplicate_key());
        },
        InsertOutcome::Inserted => panic!("expected a duplicate key failure"),
    }

    store.close().await;
}

#[tokio::test]
#[ignore = "requires network timeout"]
async fn test_unreachable_server_fails_ping() {
    let config = ImportConfig::new("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=500", "unused.csv");
    let mut store_config = config.store.clone();
    store_config.server_selection_timeout = Duration::from_millis(500);

    let store = MongoStore::connect(&store_config).await.unwrap();
    assert!(store.ping().await.is_err());
    store.close().await;
}
