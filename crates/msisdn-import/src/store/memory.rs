//! In-process document store
//!
//! Enforces the same `_id` uniqueness as the real collection and can be told
//! to misbehave: refuse pings, throttle specific MSISDNs for a number of
//! calls, or fail whole calls outright.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{DocumentStore, InsertOutcome, StoreError, WriteFailure, DUPLICATE_KEY_CODE};
use crate::document::MsisdnDocument;

/// Cosmos DB "request rate is large" code, used for injected rejections
pub const THROTTLED_CODE: i32 = 16500;

#[derive(Default)]
struct State {
    documents: BTreeMap<String, MsisdnDocument>,
    unreachable: bool,
    throttled: HashMap<String, u32>,
    faults_remaining: u32,
    submitted: Vec<Vec<MsisdnDocument>>,
    pings: u32,
    closed: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose liveness check always fails
    pub fn unreachable() -> Self {
        let store = Self::default();
        store.lock().unreachable = true;
        store
    }

    /// Pre-populate the collection
    pub fn seed<I, S>(&self, msisdns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        for msisdn in msisdns {
            let doc = MsisdnDocument::new(msisdn, crate::document::DEFAULT_REQUEST_ID);
            state.documents.insert(doc.msisdn.clone(), doc);
        }
    }

    /// Reject `msisdn` with [`THROTTLED_CODE`] in the next `calls` insert calls
    /// that contain it
    pub fn throttle(&self, msisdn: impl Into<String>, calls: u32) {
        self.lock().throttled.insert(msisdn.into(), calls);
    }

    /// Fail the next `calls` insert calls without a per-document report
    pub fn fail_next_calls(&self, calls: u32) {
        self.lock().faults_remaining = calls;
    }

    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, msisdn: &str) -> Option<MsisdnDocument> {
        self.lock().documents.get(msisdn).cloned()
    }

    /// MSISDNs currently stored, in key order
    pub fn msisdns(&self) -> Vec<String> {
        self.lock().documents.keys().cloned().collect()
    }

    /// Every batch handed to `insert_unordered`, including faulted calls
    pub fn submitted_batches(&self) -> Vec<Vec<MsisdnDocument>> {
        self.lock().submitted.clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.lock().submitted.len()
    }

    pub fn ping_count(&self) -> u32 {
        self.lock().pings
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.pings += 1;
        if state.unreachable {
            return Err(StoreError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    async fn insert_unordered(&self, docs: &[MsisdnDocument]) -> Result<InsertOutcome, StoreError> {
        let mut state = self.lock();
        state.submitted.push(docs.to_vec());

        if state.faults_remaining > 0 {
            state.faults_remaining -= 1;
            return Err(StoreError::Write("connection reset by peer".to_string()));
        }

        let mut failures = Vec::new();
        let mut throttled_this_call = Vec::new();

        for (index, doc) in docs.iter().enumerate() {
            if state.throttled.get(&doc.msisdn).is_some_and(|remaining| *remaining > 0) {
                throttled_this_call.push(doc.msisdn.clone());
                failures.push(WriteFailure {
                    index,
                    code: THROTTLED_CODE,
                    message: "Request rate is large".to_string(),
                });
                continue;
            }

            if state.documents.contains_key(&doc.msisdn) {
                failures.push(WriteFailure {
                    index,
                    code: DUPLICATE_KEY_CODE,
                    message: format!("E11000 duplicate key error dup key: {{ _id: \"{}\" }}", doc.msisdn),
                });
                continue;
            }

            state.documents.insert(doc.msisdn.clone(), doc.clone());
        }

        for msisdn in throttled_this_call {
            if let Some(remaining) = state.throttled.get_mut(&msisdn) {
                *remaining = remaining.saturating_sub(1);
            }
        }

        if failures.is_empty() {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Partial(failures))
        }
    }

    async fn close(&self) {
        self.lock().closed = true;
    }
}
