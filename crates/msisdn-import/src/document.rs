//! Documents persisted to the `msisdn_records` collection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default `requestId` tag identifying this import job
pub const DEFAULT_REQUEST_ID: &str = "batch-import-old-app";

/// Value stored in the SIM fields, which the import has no data for
pub const PLACEHOLDER_VALUE: &str = "N/A";

/// Status written on every imported record
pub const STATUS_COMPLETED: &str = "completed";

/// One imported MSISDN.
///
/// `_id` carries the MSISDN so the collection's primary key enforces
/// uniqueness; re-inserting an existing MSISDN is a duplicate-key conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsisdnDocument {
    #[serde(rename = "_id")]
    pub msisdn: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub allocation_date: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_date: DateTime<Utc>,

    pub request_id: String,
    pub sim_number: String,
    pub sim_type: String,
    pub status: String,
}

impl MsisdnDocument {
    /// Build a document stamped with the current time.
    ///
    /// The timestamp is taken once here. Retries resubmit this same value.
    pub fn new(msisdn: impl Into<String>, request_id: &str) -> Self {
        Self::at(msisdn, request_id, Utc::now())
    }

    /// Build a document with an explicit capture time
    pub fn at(msisdn: impl Into<String>, request_id: &str, captured_at: DateTime<Utc>) -> Self {
        Self {
            msisdn: msisdn.into(),
            allocation_date: captured_at,
            created_date: captured_at,
            request_id: request_id.to_string(),
            sim_number: PLACEHOLDER_VALUE.to_string(),
            sim_type: PLACEHOLDER_VALUE.to_string(),
            status: STATUS_COMPLETED.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bson::Bson;

    #[test]
    fn test_new_document_fields() {
        let doc = MsisdnDocument::new("628123456789", DEFAULT_REQUEST_ID);

        assert_eq!(doc.msisdn, "628123456789");
        assert_eq!(doc.allocation_date, doc.created_date);
        assert_eq!(doc.request_id, DEFAULT_REQUEST_ID);
        assert_eq!(doc.sim_number, "N/A");
        assert_eq!(doc.sim_type, "N/A");
        assert_eq!(doc.status, "completed");
    }

    #[test]
    fn test_bson_shape() {
        let doc = MsisdnDocument::new("628111", "job-7");
        let bson_doc = bson::to_document(&doc).unwrap();

        assert_eq!(bson_doc.get_str("_id").unwrap(), "628111");
        assert_eq!(bson_doc.get_str("requestId").unwrap(), "job-7");
        assert_eq!(bson_doc.get_str("simNumber").unwrap(), "N/A");
        assert_eq!(bson_doc.get_str("simType").unwrap(), "N/A");
        assert_eq!(bson_doc.get_str("status").unwrap(), "completed");
        assert!(matches!(bson_doc.get("allocationDate"), Some(Bson::DateTime(_))));
        assert!(matches!(bson_doc.get("createdDate"), Some(Bson::DateTime(_))));
        assert!(!bson_doc.contains_key("msisdn"));
    }

    #[test]
    fn test_clone_keeps_capture_time() {
        let doc = MsisdnDocument::new("628222", DEFAULT_REQUEST_ID);
        let resubmitted = doc.clone();
        assert_eq!(doc, resubmitted);
    }
}
