//! Telemetry record and batch types.
//!
//! A record is an ordered tuple of provider-specific fields treated as
//! renderable text only; no schema is enforced beyond that.

use serde::{Deserialize, Serialize};

/// One row of operational data returned by a telemetry provider.
///
/// Fields arrive in provider order (typically timestamp, status or metric
/// value, resource identifier, free-text detail) and are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub fields: Vec<String>,
}

impl TelemetryRecord {
    /// Create a record from an ordered set of fields
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outcome of one provider call.
///
/// Distinguishes "the provider returned nothing" from "the provider call
/// failed" without ever surfacing an error to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionStatus {
    /// Provider call succeeded (records may still be empty)
    Collected,
    /// Provider call failed; the message is the stringified cause
    Failed(String),
}

/// A bounded window of telemetry records plus the status of the call that
/// produced them.
#[derive(Debug, Clone)]
pub struct TelemetryBatch {
    pub records: Vec<TelemetryRecord>,
    pub status: CollectionStatus,
}

impl TelemetryBatch {
    /// A successful collection
    pub fn collected(records: Vec<TelemetryRecord>) -> Self {
        Self {
            records,
            status: CollectionStatus::Collected,
        }
    }

    /// A failed collection - zero records, cause preserved in the status
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            status: CollectionStatus::Failed(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the provider call itself succeeded
    pub fn succeeded(&self) -> bool {
        self.status == CollectionStatus::Collected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_preserves_field_order() {
        let record = TelemetryRecord::new(["2024-01-01T00:00:00Z", "503", "web-01", "upstream timeout"]);
        assert_eq!(record.fields.len(), 4);
        assert_eq!(record.fields[0], "2024-01-01T00:00:00Z");
        assert_eq!(record.fields[3], "upstream timeout");
    }

    #[test]
    fn test_collected_batch() {
        let batch = TelemetryBatch::collected(vec![TelemetryRecord::new(["a", "b"])]);
        assert!(batch.succeeded());
        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_collected_batch_may_be_empty() {
        let batch = TelemetryBatch::collected(vec![]);
        assert!(batch.succeeded());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_failed_batch_has_no_records() {
        let batch = TelemetryBatch::failed("connection refused");
        assert!(!batch.succeeded());
        assert!(batch.is_empty());
        assert_eq!(
            batch.status,
            CollectionStatus::Failed("connection refused".to_string())
        );
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let record = TelemetryRecord::new(["ts", "42"]);
        let json = serde_json::to_string(&record).unwrap();
        let restored: TelemetryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }
}
