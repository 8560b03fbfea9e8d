//! Batch digest handed to the model.
//!
//! A batch can hold thousands of records, far more than fits in a prompt.
//! The digest keeps a handful of records verbatim and, for the fields audit
//! logs commonly carry, a capped list of the distinct values observed.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::util::DistinctValues;

/// Records copied verbatim into the digest.
pub const SAMPLE_ENTRIES: usize = 5;
/// Records scanned when collecting per-field distinct values.
pub const FIELD_SCAN_LIMIT: usize = 100;
/// Distinct values listed per field.
pub const SAMPLE_VALUES: usize = 10;

/// Field names summarised individually when present.
pub const RECOGNIZED_FIELDS: &[&str] = &[
    "timestamp",
    "user",
    "action",
    "source_ip",
    "event_type",
    "status",
    "resource",
    "user_agent",
    "response_code",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub total_entries: usize,
    pub sample_entries: Vec<Value>,
    pub field_analysis: FieldAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalysis {
    /// Every key seen on any record, sorted.
    pub available_fields: Vec<String>,
    /// Per recognized field, keyed by field name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    pub sample_values: Vec<String>,
    pub total_unique: usize,
}

/// Reduce a batch into its digest.  Pure; the batch is not modified.
pub fn build_digest(batch: &[Value]) -> Digest {
    let available: BTreeSet<&str> = batch
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|obj| obj.keys().map(String::as_str))
        .collect();

    let scanned = &batch[..batch.len().min(FIELD_SCAN_LIMIT)];
    let mut fields = BTreeMap::new();
    for field in RECOGNIZED_FIELDS {
        let mut distinct = DistinctValues::new();
        for value in scanned.iter().filter_map(|rec| rec.get(*field)) {
            distinct.insert(value);
        }
        if distinct.is_empty() {
            continue;
        }
        fields.insert(
            (*field).to_string(),
            FieldSummary {
                sample_values: distinct.first(SAMPLE_VALUES),
                total_unique: distinct.len(),
            },
        );
    }

    Digest {
        total_entries: batch.len(),
        sample_entries: batch.iter().take(SAMPLE_ENTRIES).cloned().collect(),
        field_analysis: FieldAnalysis {
            available_fields: available.into_iter().map(str::to_string).collect(),
            fields,
        },
    }
}
