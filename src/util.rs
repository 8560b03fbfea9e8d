//! Utility helpers for auditscope.
//!
//! Audit records arrive with no enforced schema, so every component reads
//! them as plain `serde_json::Value` trees.  The helpers here cover the two
//! access patterns shared by the digest and the fallback analysis: looking a
//! field up under one of several candidate names, and rendering an arbitrary
//! value as the string used for distinct-value counting.

use serde_json::Value;
use std::collections::HashSet;

/// Candidate field names that identify the acting user, in priority order.
pub const USER_FIELDS: &[&str] = &["user", "username", "userId", "actor"];
/// Candidate field names that carry the client address, in priority order.
pub const IP_FIELDS: &[&str] = &["ip", "source_ip", "sourceIP", "clientIP"];
/// Candidate field names that describe what happened, in priority order.
pub const ACTION_FIELDS: &[&str] = &["action", "event", "eventType", "activity"];

/// Return the value stored under the first candidate key present on the
/// record.  Non-object records never match.  A key that is present with a
/// `null` value still wins over later candidates.
pub fn first_present<'a>(record: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let obj = record.as_object()?;
    candidates.iter().find_map(|key| obj.get(*key))
}

/// Render a value as the string used for set membership.  Strings are taken
/// verbatim; everything else uses its compact JSON text so that `42` and
/// `"42"` collapse to the same entry.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Insertion-ordered set of rendered values.  Keeps first-seen order so the
/// sample values shown to the model are stable across runs.
#[derive(Debug, Default, Clone)]
pub struct DistinctValues {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl DistinctValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value; returns true when it had not been seen before.
    pub fn insert(&mut self, value: &Value) -> bool {
        let rendered = render_value(value);
        if self.seen.contains(&rendered) {
            return false;
        }
        self.seen.insert(rendered.clone());
        self.ordered.push(rendered);
        true
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// The first `n` distinct values in the order they were observed.
    pub fn first(&self, n: usize) -> Vec<String> {
        self.ordered.iter().take(n).cloned().collect()
    }
}
