//! The analysis contract returned to callers.
//!
//! The same structure is produced by decoding the model's answer, by the
//! degraded path when the answer cannot be decoded, and by the deterministic
//! fallback.  Every member carries a serde default so a sparse model answer
//! still serializes to the full shape.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of characters of raw model text echoed back when the
/// model answer could not be decoded.
pub const RAW_RESPONSE_LIMIT: usize = 1000;

pub const DECODE_FAILED_NOTE: &str = "AI response received but JSON parsing failed";
pub const MANUAL_REVIEW_RECOMMENDATION: &str = "Review the AI response manually for insights";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    #[serde(deserialize_with = "null_as_default")]
    pub summary: AnalysisSummary,
    #[serde(deserialize_with = "null_as_default")]
    pub security_insights: Vec<SecurityInsight>,
    #[serde(deserialize_with = "null_as_default")]
    pub anomalies: Vec<Anomaly>,
    #[serde(deserialize_with = "null_as_default")]
    pub trends: Vec<Trend>,
    #[serde(deserialize_with = "null_as_default")]
    pub recommendations: Vec<String>,
    /// Raw model output, only present on the degraded path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisSummary {
    #[serde(deserialize_with = "count", skip_serializing_if = "Option::is_none")]
    pub total_events: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
    #[serde(deserialize_with = "count", skip_serializing_if = "Option::is_none")]
    pub unique_users: Option<u64>,
    #[serde(
        rename = "uniqueIPs",
        deserialize_with = "count",
        skip_serializing_if = "Option::is_none"
    )]
    pub unique_ips: Option<u64>,
    #[serde(deserialize_with = "count", skip_serializing_if = "Option::is_none")]
    pub unique_actions: Option<u64>,
    /// Set when the deterministic fallback produced the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Set when the model answered but the answer could not be decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityInsight {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    /// `HIGH`, `MEDIUM`, `LOW`, or `INFO` for the fallback overview.  Kept as
    /// free text because models do not always stay inside the enumeration.
    #[serde(deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Anomaly {
    #[serde(deserialize_with = "null_as_default")]
    pub pattern: String,
    #[serde(deserialize_with = "null_as_default")]
    pub risk: String,
    #[serde(deserialize_with = "null_as_default")]
    pub details: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trend {
    #[serde(deserialize_with = "null_as_default")]
    pub trend: String,
    #[serde(deserialize_with = "null_as_default")]
    pub significance: String,
}

/// Models write `null` for members they have nothing to say about.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Counts may arrive as `3`, `3.0`, or `null`.  Fractions are rounded;
/// negative or non-numeric values are rejected.
fn count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(n) = number.as_u64() {
        return Ok(Some(n));
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f >= 0.0 => Ok(Some(f.round() as u64)),
        _ => Err(D::Error::custom(format!(
            "count must be a non-negative number, got {}",
            number
        ))),
    }
}

impl AnalysisResult {
    /// Result substituted when the model answered with text that does not
    /// decode as an analysis.  The raw answer is kept (truncated) so an
    /// operator can still read it.
    pub fn degraded(total_events: usize, raw: &str) -> Self {
        AnalysisResult {
            summary: AnalysisSummary {
                total_events: Some(total_events as u64),
                analysis_note: Some(DECODE_FAILED_NOTE.to_string()),
                ..AnalysisSummary::default()
            },
            security_insights: Vec::new(),
            anomalies: Vec::new(),
            trends: Vec::new(),
            recommendations: vec![MANUAL_REVIEW_RECOMMENDATION.to_string()],
            ai_response: Some(truncate_chars(raw, RAW_RESPONSE_LIMIT)),
        }
    }
}

/// Truncate on a character boundary, appending `...` when anything was cut.
fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sparse_model_answer_fills_defaults() {
        let parsed: AnalysisResult =
            serde_json::from_value(json!({"summary": {"totalEvents": 3}})).unwrap();
        assert_eq!(parsed.summary.total_events, Some(3));
        let out = serde_json::to_value(&parsed).unwrap();
        assert_eq!(out["securityInsights"], json!([]));
        assert_eq!(out["recommendations"], json!([]));
        assert!(out.get("aiResponse").is_none());
    }

    #[test]
    fn unique_ips_uses_upper_case_key() {
        let summary = AnalysisSummary {
            unique_ips: Some(4),
            ..AnalysisSummary::default()
        };
        let out = serde_json::to_value(&summary).unwrap();
        assert_eq!(out, json!({"uniqueIPs": 4}));
    }

    #[test]
    fn degraded_truncates_long_text() {
        let raw = "é".repeat(RAW_RESPONSE_LIMIT + 5);
        let result = AnalysisResult::degraded(7, &raw);
        let echoed = result.ai_response.unwrap();
        assert!(echoed.ends_with("..."));
        assert_eq!(echoed.chars().count(), RAW_RESPONSE_LIMIT + 3);
        assert_eq!(result.summary.total_events, Some(7));
    }

    #[test]
    fn degraded_keeps_short_text_verbatim() {
        let raw = "x".repeat(RAW_RESPONSE_LIMIT);
        let result = AnalysisResult::degraded(1, &raw);
        assert_eq!(result.ai_response.as_deref(), Some(raw.as_str()));
    }
}
