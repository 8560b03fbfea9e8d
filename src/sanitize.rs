//! Cleanup and decoding of the model's text answer.
//!
//! Models frequently wrap JSON in markdown code fences even when asked not
//! to.  `strip_fences` removes that wrapping and `decode_analysis` turns the
//! remainder into an [`AnalysisResult`].

use thiserror::Error;

use crate::analysis::AnalysisResult;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// The model answered, but not with a decodable analysis.
#[derive(Debug, Error)]
#[error("model output is not a valid analysis: {reason}")]
pub struct DecodeFailure {
    /// The untouched model text.
    pub raw: String,
    pub reason: String,
}

/// Remove a surrounding markdown code fence, if any.
///
/// A leading ```` ```json ```` opener is cut together with a trailing fence.
/// Any other leading fence drops the whole first line (it may carry a
/// language tag) and the last line when that line is only a fence.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix(JSON_FENCE) {
        return rest.strip_suffix(FENCE).unwrap_or(rest).trim();
    }
    if !trimmed.starts_with(FENCE) {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => "",
    };
    let body = match body.rfind('\n') {
        Some(idx) if body[idx + 1..].trim() == FENCE => &body[..idx],
        None if body.trim() == FENCE => "",
        _ => body,
    };
    body.trim()
}

/// Decode model text into an analysis, tolerating a fenced wrapper.
pub fn decode_analysis(raw: &str) -> Result<AnalysisResult, DecodeFailure> {
    let cleaned = strip_fences(raw);
    serde_json::from_str::<AnalysisResult>(cleaned).map_err(|err| DecodeFailure {
        raw: raw.to_string(),
        reason: err.to_string(),
    })
}
