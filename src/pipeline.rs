//! Digest → prompt → model → decode, with fallback substitution.
//!
//! Every failure past request validation is absorbed here: the caller always
//! receives an [`AnalysisResult`] plus the path that produced it.

use serde_json::Value;
use std::time::Instant;

use crate::analysis::AnalysisResult;
use crate::digest::build_digest;
use crate::fallback::fallback_analysis;
use crate::inference::InferenceClient;
use crate::prompt::compose_prompt;
use crate::sanitize::decode_analysis;

/// Which path produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisSource {
    /// The model answered with a decodable analysis.
    Model,
    /// The model answered, but with undecodable text.
    Degraded,
    /// The model call failed; deterministic analysis used.
    Fallback,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisSource::Model => "model",
            AnalysisSource::Degraded => "degraded",
            AnalysisSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub source: AnalysisSource,
    /// Wall time spent in the model call.
    pub inference_ms: u64,
}

/// Run the full analysis for a non-empty batch.
pub async fn analyze(
    client: &dyn InferenceClient,
    batch: &[Value],
    inference_warn_ms: u64,
) -> Analysis {
    let digest = build_digest(batch);
    let prompt = compose_prompt(&digest);
    tracing::debug!(
        model_id = %client.model_id(),
        prompt_chars = prompt.len(),
        fields = digest.field_analysis.fields.len(),
        "invoking model"
    );

    let start = Instant::now();
    let outcome = client.generate(&prompt).await;
    let inference_ms = start.elapsed().as_millis() as u64;
    if inference_ms > inference_warn_ms {
        tracing::warn!(
            model_id = %client.model_id(),
            elapsed_ms = inference_ms,
            warn_ms = inference_warn_ms,
            "inference call exceeded warn threshold"
        );
    }

    let (result, source) = match outcome {
        Err(err) => {
            tracing::error!(model_id = %client.model_id(), error = %err, "inference failed, using fallback analysis");
            (fallback_analysis(batch), AnalysisSource::Fallback)
        }
        Ok(text) => match decode_analysis(&text) {
            Ok(result) => (result, AnalysisSource::Model),
            Err(failure) => {
                let preview: String = failure.raw.chars().take(500).collect();
                tracing::warn!(error = %failure.reason, preview = %preview, "model output could not be decoded");
                (
                    AnalysisResult::degraded(batch.len(), &failure.raw),
                    AnalysisSource::Degraded,
                )
            }
        },
    };

    Analysis {
        result,
        source,
        inference_ms,
    }
}
