use std::env;

use anyhow::{anyhow, Result};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MODEL_ID: &str = "amazon.nova-lite-v1:0";

/// Where and how to reach the model.
#[derive(Debug, Clone)]
pub struct InferenceSettings {
    pub region: String,
    pub model_id: String,
    /// Base URL override; defaults to the regional Bedrock runtime host.
    pub endpoint: Option<String>,
    /// Bedrock API key, sent as a bearer token when present.
    pub bearer_token: Option<String>,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            endpoint: None,
            bearer_token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub inference: InferenceSettings,
    pub max_request_bytes: Option<usize>,
    pub inference_warn_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inference: InferenceSettings::default(),
            max_request_bytes: None,
            inference_warn_ms: 10_000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = AppConfig::default();
        let inference = InferenceSettings {
            region: parse_string_env("AUDITSCOPE_REGION").unwrap_or(defaults.inference.region),
            model_id: parse_string_env("AUDITSCOPE_MODEL_ID")
                .unwrap_or(defaults.inference.model_id),
            endpoint: parse_string_env("AUDITSCOPE_ENDPOINT"),
            bearer_token: parse_string_env("AWS_BEARER_TOKEN_BEDROCK"),
        };
        let max_request_bytes =
            parse_optional_u64("AUDITSCOPE_MAX_REQUEST_BYTES")?.map(|v| v as usize);
        let inference_warn_ms = parse_optional_u64("AUDITSCOPE_INFERENCE_WARN_MS")?
            .unwrap_or(defaults.inference_warn_ms);

        Ok(Self {
            inference,
            max_request_bytes,
            inference_warn_ms,
        })
    }
}

fn parse_string_env(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
