//! Client for the hosted text-generation model.
//!
//! The handler only needs "prompt in, text out".  `InferenceClient` is that
//! seam; `BedrockClient` implements it against the Bedrock runtime `invoke`
//! API using the Nova message format.  One request per call, no retries.

use serde_json::{json, Value};
use thiserror::Error;

use crate::config::InferenceSettings;

pub const MAX_NEW_TOKENS: u32 = 4000;
pub const TEMPERATURE: f64 = 0.1;
pub const TOP_P: f64 = 0.9;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("network error calling inference endpoint: {0}")]
    Network(#[from] reqwest::Error),
    #[error("inference endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("inference response is not valid JSON: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("unexpected response format from model: missing output.message.content[0].text")]
    MissingContent,
}

/// Anything that can turn a prompt into completion text.
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError>;
}

pub struct BedrockClient {
    model_id: String,
    invoke_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl BedrockClient {
    pub fn new(settings: &InferenceSettings) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder().build()?;
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", settings.region));
        let invoke_url = format!(
            "{}/model/{}/invoke",
            base.trim_end_matches('/'),
            settings.model_id
        );
        Ok(Self {
            model_id: settings.model_id.clone(),
            invoke_url,
            bearer_token: settings.bearer_token.clone(),
            client,
        })
    }

    pub fn invoke_url(&self) -> &str {
        &self.invoke_url
    }
}

/// Request body in the Nova messages format.
pub fn render_request(prompt: &str) -> Value {
    json!({
        "messages": [
            {
                "role": "user",
                "content": [ { "text": prompt } ]
            }
        ],
        "inferenceConfig": {
            "max_new_tokens": MAX_NEW_TOKENS,
            "temperature": TEMPERATURE,
            "top_p": TOP_P
        }
    })
}

/// Pull the generated text out of a Nova response envelope.
pub fn extract_text(envelope: &Value) -> Result<String, InferenceError> {
    envelope
        .pointer("/output/message/content/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(InferenceError::MissingContent)
}

#[async_trait::async_trait]
impl InferenceClient for BedrockClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let mut rb = self
            .client
            .post(&self.invoke_url)
            .header("content-type", "application/json")
            .header("accept", "application/json");
        if let Some(tok) = &self.bearer_token {
            rb = rb.bearer_auth(tok);
        }
        let resp = rb.json(&render_request(prompt)).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            tracing::debug!(model_id = %self.model_id, status = status.as_u16(), "inference endpoint rejected request");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let envelope: Value = serde_json::from_str(&text)?;
        extract_text(&envelope)
    }
}
