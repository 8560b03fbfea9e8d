//! Inbound event parsing and the client-facing error taxonomy.
//!
//! The service accepts two payload shapes: the analysis request itself
//! (`{"auditData": [...]}`) or a gateway-style event whose `body` member
//! carries that request, either as JSON text or as an embedded object.

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Please provide audit log data in the request body")]
    MissingInput,
    #[error("{0}")]
    MalformedRequest(String),
    #[error("{0}")]
    Internal(String),
}

/// JSON body of every non-200 response.
#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MissingInput | RequestError::MalformedRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            RequestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        let error = match self {
            RequestError::MissingInput => "No audit data provided",
            RequestError::MalformedRequest(_) => "Invalid JSON format",
            RequestError::Internal(_) => "Internal server error",
        };
        ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
        }
    }
}

/// Parsed inbound event.
#[derive(Debug)]
pub enum Inbound {
    /// Gateway event flagged as a cross-origin pre-flight.
    Preflight,
    Analyze(Vec<Value>),
}

/// Decode raw request bytes into either a pre-flight marker or the audit
/// batch.  An empty body is treated as an empty event.
pub fn parse_inbound(raw: &[u8]) -> Result<Inbound, RequestError> {
    let event: Value = if raw.iter().all(u8::is_ascii_whitespace) {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(raw).map_err(|e| RequestError::MalformedRequest(e.to_string()))?
    };

    if event.get("httpMethod").and_then(Value::as_str) == Some("OPTIONS") {
        return Ok(Inbound::Preflight);
    }

    let payload = unwrap_body(event)?;
    extract_batch(payload).map(Inbound::Analyze)
}

fn unwrap_body(mut event: Value) -> Result<Value, RequestError> {
    let body = event.as_object_mut().and_then(|obj| obj.remove("body"));
    match body {
        Some(Value::String(text)) => serde_json::from_str(&text)
            .map_err(|e| RequestError::MalformedRequest(e.to_string())),
        Some(Value::Null) | None => Ok(event),
        Some(embedded) => Ok(embedded),
    }
}

fn extract_batch(payload: Value) -> Result<Vec<Value>, RequestError> {
    let Value::Object(mut obj) = payload else {
        return Err(RequestError::MalformedRequest(
            "request payload must be a JSON object".to_string(),
        ));
    };
    match obj.remove("auditData") {
        None | Some(Value::Null) => Err(RequestError::MissingInput),
        Some(Value::Array(items)) if items.is_empty() => Err(RequestError::MissingInput),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(RequestError::MalformedRequest(
            "auditData must be an array of records".to_string(),
        )),
    }
}
