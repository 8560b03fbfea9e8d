#![allow(dead_code)]

use auditscope::inference::{InferenceClient, InferenceError};
use auditscope::{app, build_state, AppConfig, AppState, InferenceSettings};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// What the stub model does when asked to generate.
#[derive(Clone)]
pub enum StubReply {
    Text(String),
    Fail,
    Panic,
}

pub struct StubClient {
    pub reply: StubReply,
}

#[async_trait::async_trait]
impl InferenceClient for StubClient {
    fn model_id(&self) -> &str {
        "stub-model"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, InferenceError> {
        match &self.reply {
            StubReply::Text(text) => Ok(text.clone()),
            StubReply::Fail => Err(InferenceError::MissingContent),
            StubReply::Panic => panic!("stub model exploded"),
        }
    }
}

pub fn stub_state(reply: StubReply) -> AppState {
    AppState::with_client(Arc::new(StubClient { reply }), &AppConfig::default())
}

/// One request observed by the mock Bedrock endpoint.
#[derive(Clone, Debug)]
pub struct SeenRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockBedrock {
    status: StatusCode,
    body: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

async fn invoke(
    State(mock): State<MockBedrock>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    mock.seen.lock().unwrap().push(SeenRequest {
        path: uri.path().to_string(),
        authorization,
        body,
    });
    (mock.status, mock.body.clone())
}

/// Spin up a stand-in for the Bedrock runtime that answers every request
/// with the given status and body.
pub async fn spawn_mock_bedrock(
    status: u16,
    body: String,
) -> (String, Arc<Mutex<Vec<SeenRequest>>>, JoinHandle<()>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mock = MockBedrock {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        seen: seen.clone(),
    };
    let router = Router::new().fallback(invoke).with_state(mock);
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), seen, handle)
}

/// Nova response envelope wrapping the given completion text.
pub fn nova_reply(text: &str) -> String {
    json!({
        "output": {
            "message": {
                "role": "assistant",
                "content": [ { "text": text } ]
            }
        },
        "stopReason": "end_turn"
    })
    .to_string()
}

/// A URL on which nothing is listening.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn config_for(endpoint: &str) -> AppConfig {
    AppConfig {
        inference: InferenceSettings {
            endpoint: Some(endpoint.to_string()),
            bearer_token: Some("test-key".to_string()),
            ..InferenceSettings::default()
        },
        ..AppConfig::default()
    }
}

/// Serve the application against the given inference endpoint.
pub async fn spawn_app(endpoint: &str) -> (String, AppState, JoinHandle<()>) {
    let state = build_state(&config_for(endpoint)).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state.clone());
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), state, handle)
}

pub fn audit_records(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| {
            json!({
                "timestamp": format!("2024-05-01T10:{:02}:00Z", i),
                "user": format!("user{}", i % 4),
                "action": if i % 3 == 0 { "login_failed" } else { "read" },
                "source_ip": format!("10.0.0.{}", i % 5),
            })
        })
        .collect()
}
