#[path = "common/mod.rs"]
mod common;

use auditscope::fallback::fallback_analysis;
use auditscope::inference::{BedrockClient, InferenceClient, InferenceError};
use auditscope::InferenceSettings;
use common::{audit_records, dead_endpoint, nova_reply, spawn_app, spawn_mock_bedrock};
use reqwest::Client;
use serde_json::{json, Value};

async fn analyze(app_url: &str, records: &[Value]) -> (u16, Value) {
    let resp = Client::new()
        .post(format!("{}/analyze", app_url))
        .json(&json!({ "auditData": records }))
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn fenced_model_answer_flows_through() {
    let answer = "```json\n{\"summary\":{\"totalEvents\":4,\"uniqueUsers\":4},\"recommendations\":[\"Rotate credentials\"]}\n```";
    let (bedrock, seen, _mock) = spawn_mock_bedrock(200, nova_reply(answer)).await;
    let (app_url, _state, _app) = spawn_app(&bedrock).await;

    let (status, v) = analyze(&app_url, &audit_records(4)).await;
    assert_eq!(status, 200);
    assert_eq!(v["analysis"]["summary"]["totalEvents"], json!(4));
    assert_eq!(v["analysis"]["recommendations"], json!(["Rotate credentials"]));
    assert!(v["analysis"].get("aiResponse").is_none());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "exactly one inference attempt");
    assert_eq!(seen[0].path, "/model/amazon.nova-lite-v1:0/invoke");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer test-key"));
    let sent = &seen[0].body;
    assert_eq!(sent["inferenceConfig"]["max_new_tokens"], json!(4000));
    let prompt = sent["messages"][0]["content"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("AUDIT LOG DATA:"));
    assert!(prompt.contains("login_failed"));
}

#[tokio::test]
async fn prose_answer_degrades() {
    let (bedrock, _seen, _mock) =
        spawn_mock_bedrock(200, nova_reply("I found nothing of note.")).await;
    let (app_url, _state, _app) = spawn_app(&bedrock).await;

    let (status, v) = analyze(&app_url, &audit_records(3)).await;
    assert_eq!(status, 200);
    assert_eq!(v["analysis"]["aiResponse"], "I found nothing of note.");
    assert_eq!(
        v["analysis"]["summary"]["analysisNote"],
        "AI response received but JSON parsing failed"
    );
}

#[tokio::test]
async fn network_failure_falls_back() {
    let records = audit_records(10);
    let (app_url, _state, _app) = spawn_app(&dead_endpoint().await).await;

    let (status, v) = analyze(&app_url, &records).await;
    assert_eq!(status, 200);
    assert_eq!(v["processedEntries"], json!(10));
    let summary = &v["analysis"]["summary"];
    assert!(summary["note"].as_str().unwrap().starts_with("Basic analysis"));

    let direct = fallback_analysis(&records);
    assert_eq!(summary["uniqueUsers"], json!(direct.summary.unique_users));
    assert_eq!(summary["uniqueIPs"], json!(direct.summary.unique_ips));
    assert_eq!(summary["uniqueUsers"], json!(4));
    assert_eq!(summary["uniqueIPs"], json!(5));
}

#[tokio::test]
async fn error_status_falls_back() {
    let (bedrock, seen, _mock) = spawn_mock_bedrock(
        403,
        json!({"message": "not authorized"}).to_string(),
    )
    .await;
    let (app_url, _state, _app) = spawn_app(&bedrock).await;

    let (status, v) = analyze(&app_url, &audit_records(2)).await;
    assert_eq!(status, 200);
    assert_eq!(
        v["analysis"]["summary"]["note"],
        "Basic analysis - AI model unavailable"
    );
    assert_eq!(seen.lock().unwrap().len(), 1, "no retry after failure");
}

#[tokio::test]
async fn unexpected_envelope_falls_back() {
    let (bedrock, _seen, _mock) =
        spawn_mock_bedrock(200, json!({"result": "ok"}).to_string()).await;
    let (app_url, _state, _app) = spawn_app(&bedrock).await;

    let (status, v) = analyze(&app_url, &audit_records(2)).await;
    assert_eq!(status, 200);
    assert!(v["analysis"]["summary"]["note"].is_string());
}

#[tokio::test]
async fn client_reports_each_failure_kind() {
    let settings = |endpoint: String| InferenceSettings {
        endpoint: Some(endpoint),
        ..InferenceSettings::default()
    };

    let client = BedrockClient::new(&settings(dead_endpoint().await)).unwrap();
    assert!(matches!(
        client.generate("p").await,
        Err(InferenceError::Network(_))
    ));

    let (url, _seen, _h) = spawn_mock_bedrock(500, "boom".to_string()).await;
    let client = BedrockClient::new(&settings(url)).unwrap();
    match client.generate("p").await {
        Err(InferenceError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {:?}", other),
    }

    let (url, _seen, _h) = spawn_mock_bedrock(200, "<html>".to_string()).await;
    let client = BedrockClient::new(&settings(url)).unwrap();
    assert!(matches!(
        client.generate("p").await,
        Err(InferenceError::Envelope(_))
    ));

    let (url, _seen, _h) = spawn_mock_bedrock(200, nova_reply("hello")).await;
    let client = BedrockClient::new(&settings(url)).unwrap();
    assert_eq!(client.generate("p").await.unwrap(), "hello");
}
