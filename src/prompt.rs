//! Instruction template sent to the model.

use crate::digest::Digest;

const PREAMBLE: &str = "You are a cybersecurity analyst specializing in audit log analysis.
Analyze the following audit log data and provide insights:";

const RESPONSE_SCHEMA: &str = r#"Please provide your analysis in the following JSON format:
{
    "summary": {
        "totalEvents": number,
        "timeRange": "start_time to end_time",
        "uniqueUsers": number,
        "uniqueIPs": number
    },
    "securityInsights": [
        {
            "type": "security_finding_type",
            "severity": "HIGH|MEDIUM|LOW",
            "description": "detailed description",
            "recommendation": "what to do about it"
        }
    ],
    "anomalies": [
        {
            "pattern": "description of unusual pattern",
            "risk": "HIGH|MEDIUM|LOW",
            "details": "specific details about the anomaly"
        }
    ],
    "trends": [
        {
            "trend": "trend description",
            "significance": "why this trend matters"
        }
    ],
    "recommendations": [
        "actionable security recommendation 1",
        "actionable security recommendation 2"
    ]
}"#;

const CLOSING: &str = "Focus on identifying security risks, unusual patterns, failed login attempts,
privilege escalations, and suspicious activities.";

/// Render the full prompt for a digest.  Deterministic for a given digest.
pub fn compose_prompt(digest: &Digest) -> String {
    // Digest holds only strings, numbers and JSON values; serialization cannot fail.
    let rendered = serde_json::to_string_pretty(digest).unwrap_or_else(|_| "{}".to_string());
    format!("{PREAMBLE}\n\nAUDIT LOG DATA:\n{rendered}\n\n{RESPONSE_SCHEMA}\n\n{CLOSING}\n")
}
