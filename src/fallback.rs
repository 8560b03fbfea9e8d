//! Deterministic analysis used when the model cannot be reached.

use serde_json::Value;

use crate::analysis::{AnalysisResult, AnalysisSummary, SecurityInsight, Trend};
use crate::util::{first_present, DistinctValues, ACTION_FIELDS, IP_FIELDS, USER_FIELDS};

pub const FALLBACK_NOTE: &str = "Basic analysis - AI model unavailable";

const STANDARD_RECOMMENDATIONS: &[&str] = &[
    "Enable AWS Bedrock model access for AI-powered analysis",
    "Review logs for failed authentication attempts",
    "Monitor for unusual access patterns",
    "Implement real-time alerting for high-risk activities",
];

/// Count distinct users, addresses and actions across the batch.  Each
/// category picks its own candidate key per record.
pub fn fallback_analysis(batch: &[Value]) -> AnalysisResult {
    let mut users = DistinctValues::new();
    let mut ips = DistinctValues::new();
    let mut actions = DistinctValues::new();

    for record in batch {
        if let Some(v) = first_present(record, USER_FIELDS) {
            users.insert(v);
        }
        if let Some(v) = first_present(record, IP_FIELDS) {
            ips.insert(v);
        }
        if let Some(v) = first_present(record, ACTION_FIELDS) {
            actions.insert(v);
        }
    }

    let total = batch.len();
    AnalysisResult {
        summary: AnalysisSummary {
            total_events: Some(total as u64),
            unique_users: Some(users.len() as u64),
            unique_ips: Some(ips.len() as u64),
            unique_actions: Some(actions.len() as u64),
            note: Some(FALLBACK_NOTE.to_string()),
            ..AnalysisSummary::default()
        },
        security_insights: vec![SecurityInsight {
            kind: "data_overview".to_string(),
            severity: "INFO".to_string(),
            description: format!(
                "Processed {} audit events from {} users and {} IP addresses",
                total,
                users.len(),
                ips.len()
            ),
            recommendation: "Enable AI analysis for deeper security insights".to_string(),
        }],
        anomalies: Vec::new(),
        trends: vec![Trend {
            trend: format!("Dataset contains {} different action types", actions.len()),
            significance: "Variety in actions may indicate normal business operations or potential suspicious activity".to_string(),
        }],
        recommendations: STANDARD_RECOMMENDATIONS
            .iter()
            .map(|s| s.to_string())
            .collect(),
        ai_response: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_users_across_candidate_fields() {
        let batch = vec![
            json!({"user": "alice"}),
            json!({"username": "bob"}),
            json!({"user": "alice"}),
        ];
        let result = fallback_analysis(&batch);
        assert_eq!(result.summary.unique_users, Some(2));
        assert_eq!(result.summary.total_events, Some(3));
        assert_eq!(result.summary.unique_ips, Some(0));
    }

    #[test]
    fn first_candidate_wins_per_record() {
        // "user" shadows "actor" on the same record.
        let batch = vec![json!({"user": "alice", "actor": "system"}), json!({"actor": "system"})];
        let result = fallback_analysis(&batch);
        assert_eq!(result.summary.unique_users, Some(2));
    }

    #[test]
    fn categories_are_independent() {
        let batch = vec![
            json!({"userId": 7, "clientIP": "1.2.3.4", "activity": "read"}),
            json!({"actor": "7", "ip": "1.2.3.4", "event": "write"}),
            json!("garbage"),
        ];
        let result = fallback_analysis(&batch);
        assert_eq!(result.summary.unique_users, Some(1));
        assert_eq!(result.summary.unique_ips, Some(1));
        assert_eq!(result.summary.unique_actions, Some(2));
        assert_eq!(result.summary.total_events, Some(3));
    }

    #[test]
    fn emits_fixed_shape() {
        let result = fallback_analysis(&[json!({"action": "login"})]);
        assert_eq!(result.summary.note.as_deref(), Some(FALLBACK_NOTE));
        assert_eq!(result.security_insights.len(), 1);
        assert_eq!(result.security_insights[0].severity, "INFO");
        assert_eq!(
            result.security_insights[0].description,
            "Processed 1 audit events from 0 users and 0 IP addresses"
        );
        assert_eq!(result.trends[0].trend, "Dataset contains 1 different action types");
        assert!(result.anomalies.is_empty());
        assert_eq!(result.recommendations.len(), 4);
    }
}
