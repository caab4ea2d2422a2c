// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The alert decision: a pure function of the classification and the policy.

use chrono::{DateTime, Utc};

use scamguard_config::model::PolicyConfig;
use scamguard_core::ClassifierError;
use scamguard_core::types::{
    AlertDecision, ClassificationResult, DecisionReason, FailureMode, MessageEvent, RiskCategory,
};

#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    /// Scores at or above this alert.
    pub threshold: f64,
    pub alert_categories: Vec<RiskCategory>,
    pub failure_mode: FailureMode,
    /// Operator switch that forces every decision either way.
    pub manual_override: Option<bool>,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for AlertPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            threshold: config.threshold,
            alert_categories: config.alert_categories.clone(),
            failure_mode: config.failure_mode,
            manual_override: config.manual_override,
        }
    }
}

pub fn decide(
    event: &MessageEvent,
    outcome: Result<&ClassificationResult, &ClassifierError>,
    policy: &AlertPolicy,
    now: DateTime<Utc>,
) -> AlertDecision {
    let classification = outcome.ok();
    let (should_alert, reason) = match (policy.manual_override, outcome) {
        (Some(forced), _) => (forced, DecisionReason::ManualOverride),
        (None, Ok(c)) if c.risk_score >= policy.threshold => {
            (true, DecisionReason::ThresholdExceeded)
        }
        (None, Ok(c)) if policy.alert_categories.contains(&c.risk_category) => {
            (true, DecisionReason::CategoryMatched)
        }
        (None, Ok(_)) => (false, DecisionReason::BelowThreshold),
        (None, Err(_)) => match policy.failure_mode {
            FailureMode::FailClosed => (false, DecisionReason::ClassifierUnavailableFailClosed),
            FailureMode::FailOpen => (true, DecisionReason::ClassifierUnavailableFailOpen),
        },
    };

    AlertDecision {
        event_id: event.event_id.clone(),
        device_id: event.device_id.clone(),
        fingerprint: event.fingerprint.clone(),
        should_alert,
        reason,
        risk_score: classification.map(|c| c.risk_score),
        risk_category: classification.map(|c| c.risk_category),
        decided_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event() -> MessageEvent {
        MessageEvent::new("evt-1", "dev-1", "user-1", "hello", Utc::now())
    }

    fn classified(score: f64, category: RiskCategory) -> ClassificationResult {
        ClassificationResult {
            event_id: "evt-1".into(),
            risk_score: score,
            risk_category: category,
            model_version: "m".into(),
            detected_patterns: vec![],
            explanation: None,
            recommended_action: None,
            latency_ms: 12,
            produced_at: Utc::now(),
        }
    }

    fn timeout() -> ClassifierError {
        ClassifierError::Timeout {
            duration: Duration::from_secs(3),
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        let policy = AlertPolicy::default();
        let at = classified(0.75, RiskCategory::Suspicious);
        let below = classified(0.75 - f64::EPSILON, RiskCategory::Suspicious);

        let d = decide(&event(), Ok(&at), &policy, Utc::now());
        assert!(d.should_alert);
        assert_eq!(d.reason, DecisionReason::ThresholdExceeded);
        assert_eq!(d.risk_score, Some(0.75));

        let d = decide(&event(), Ok(&below), &policy, Utc::now());
        assert!(!d.should_alert);
        assert_eq!(d.reason, DecisionReason::BelowThreshold);
    }

    #[test]
    fn alert_category_matches_below_threshold() {
        let d = decide(
            &event(),
            Ok(&classified(0.4, RiskCategory::Fraud)),
            &AlertPolicy::default(),
            Utc::now(),
        );
        assert!(d.should_alert);
        assert_eq!(d.reason, DecisionReason::CategoryMatched);
        assert_eq!(d.risk_category, Some(RiskCategory::Fraud));
    }

    #[test]
    fn failures_follow_failure_mode() {
        let closed = decide(&event(), Err(&timeout()), &AlertPolicy::default(), Utc::now());
        assert!(!closed.should_alert);
        assert_eq!(closed.reason, DecisionReason::ClassifierUnavailableFailClosed);
        assert_eq!(closed.risk_score, None);

        let policy = AlertPolicy {
            failure_mode: FailureMode::FailOpen,
            ..AlertPolicy::default()
        };
        let open = decide(&event(), Err(&timeout()), &policy, Utc::now());
        assert!(open.should_alert);
        assert_eq!(open.reason, DecisionReason::ClassifierUnavailableFailOpen);
        assert_eq!(open.risk_category, None);
    }

    #[test]
    fn manual_override_wins_both_ways() {
        let silence = AlertPolicy {
            manual_override: Some(false),
            ..AlertPolicy::default()
        };
        let d = decide(
            &event(),
            Ok(&classified(0.99, RiskCategory::Fraud)),
            &silence,
            Utc::now(),
        );
        assert!(!d.should_alert);
        assert_eq!(d.reason, DecisionReason::ManualOverride);
        assert_eq!(d.risk_score, Some(0.99));

        let force = AlertPolicy {
            manual_override: Some(true),
            ..AlertPolicy::default()
        };
        let d = decide(&event(), Err(&timeout()), &force, Utc::now());
        assert!(d.should_alert);
        assert_eq!(d.reason, DecisionReason::ManualOverride);
    }

    #[test]
    fn decision_copies_event_identity() {
        let event = event();
        let now = Utc::now();
        let d = decide(
            &event,
            Ok(&classified(0.1, RiskCategory::Benign)),
            &AlertPolicy::default(),
            now,
        );
        assert_eq!(d.event_id, event.event_id);
        assert_eq!(d.device_id, event.device_id);
        assert_eq!(d.fingerprint, event.fingerprint);
        assert_eq!(d.decided_at, now);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn alert_iff_score_reaches_threshold(score in 0.0f64..=1.0, threshold in 0.0f64..=1.0) {
                let policy = AlertPolicy {
                    threshold,
                    alert_categories: vec![],
                    ..AlertPolicy::default()
                };
                let c = classified(score, RiskCategory::Suspicious);
                let d = decide(&event(), Ok(&c), &policy, Utc::now());
                prop_assert_eq!(d.should_alert, score >= threshold);
            }
        }
    }
}
