// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert notification content.
//!
//! Title and body come from fixed copy keyed by risk category. The message
//! text never reaches the payload.

use serde_json::{Value, json};

use scamguard_core::types::{AlertRecord, PushNotification, RiskCategory};

/// Notification category registered by the app for alert actions.
pub const ALERT_CATEGORY: &str = "FRAUD_ALERT";

fn alert_copy(category: Option<RiskCategory>) -> (&'static str, &'static str) {
    match category {
        Some(RiskCategory::Fraud) => (
            "Possible scam detected",
            "The message you are writing matches known fraud patterns. Stop and verify before sending money or personal details.",
        ),
        Some(RiskCategory::Suspicious) => (
            "Suspicious message",
            "This message shows signs of a scam. Check who you are talking to before you act on it.",
        ),
        Some(RiskCategory::Benign) | None => (
            "Check this message",
            "We could not confirm this message is safe. Be careful before sending money or personal details.",
        ),
    }
}

/// Addresses the alert for `record` to `device_token`.
pub fn notification_for(record: &AlertRecord, device_token: impl Into<String>) -> PushNotification {
    let (title, body) = alert_copy(record.risk_category);
    PushNotification {
        alert_id: record.alert_id.clone(),
        event_id: record.event_id.clone(),
        device_token: device_token.into(),
        title: title.to_string(),
        body: body.to_string(),
        category: record.risk_category,
    }
}

/// APNs JSON body for a notification.
pub fn apns_payload(notification: &PushNotification) -> Value {
    json!({
        "aps": {
            "alert": {
                "title": notification.title,
                "body": notification.body,
            },
            "badge": 1,
            "sound": "default",
            "category": ALERT_CATEGORY,
        },
        "alert_id": notification.alert_id,
        "event_id": notification.event_id,
        "risk_category": notification.category.map(|c| c.to_string()),
    })
}
