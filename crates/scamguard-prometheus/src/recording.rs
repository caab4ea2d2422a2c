// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "scamguard_events_total",
        "Ingested events by debounce outcome"
    );
    describe_counter!(
        "scamguard_classifications_total",
        "Classification attempts by final outcome"
    );
    describe_histogram!(
        "scamguard_classifier_latency_seconds",
        "Latency of successful classifications"
    );
    describe_gauge!(
        "scamguard_classifier_breaker_open",
        "1 while the classifier circuit breaker rejects calls"
    );
    describe_counter!("scamguard_decisions_total", "Alert decisions by reason");
    describe_counter!(
        "scamguard_deliveries_total",
        "Alert deliveries by final status"
    );
    describe_counter!(
        "scamguard_delivery_attempts_total",
        "Push attempts by result"
    );
    describe_counter!(
        "scamguard_token_refreshes_total",
        "Provider token refreshes by result"
    );
}

/// Debounce outcome for one ingested event (`admitted`, `duplicate`, `rate_limited`).
pub fn record_event(outcome: &'static str) {
    metrics::counter!("scamguard_events_total", "outcome" => outcome).increment(1);
}

/// Final classification outcome (`success`, `timeout`, `model_error`, `unavailable`).
pub fn record_classification(outcome: &'static str) {
    metrics::counter!("scamguard_classifications_total", "outcome" => outcome).increment(1);
}

pub fn record_classifier_latency(seconds: f64) {
    metrics::histogram!("scamguard_classifier_latency_seconds").record(seconds);
}

pub fn set_breaker_open(open: bool) {
    metrics::gauge!("scamguard_classifier_breaker_open").set(if open { 1.0 } else { 0.0 });
}

pub fn record_decision(reason: String) {
    metrics::counter!("scamguard_decisions_total", "reason" => reason).increment(1);
}

/// Terminal delivery status of an alert.
pub fn record_delivery(status: String) {
    metrics::counter!("scamguard_deliveries_total", "status" => status).increment(1);
}

/// One push attempt, labelled `ok` or with the error kind.
pub fn record_delivery_attempt(result: &'static str) {
    metrics::counter!("scamguard_delivery_attempts_total", "result" => result).increment(1);
}

pub fn record_token_refresh(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("scamguard_token_refreshes_total", "result" => result).increment(1);
}
