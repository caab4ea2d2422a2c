// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.
//!
//! Responses never contain submitted text or internal error details. Clients
//! only learn whether an event was accepted and, in `decision` mode, the
//! outcome label.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use scamguard_config::model::ResponseMode;
use scamguard_core::ScamguardError;
use scamguard_core::types::MessageEvent;
use scamguard_resilience::BreakerState;

use crate::server::GatewayState;

/// Request body for POST /v1/events.
///
/// Deliberately not `Debug`: it holds the captured text.
#[derive(Deserialize)]
pub struct EventRequest {
    pub device_id: String,
    pub user_id: String,
    pub text: String,
    /// Capture time on the device. Defaults to receipt time.
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    /// Client-chosen id for safe resubmission. Generated when absent.
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Response body for POST /v1/events.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_alert: Option<bool>,
}

impl EventResponse {
    fn without_decision(event_id: String, status: &str) -> Self {
        Self {
            event_id,
            status: status.to_string(),
            should_alert: None,
        }
    }
}

/// Request body for PUT /v1/devices/{device_id}/push-token.
#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    pub push_token: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the classifier breaker is open.
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_secs: u64,
    pub classifier_breaker: String,
    /// Seconds since the breaker entered its current state.
    pub classifier_breaker_since_secs: u64,
    /// Events and deliveries still being processed.
    pub in_flight: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn internal_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

/// Checks an event body, returning the status and message to reject it with.
fn validate_event(
    body: &EventRequest,
    max_text_chars: usize,
) -> Result<(), (StatusCode, String)> {
    let required = [
        ("device_id", body.device_id.as_str()),
        ("user_id", body.user_id.as_str()),
        ("text", body.text.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err((StatusCode::BAD_REQUEST, format!("{field} must not be empty")));
        }
    }
    if let Some(event_id) = &body.event_id
        && event_id.trim().is_empty()
    {
        return Err((
            StatusCode::BAD_REQUEST,
            "event_id must not be empty when set".to_string(),
        ));
    }
    if body.text.chars().count() > max_text_chars {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("text exceeds {max_text_chars} characters"),
        ));
    }
    Ok(())
}

/// POST /v1/events
///
/// Validates the event and hands it to the pipeline. In `accepted` mode the
/// reply is immediate; in `decision` mode it waits up to the configured
/// timeout and falls back to `pending`. Processing is never cancelled by the
/// client going away. An `event_id` already owned by another device is `409`.
pub async fn post_event(
    State(state): State<GatewayState>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> Response {
    // The rejection text can quote the body, so only the status is passed on.
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            debug!(status = %rejection.status(), "rejected event body");
            return error_response(rejection.status(), "invalid request body");
        }
    };
    if let Err((status, message)) = validate_event(&body, state.limits.max_text_chars) {
        return error_response(status, message);
    }

    // A resubmitted id must come from the device that first used it.
    if let Some(event_id) = &body.event_id {
        match state.alerts.get_alert(event_id).await {
            Ok(Some(existing)) if existing.device_id != body.device_id => {
                warn!(
                    event_id = %event_id,
                    device_id = %body.device_id,
                    "event id owned by another device"
                );
                return conflict();
            }
            Ok(_) => {}
            Err(e) => {
                error!(event_id = %event_id, error = %e, "alert lookup failed");
                return internal_error();
            }
        }
    }

    let event_id = body
        .event_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let event = MessageEvent::new(
        event_id.clone(),
        body.device_id,
        body.user_id,
        body.text,
        body.captured_at.unwrap_or_else(Utc::now),
    );
    debug!(
        event_id = %event.event_id,
        device_id = %event.device_id,
        "event received"
    );

    let handle = state.pipeline.submit(event);
    if state.limits.response_mode == ResponseMode::Accepted {
        return (
            StatusCode::ACCEPTED,
            Json(EventResponse::without_decision(event_id, "accepted")),
        )
            .into_response();
    }

    match tokio::time::timeout(state.limits.decision_timeout, handle).await {
        Ok(Ok(Ok(outcome))) => {
            let response = EventResponse {
                event_id,
                status: outcome.status(),
                should_alert: Some(outcome.should_alert()),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(Ok(Err(ScamguardError::Conflict(_)))) => conflict(),
        // Already logged by the pipeline task.
        Ok(Ok(Err(_))) => pending(event_id),
        Ok(Err(join_error)) => {
            error!(event_id = %event_id, error = %join_error, "event task did not complete");
            pending(event_id)
        }
        Err(_) => {
            debug!(event_id = %event_id, "decision not ready before timeout");
            pending(event_id)
        }
    }
}

fn conflict() -> Response {
    error_response(
        StatusCode::CONFLICT,
        "event_id is already used by another device",
    )
}

fn pending(event_id: String) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(EventResponse::without_decision(event_id, "pending")),
    )
        .into_response()
}

/// PUT /v1/devices/{device_id}/push-token
pub async fn put_push_token(
    State(state): State<GatewayState>,
    Path(device_id): Path<String>,
    payload: Result<Json<PushTokenRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => return error_response(rejection.status(), "invalid request body"),
    };
    let push_token = body.push_token.trim();
    if push_token.is_empty() || push_token.contains(char::is_whitespace) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "push_token must be a non-empty token without whitespace",
        );
    }

    match state.devices.upsert_push_token(&device_id, push_token).await {
        Ok(()) => {
            debug!(device_id = %device_id, "push token registered");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(device_id = %device_id, error = %e, "failed to store push token");
            internal_error()
        }
    }
}

/// GET /v1/alerts/{event_id}
///
/// Audit view of the alert recorded for an event.
pub async fn get_alert(
    State(state): State<GatewayState>,
    Path(event_id): Path<String>,
) -> Response {
    match state.alerts.get_alert(&event_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "alert not found"),
        Err(e) => {
            error!(event_id = %event_id, error = %e, "alert lookup failed");
            internal_error()
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let classifier = state.pipeline.classifier();
    let breaker = classifier.breaker_state();
    let status = if breaker == BreakerState::Open {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status: status.to_string(),
        service: state.health.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        classifier_breaker: breaker.to_string(),
        classifier_breaker_since_secs: classifier.breaker_state_age().as_secs(),
        in_flight: state.pipeline.in_flight(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => {
            warn!("metrics requested but prometheus is disabled");
            error_response(StatusCode::NOT_FOUND, "metrics disabled")
        }
    }
}
