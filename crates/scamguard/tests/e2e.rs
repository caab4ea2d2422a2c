// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests over a real TCP listener.
//!
//! Each test serves the gateway on an ephemeral port in front of a
//! TestHarness pipeline and talks to it with an HTTP client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use scamguard_config::model::ResponseMode;
use scamguard_core::types::{DeliveryStatus, RiskCategory};
use scamguard_core::{AlertStore, ScamguardError};
use scamguard_gateway::server::serve;
use scamguard_gateway::{AuthConfig, GatewayState, HealthState, IngestLimits};
use scamguard_test_utils::{MockClassifier, MockPushProvider, TestHarness};

const TOKEN: &str = "e2e-token";

struct RunningServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ScamguardError>>,
}

impl RunningServer {
    async fn start(harness: &TestHarness, mode: ResponseMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut limits = IngestLimits::from(&harness.config.gateway);
        limits.response_mode = mode;
        let state = GatewayState {
            pipeline: Arc::clone(&harness.pipeline),
            alerts: harness.storage.clone(),
            devices: harness.storage.clone(),
            auth: AuthConfig {
                bearer_token: Some(TOKEN.to_string()),
            },
            limits,
            health: HealthState::new("scamguard-e2e", None),
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(serve(listener, state, cancel.clone()));
        Self { addr, cancel, task }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn stop(self) {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn register_submit_and_audit_over_http() {
    let harness = TestHarness::builder()
        .with_classifier(MockClassifier::scoring(0.91, RiskCategory::Fraud))
        .build()
        .await
        .unwrap();
    let server = RunningServer::start(&harness, ResponseMode::Decision).await;
    let client = reqwest::Client::new();

    let response = client
        .put(server.url("/v1/devices/phone-7/push-token"))
        .bearer_auth(TOKEN)
        .json(&json!({"push_token": "apns-phone-7"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .post(server.url("/v1/events"))
        .bearer_auth(TOKEN)
        .json(&json!({
            "device_id": "phone-7",
            "user_id": "user-7",
            "text": "This is the prosecutor's office. Transfer your savings to the safe account",
            "event_id": "evt-e2e-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["event_id"], "evt-e2e-1");
    assert_eq!(body["status"], "delivered");
    assert_eq!(body["should_alert"], true);

    let alert: Value = client
        .get(server.url("/v1/alerts/evt-e2e-1"))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alert["device_id"], "phone-7");
    assert_eq!(alert["reason"], "threshold_exceeded");

    let sent = harness.push.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].notification.device_token, "apns-phone-7");

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_accepted_events() {
    let harness = TestHarness::builder()
        .with_classifier(
            MockClassifier::scoring(0.88, RiskCategory::Fraud)
                .with_delay(Duration::from_millis(50)),
        )
        .with_push(MockPushProvider::new().with_delay(Duration::from_millis(20)))
        .build()
        .await
        .unwrap();
    for device in ["a", "b", "c"] {
        harness
            .register_device(device, &format!("apns-{device}"))
            .await
            .unwrap();
    }
    let server = RunningServer::start(&harness, ResponseMode::Accepted).await;
    let client = reqwest::Client::new();

    for device in ["a", "b", "c"] {
        let response = client
            .post(server.url("/v1/events"))
            .bearer_auth(TOKEN)
            .json(&json!({
                "device_id": device,
                "user_id": format!("user-{device}"),
                "text": "your parcel is held, pay the customs fee at this link",
                "event_id": format!("evt-{device}"),
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);
    }

    // Stop right away: accepted work must still finish.
    server.stop().await;
    assert!(harness.pipeline.drain(Duration::from_secs(5)).await);

    let delivered = harness
        .storage
        .list_alerts(Some(DeliveryStatus::Delivered), 10)
        .await
        .unwrap();
    assert_eq!(delivered.len(), 3);
    assert_eq!(harness.push.attempts(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unauthenticated_requests_never_reach_the_pipeline() {
    let harness = TestHarness::builder().build().await.unwrap();
    let server = RunningServer::start(&harness, ResponseMode::Accepted).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/v1/events"))
        .json(&json!({"device_id": "d", "user_id": "u", "text": "hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let health: Value = client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["service"], "scamguard-e2e");
    assert_eq!(health["status"], "ok");

    server.stop().await;
    assert_eq!(harness.classifier.calls(), 0);
}
