// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the Scamguard alert pipeline.
//!
//! Installs the metrics-rs Prometheus recorder; the gateway renders it at `/metrics`.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use scamguard_core::{AdapterType, HealthStatus, PluginAdapter, ScamguardError};

pub use recording::{
    record_classification, record_classifier_latency, record_decision, record_delivery,
    record_delivery_attempt, record_event, record_token_refresh, set_breaker_open,
};

/// Prometheus metrics adapter.
///
/// Only one recorder can be installed per process, so build this once at startup.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    pub fn new() -> Result<Self, ScamguardError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            ScamguardError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, ScamguardError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ScamguardError> {
        Ok(())
    }
}
