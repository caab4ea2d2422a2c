// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the ingestion endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use scamguard_config::model::{GatewayConfig, ResponseMode};
use scamguard_core::{AlertStore, DeviceDirectory, ScamguardError};
use scamguard_pipeline::AlertPipeline;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Room for JSON framing and the other fields around `text`.
const BODY_OVERHEAD_BYTES: usize = 16 * 1024;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Instance name reported by `/health`.
    pub service_name: String,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl HealthState {
    pub fn new(
        service_name: impl Into<String>,
        prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            start_time: std::time::Instant::now(),
            prometheus_render,
        }
    }
}

/// Request limits and response behaviour for `POST /v1/events`.
#[derive(Debug, Clone)]
pub struct IngestLimits {
    pub response_mode: ResponseMode,
    pub max_text_chars: usize,
    /// How long `decision` mode waits for the pipeline.
    pub decision_timeout: Duration,
}

impl IngestLimits {
    /// Largest request body accepted, sized for the worst-case JSON escaping of `text`.
    pub fn body_limit(&self) -> usize {
        self.max_text_chars
            .saturating_mul(6)
            .saturating_add(BODY_OVERHEAD_BYTES)
    }
}

impl From<&GatewayConfig> for IngestLimits {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            response_mode: config.response_mode,
            max_text_chars: config.max_text_chars,
            decision_timeout: Duration::from_millis(config.decision_timeout_ms),
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub pipeline: Arc<AlertPipeline>,
    /// Alert audit lookups.
    pub alerts: Arc<dyn AlertStore>,
    /// Push token registration.
    pub devices: Arc<dyn DeviceDirectory>,
    pub auth: AuthConfig,
    pub limits: IngestLimits,
    pub health: HealthState,
}

/// Builds the router.
///
/// Routes:
/// - GET /health (no auth)
/// - GET /metrics (no auth)
/// - POST /v1/events
/// - PUT /v1/devices/{device_id}/push-token
/// - GET /v1/alerts/{event_id}
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();
    let body_limit = state.limits.body_limit();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics));

    let api_routes = Router::new()
        .route("/v1/events", post(handlers::post_event))
        .route(
            "/v1/devices/{device_id}/push-token",
            put(handlers::put_push_token),
        )
        .route("/v1/alerts/{event_id}", get(handlers::get_alert))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ));

    public_routes
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Binds the configured address and serves until `shutdown` is cancelled.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ScamguardError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ScamguardError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(
        %addr,
        response_mode = config.response_mode.as_str(),
        "gateway listening"
    );
    serve(listener, state, shutdown).await
}

/// Serves on an already bound listener.
///
/// Once `shutdown` fires no new connections are accepted and in-flight
/// requests are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ScamguardError> {
    if state.auth.bearer_token.is_none() {
        tracing::warn!("gateway.bearer_token is not set, every /v1 request will be rejected");
    }
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ScamguardError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped accepting requests");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_follow_gateway_config() {
        let config = GatewayConfig {
            response_mode: ResponseMode::Decision,
            max_text_chars: 100,
            decision_timeout_ms: 250,
            ..GatewayConfig::default()
        };
        let limits = IngestLimits::from(&config);
        assert_eq!(limits.response_mode, ResponseMode::Decision);
        assert_eq!(limits.decision_timeout, Duration::from_millis(250));
        assert_eq!(limits.body_limit(), 600 + BODY_OVERHEAD_BYTES);
    }

    #[test]
    fn body_limit_saturates() {
        let limits = IngestLimits {
            response_mode: ResponseMode::Accepted,
            max_text_chars: usize::MAX,
            decision_timeout: Duration::ZERO,
        };
        assert_eq!(limits.body_limit(), usize::MAX);
    }
}
