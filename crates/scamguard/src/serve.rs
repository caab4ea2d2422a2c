// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `scamguard serve` command implementation.
//!
//! Wires SQLite storage, the HTTP classifier, the APNs dispatcher and the
//! alert pipeline behind the ingestion gateway, then runs until SIGINT or
//! SIGTERM and drains in-flight events before exiting.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use scamguard_classifier::{ClassifierClient, backend_from_config};
use scamguard_config::ScamguardConfig;
use scamguard_config::validation::validate_push_credentials;
use scamguard_core::{ScamguardError, StorageAdapter};
use scamguard_gateway::{AuthConfig, GatewayState, HealthState, IngestLimits, start_server};
use scamguard_pipeline::{AlertPipeline, AlertPolicy, DebounceCache};
use scamguard_push::{ApnsProvider, JwtTokenIssuer, ProviderTokenCache, PushDispatcher};
use scamguard_storage::SqliteStorage;

use crate::shutdown;

type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// Runs the `scamguard serve` command.
pub async fn run_serve(config: ScamguardConfig) -> Result<(), ScamguardError> {
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "starting scamguard serve");

    if let Err(missing) = validate_push_credentials(&config) {
        scamguard_config::render_errors(&missing);
        return Err(ScamguardError::Config(
            "push credentials are required to serve".to_string(),
        ));
    }

    let storage = {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Arc::new(storage)
    };

    let prometheus_render = init_metrics(&config)?;

    let backend = backend_from_config(&config.classifier)?;
    info!(
        backend = config.classifier.backend.as_str(),
        endpoint = %config.classifier.endpoint_url,
        model = %config.classifier.model,
        "classifier configured"
    );
    let classifier = Arc::new(ClassifierClient::new(backend, &config.classifier));

    let issuer = Arc::new(JwtTokenIssuer::from_config(&config.push).await?);
    info!(key_id = %issuer.key_id(), "push signing key loaded");
    let tokens = Arc::new(ProviderTokenCache::from_config(issuer, &config.push));
    // Sign once up front so a bad key stops startup instead of the first alert.
    tokens.get().await?;

    let provider = Arc::new(ApnsProvider::new(&config.push)?);
    info!(
        base_url = %provider.base_url(),
        environment = ?config.push.environment,
        "push provider configured"
    );
    let dispatcher = Arc::new(PushDispatcher::new(
        provider,
        tokens,
        storage.clone(),
        storage.clone(),
        &config.push,
    ));

    let pipeline = Arc::new(AlertPipeline::new(
        DebounceCache::from_config(&config.debounce),
        classifier,
        AlertPolicy::from(&config.policy),
        storage.clone(),
        dispatcher,
    ));

    // Alerts left pending by a crash or hard stop.
    pipeline.resume_pending().await?;

    let cancel = shutdown::install_signal_handler();
    let state = GatewayState {
        pipeline: Arc::clone(&pipeline),
        alerts: storage.clone(),
        devices: storage.clone(),
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        limits: IngestLimits::from(&config.gateway),
        health: HealthState::new(config.service.name.clone(), prometheus_render),
    };
    let served = start_server(&config.gateway, state, cancel.clone()).await;
    // A server error leaves nobody to cancel the token.
    cancel.cancel();

    let drain_timeout = Duration::from_secs(config.service.drain_timeout_secs);
    info!(
        in_flight = pipeline.in_flight(),
        timeout_secs = drain_timeout.as_secs(),
        "draining in-flight events"
    );
    if !pipeline.drain(drain_timeout).await {
        warn!(
            remaining = pipeline.in_flight(),
            "drain timed out, unfinished alerts stay pending until next start"
        );
    }

    storage.close().await?;
    served?;

    info!("scamguard serve shutdown complete");
    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics(config: &ScamguardConfig) -> Result<Option<MetricsRender>, ScamguardError> {
    if !config.prometheus.enabled {
        info!("prometheus metrics disabled");
        return Ok(None);
    }
    let adapter = scamguard_prometheus::PrometheusAdapter::new()?;
    Ok(Some(Arc::new(move || adapter.render())))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics(config: &ScamguardConfig) -> Result<Option<MetricsRender>, ScamguardError> {
    if config.prometheus.enabled {
        warn!("prometheus.enabled is set but this build has no prometheus support");
    }
    Ok(None)
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scamguard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
