// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` assembles the full pipeline over a temp SQLite database with
//! mock classifier, push provider and token issuer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use scamguard_classifier::ClassifierClient;
use scamguard_config::ScamguardConfig;
use scamguard_core::types::MessageEvent;
use scamguard_core::{DeviceDirectory, ScamguardError, StorageAdapter};
use scamguard_pipeline::{AlertPipeline, AlertPolicy, DebounceCache};
use scamguard_push::{ProviderTokenCache, PushDispatcher};
use scamguard_storage::SqliteStorage;

use crate::mock_classifier::MockClassifier;
use crate::mock_push::{CountingTokenIssuer, MockPushProvider};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    classifier: MockClassifier,
    push: MockPushProvider,
    issuer: CountingTokenIssuer,
    config: ScamguardConfig,
    database_path: Option<PathBuf>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = ScamguardConfig::default();
        // Keep real-time retries short.
        config.classifier.timeout_ms = 200;
        config.classifier.backoff_base_ms = 1;
        config.push.backoff_base_ms = 1;
        Self {
            classifier: MockClassifier::new(),
            push: MockPushProvider::new(),
            issuer: CountingTokenIssuer::default(),
            config,
            database_path: None,
        }
    }

    pub fn with_classifier(mut self, classifier: MockClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_push(mut self, push: MockPushProvider) -> Self {
        self.push = push;
        self
    }

    pub fn with_issuer(mut self, issuer: CountingTokenIssuer) -> Self {
        self.issuer = issuer;
        self
    }

    /// Adjust the configuration before anything is built.
    pub fn with_config(mut self, edit: impl FnOnce(&mut ScamguardConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Use an existing database file instead of a fresh temp one.
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ScamguardError> {
        let temp_dir = tempfile::TempDir::new().map_err(ScamguardError::storage)?;
        let database_path = self
            .database_path
            .unwrap_or_else(|| temp_dir.path().join("scamguard.db"));

        let mut config = self.config;
        config.storage.database_path = database_path.to_string_lossy().to_string();

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let classifier = Arc::new(self.classifier);
        let push = Arc::new(self.push);
        let issuer = Arc::new(self.issuer);

        let client = Arc::new(ClassifierClient::new(classifier.clone(), &config.classifier));
        let tokens = Arc::new(ProviderTokenCache::from_config(issuer.clone(), &config.push));
        let dispatcher = Arc::new(PushDispatcher::new(
            push.clone(),
            tokens,
            storage.clone(),
            storage.clone(),
            &config.push,
        ));
        let pipeline = Arc::new(AlertPipeline::new(
            DebounceCache::from_config(&config.debounce),
            client,
            AlertPolicy::from(&config.policy),
            storage.clone(),
            dispatcher,
        ));

        Ok(TestHarness {
            pipeline,
            storage,
            classifier,
            push,
            issuer,
            config,
            database_path,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete pipeline over mocks and a temp database.
pub struct TestHarness {
    pub pipeline: Arc<AlertPipeline>,
    /// SQLite storage (temp DB, removed on drop unless supplied by the caller).
    pub storage: Arc<SqliteStorage>,
    pub classifier: Arc<MockClassifier>,
    pub push: Arc<MockPushProvider>,
    pub issuer: Arc<CountingTokenIssuer>,
    pub config: ScamguardConfig,
    database_path: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Registers a push token so alerts for `device_id` can be delivered.
    pub async fn register_device(
        &self,
        device_id: &str,
        push_token: &str,
    ) -> Result<(), ScamguardError> {
        self.storage.upsert_push_token(device_id, push_token).await
    }

    /// An event with a random id captured now.
    pub fn event(&self, device_id: &str, text: &str) -> MessageEvent {
        MessageEvent::new(
            uuid::Uuid::new_v4().to_string(),
            device_id,
            "user-1",
            text,
            Utc::now(),
        )
    }

    /// Closes the database so another harness can reopen the file.
    pub async fn close(&self) -> Result<(), ScamguardError> {
        self.storage.close().await
    }
}
