// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Scamguard integration tests.
//!
//! Provides mock adapters and a test harness for fast, deterministic tests
//! without a model endpoint or push provider.
//!
//! # Components
//!
//! - [`MockClassifier`] - scripted classifier backend that counts calls
//! - [`MockPushProvider`] - push provider that records accepted notifications
//! - [`CountingTokenIssuer`] - provider token issuer that counts refreshes
//! - [`TestHarness`] - full pipeline over a temp SQLite database

pub mod harness;
pub mod mock_classifier;
pub mod mock_push;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_classifier::{MockClassifier, MockInference};
pub use mock_push::{CountingTokenIssuer, MockPushProvider, SentPush};
