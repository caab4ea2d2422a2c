// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifier backend trait for fraud-scoring models.

use async_trait::async_trait;

use crate::error::ClassifierError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{InferenceResponse, MessageEvent};

/// A model endpoint that scores one message per call.
///
/// Implementations perform exactly one inference request and map transport
/// failures onto [`ClassifierError`]. Timeouts, retries and the circuit
/// breaker live in the client that wraps the backend, not here.
#[async_trait]
pub trait ClassifierBackend: PluginAdapter {
    /// Sends a single inference request for the event's text.
    async fn infer(&self, event: &MessageEvent) -> Result<InferenceResponse, ClassifierError>;
}
