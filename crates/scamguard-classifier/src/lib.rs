// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fraud classification for the Scamguard alert pipeline.
//!
//! [`HttpClassifier`] talks to a scoring service and [`OllamaClassifier`] to an
//! Ollama server; [`ClassifierClient`] wraps either with timeouts, retries and
//! a circuit breaker.

pub mod client;
pub mod http;
pub mod ollama;
pub mod prompt;

use std::sync::Arc;

use scamguard_config::model::{ClassifierConfig, ClassifierKind};
use scamguard_core::{ClassifierBackend, ScamguardError};

pub use client::ClassifierClient;
pub use http::HttpClassifier;
pub use ollama::OllamaClassifier;
pub use prompt::DEFAULT_PROMPT;

/// Builds the backend selected by `classifier.backend`.
pub fn backend_from_config(
    config: &ClassifierConfig,
) -> Result<Arc<dyn ClassifierBackend>, ScamguardError> {
    Ok(match config.backend {
        ClassifierKind::Http => Arc::new(HttpClassifier::new(config)?),
        ClassifierKind::Ollama => Arc::new(OllamaClassifier::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_follows_config() {
        let mut config = ClassifierConfig::default();
        assert_eq!(backend_from_config(&config).unwrap().name(), "http-classifier");

        config.backend = ClassifierKind::Ollama;
        assert_eq!(backend_from_config(&config).unwrap().name(), "ollama-classifier");
    }
}
