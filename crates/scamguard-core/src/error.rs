// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Scamguard alert pipeline.
//!
//! [`ScamguardError`] is the workspace-wide error. Component failures that the
//! pipeline has to reason about (retry or not, fail open or closed) keep their
//! own enums so callers can match on them without string inspection.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across adapter traits and pipeline operations.
#[derive(Debug, Error)]
pub enum ScamguardError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Classification failed after the client exhausted its retries.
    #[error("classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Push delivery failed.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Rejected input (empty ids, oversized text).
    #[error("validation error: {0}")]
    Validation(String),

    /// The event id is already bound to a different device.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScamguardError {
    /// Wraps any error as a storage failure.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage {
            source: Box::new(err),
        }
    }
}

/// Failures surfaced by the classifier client and its backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    /// A single inference attempt exceeded its deadline.
    #[error("classifier timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The model answered, but the answer was unusable.
    #[error("malformed classifier response: {0}")]
    ModelError(String),

    /// The backend could not be reached, or the circuit breaker is open.
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

impl ClassifierError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Malformed responses are deterministic for a given input and are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unavailable(_))
    }
}

/// Failures surfaced by push providers and the token cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// The provider rejected the signed credential as expired.
    #[error("provider token expired")]
    TokenExpired,

    /// The device push token is invalid or no longer registered.
    #[error("device unregistered: {reason}")]
    DeviceUnregistered { reason: String },

    /// The provider refused the notification.
    #[error("provider rejected notification ({status}): {reason}")]
    ProviderRejected {
        status: u16,
        reason: String,
        permanent: bool,
    },

    /// Transport failure talking to the provider.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The provider credential could not be produced (bad key, signing failure).
    #[error("credential error: {0}")]
    Credential(String),

    /// The record had no attempts left when delivery resumed.
    #[error("delivery attempts exhausted after {attempts}")]
    AttemptsExhausted { attempts: u32 },
}

impl DispatchError {
    /// Whether the dispatcher should spend another attempt on this alert.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TokenExpired | Self::NetworkError(_) => true,
            Self::ProviderRejected { permanent, .. } => !permanent,
            Self::DeviceUnregistered { .. }
            | Self::Credential(_)
            | Self::AttemptsExhausted { .. } => false,
        }
    }

    /// Short machine-readable label used for metrics and stored `last_error`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenExpired => "token_expired",
            Self::DeviceUnregistered { .. } => "device_unregistered",
            Self::ProviderRejected { .. } => "provider_rejected",
            Self::NetworkError(_) => "network_error",
            Self::Credential(_) => "credential",
            Self::AttemptsExhausted { .. } => "attempts_exhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_transience() {
        assert!(ClassifierError::Timeout {
            duration: Duration::from_secs(3)
        }
        .is_transient());
        assert!(ClassifierError::Unavailable("down".into()).is_transient());
        assert!(!ClassifierError::ModelError("bad json".into()).is_transient());
    }

    #[test]
    fn dispatch_transience() {
        assert!(DispatchError::TokenExpired.is_transient());
        assert!(DispatchError::NetworkError("reset".into()).is_transient());
        assert!(DispatchError::ProviderRejected {
            status: 503,
            reason: "ServiceUnavailable".into(),
            permanent: false,
        }
        .is_transient());
        assert!(!DispatchError::ProviderRejected {
            status: 400,
            reason: "BadTopic".into(),
            permanent: true,
        }
        .is_transient());
        assert!(!DispatchError::DeviceUnregistered {
            reason: "Unregistered".into()
        }
        .is_transient());
        assert!(!DispatchError::Credential("bad key".into()).is_transient());
        assert!(!DispatchError::AttemptsExhausted { attempts: 3 }.is_transient());
    }

    #[test]
    fn component_errors_convert_into_scamguard_error() {
        let err: ScamguardError = ClassifierError::ModelError("x".into()).into();
        assert!(matches!(err, ScamguardError::Classifier(_)));
        let err: ScamguardError = DispatchError::TokenExpired.into();
        assert!(matches!(err, ScamguardError::Dispatch(DispatchError::TokenExpired)));
    }
}
