// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Scamguard fraud-alert pipeline.
//!
//! Holds the domain types that flow between pipeline stages, the error
//! taxonomy, and the adapter traits implemented by the classifier, storage
//! and push crates.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ClassifierError, DispatchError, ScamguardError};
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    AlertStore, ClassifierBackend, DeviceDirectory, PluginAdapter, PushProvider, StorageAdapter,
    TokenIssuer,
};
