// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push provider and credential issuer traits.

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderAck, ProviderToken, PushNotification};

/// A push notification service (APNs or a test double).
#[async_trait]
pub trait PushProvider: PluginAdapter {
    /// Sends one notification authenticated with `token`. One attempt, no retries.
    async fn send(
        &self,
        notification: &PushNotification,
        token: &ProviderToken,
    ) -> Result<ProviderAck, DispatchError>;
}

/// Produces fresh provider credentials.
///
/// Only the token cache calls this, under single-flight.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> Result<ProviderToken, DispatchError>;
}
