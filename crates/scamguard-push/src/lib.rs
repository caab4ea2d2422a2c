// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push delivery for the Scamguard alert pipeline.
//!
//! - [`ProviderTokenCache`] holds the signed provider credential shared by
//!   every dispatch and refreshes it single-flight.
//! - [`ApnsProvider`] sends one notification per call.
//! - [`PushDispatcher`] drives an alert record to `delivered` or `failed`.

pub mod apns;
pub mod dispatcher;
pub mod payload;
pub mod token;

pub use apns::ApnsProvider;
pub use dispatcher::PushDispatcher;
pub use token::{JwtTokenIssuer, ProviderTokenCache};
