// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP ingestion endpoint for Scamguard.
//!
//! Keyboard clients post captured text to `POST /v1/events`; the gateway
//! validates it, hands it to the [`AlertPipeline`](scamguard_pipeline::AlertPipeline)
//! and answers without ever echoing the text or internal errors back.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, IngestLimits, build_router, start_server};
