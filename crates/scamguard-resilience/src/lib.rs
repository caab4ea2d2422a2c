// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives shared by the classifier client and push dispatcher.

pub mod backoff;
pub mod circuit_breaker;

pub use backoff::Backoff;
pub use circuit_breaker::{BreakerOpen, BreakerState, CircuitBreaker, CircuitBreakerConfig};
