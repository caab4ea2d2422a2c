// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker state machine.
//!
//! `Closed` counts consecutive failures. Reaching the threshold within the
//! rolling window trips it to `Open`, which rejects calls without touching the
//! backend. After the cool-down the next caller becomes the single `HalfOpen`
//! trial call: its success closes the breaker, its failure re-opens it.
//!
//! All transitions happen under one mutex and never await, so callers are
//! never blocked by an open breaker.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use strum::Display;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// The failures must all fall within this window of the first one.
    pub window: Duration,
    /// Time spent open before a trial call is admitted.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Returned when a call is short-circuited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOpen {
    /// Time until a trial call will be admitted.
    pub retry_after: Duration,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    streak_started: Option<Instant>,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
    last_transition: Instant,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                streak_started: None,
                opened_at: None,
                trial_started: None,
                last_transition: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// When the breaker last changed state.
    pub fn last_transition(&self) -> Instant {
        self.lock().last_transition
    }

    /// Asks permission to call the backend.
    ///
    /// Every `Ok` must be followed by [`record_success`](Self::record_success)
    /// or [`record_failure`](Self::record_failure).
    pub fn try_acquire(&self) -> Result<(), BreakerOpen> {
        let now = Instant::now();
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                let elapsed = now.saturating_duration_since(opened_at);
                if elapsed >= self.config.cooldown {
                    self.transition(&mut inner, BreakerState::HalfOpen, now);
                    inner.trial_started = Some(now);
                    Ok(())
                } else {
                    Err(BreakerOpen {
                        retry_after: self.config.cooldown - elapsed,
                    })
                }
            }
            BreakerState::HalfOpen => {
                // A trial call that never reported back is abandoned after one cool-down.
                let stale = inner
                    .trial_started
                    .is_none_or(|t| now.saturating_duration_since(t) >= self.config.cooldown);
                if stale {
                    inner.trial_started = Some(now);
                    Ok(())
                } else {
                    Err(BreakerOpen {
                        retry_after: Duration::ZERO,
                    })
                }
            }
        }
    }

    pub fn record_success(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        inner.streak_started = None;
        if inner.state != BreakerState::Closed {
            self.transition(&mut inner, BreakerState::Closed, now);
        }
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => {
                let in_window = inner
                    .streak_started
                    .is_some_and(|t| now.saturating_duration_since(t) <= self.config.window);
                if in_window {
                    inner.consecutive_failures += 1;
                } else {
                    inner.streak_started = Some(now);
                    inner.consecutive_failures = 1;
                }
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, BreakerState::Open, now);
                }
            }
            BreakerState::HalfOpen => self.transition(&mut inner, BreakerState::Open, now),
            // Late result from a call admitted before the breaker tripped.
            BreakerState::Open => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: BreakerState, now: Instant) {
        let from = inner.state;
        inner.state = to;
        inner.last_transition = now;
        match to {
            BreakerState::Open => {
                inner.opened_at = Some(now);
                inner.trial_started = None;
                warn!(
                    breaker = %self.name,
                    %from,
                    failures = inner.consecutive_failures,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "circuit breaker opened"
                );
            }
            BreakerState::HalfOpen => {
                info!(breaker = %self.name, "circuit breaker half-open, admitting trial call");
            }
            BreakerState::Closed => {
                inner.opened_at = None;
                inner.trial_started = None;
                info!(breaker = %self.name, %from, "circuit breaker closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 3,
                window: Duration::from_secs(60),
                cooldown: Duration::from_secs(30),
            },
        )
    }

    fn fail(breaker: &CircuitBreaker, times: u32) {
        for _ in 0..times {
            breaker.try_acquire().unwrap();
            breaker.record_failure();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_consecutive_failures() {
        let b = breaker();
        fail(&b, 2);
        assert_eq!(b.state(), BreakerState::Closed);
        fail(&b, 1);
        assert_eq!(b.state(), BreakerState::Open);

        let rejected = b.try_acquire().unwrap_err();
        assert_eq!(rejected.retry_after, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_streak() {
        let b = breaker();
        fail(&b, 2);
        b.try_acquire().unwrap();
        b.record_success();
        fail(&b, 2);
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_outside_window_start_a_new_streak() {
        let b = breaker();
        fail(&b, 2);
        tokio::time::advance(Duration::from_secs(61)).await;
        fail(&b, 2);
        assert_eq!(b.state(), BreakerState::Closed);
        fail(&b, 1);
        assert_eq!(b.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_a_single_trial() {
        let b = breaker();
        fail(&b, 3);
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(b.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(b.try_acquire().is_ok());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        assert!(b.try_acquire().is_err(), "second caller must not get a trial call");

        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_trial_reopens() {
        let b = breaker();
        fail(&b, 3);
        tokio::time::advance(Duration::from_secs(30)).await;
        b.try_acquire().unwrap();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert_eq!(
            b.try_acquire().unwrap_err().retry_after,
            Duration::from_secs(30)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn last_transition_tracks_state_changes() {
        let b = breaker();
        let created = b.last_transition();
        tokio::time::advance(Duration::from_secs(5)).await;
        fail(&b, 2);
        assert_eq!(b.last_transition(), created);

        fail(&b, 1);
        assert_eq!(b.last_transition(), created + Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_trial_is_replaced() {
        let b = breaker();
        fail(&b, 3);
        tokio::time::advance(Duration::from_secs(30)).await;
        b.try_acquire().unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(b.try_acquire().is_ok());
    }
}
