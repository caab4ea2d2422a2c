// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-device duplicate suppression and rate limiting.
//!
//! Each device keeps the admissions of the current window. Entries expire
//! lazily when the device is next looked up. The device map is bounded: past
//! `max_devices` the least recently seen device is forgotten.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scamguard_config::model::DebounceConfig;
use tokio::time::Instant;

/// Result of offering an event to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Same fingerprint already admitted for this device within the window.
    Duplicate,
    /// The device used up its admissions for the window.
    RateLimited,
}

impl Admission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted => "admitted",
            Self::Duplicate => "duplicate",
            Self::RateLimited => "rate_limited",
        }
    }
}

#[derive(Debug, Default)]
struct DeviceWindow {
    admitted: VecDeque<(Instant, String)>,
    lru_tick: u64,
}

#[derive(Debug, Default)]
struct Inner {
    devices: HashMap<String, DeviceWindow>,
    /// `lru_tick` to device id; the first entry is the least recently seen.
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

#[derive(Debug)]
pub struct DebounceCache {
    window: Duration,
    max_devices: usize,
    max_per_window: usize,
    inner: Mutex<Inner>,
}

impl DebounceCache {
    pub fn new(window: Duration, max_devices: usize, max_per_window: usize) -> Self {
        Self {
            window,
            max_devices: max_devices.max(1),
            max_per_window: max_per_window.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn from_config(config: &DebounceConfig) -> Self {
        Self::new(
            Duration::from_secs(config.window_secs),
            config.max_devices,
            config.max_per_window,
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if the event should proceed to classification.
    pub fn admit(&self, device_id: &str, fingerprint: &str, now: Instant) -> bool {
        self.check(device_id, fingerprint, now) == Admission::Admitted
    }

    /// Looks up and, when admitted, records the event in one step.
    pub fn check(&self, device_id: &str, fingerprint: &str, now: Instant) -> Admission {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let tick = inner.next_tick;
        inner.next_tick += 1;

        if !inner.devices.contains_key(device_id) {
            while inner.devices.len() >= self.max_devices {
                let Some((_, evicted)) = inner.recency.pop_first() else {
                    break;
                };
                inner.devices.remove(&evicted);
            }
        }

        let entry = inner.devices.entry(device_id.to_string()).or_default();
        inner.recency.remove(&entry.lru_tick);
        entry.lru_tick = tick;
        inner.recency.insert(tick, device_id.to_string());

        while entry
            .admitted
            .front()
            .is_some_and(|(at, _)| now.saturating_duration_since(*at) >= self.window)
        {
            entry.admitted.pop_front();
        }

        if entry.admitted.iter().any(|(_, fp)| fp == fingerprint) {
            return Admission::Duplicate;
        }
        if entry.admitted.len() >= self.max_per_window {
            return Admission::RateLimited;
        }
        entry.admitted.push_back((now, fingerprint.to_string()));
        Admission::Admitted
    }

    /// Number of devices currently tracked.
    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
