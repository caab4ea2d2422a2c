// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alert pipeline orchestration for Scamguard.
//!
//! An event passes the [`DebounceCache`], is scored by the classifier client,
//! turned into an alert decision by [`decide`], recorded idempotently, and
//! handed to the push dispatcher.

pub mod debounce;
pub mod decision;
pub mod pipeline;

pub use debounce::{Admission, DebounceCache};
pub use decision::{AlertPolicy, decide};
pub use pipeline::{AlertPipeline, PipelineOutcome};
