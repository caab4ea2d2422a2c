// SPDX-FileCopyrightText: 2026 Scamguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits at the pipeline's external seams.
//!
//! Every collaborator the pipeline talks to sits behind one of these traits
//! so tests can substitute fakes. All use `#[async_trait]` for `dyn` dispatch.

pub mod adapter;
pub mod classifier;
pub mod push;
pub mod storage;

pub use adapter::PluginAdapter;
pub use classifier::ClassifierBackend;
pub use push::{PushProvider, TokenIssuer};
pub use storage::{AlertStore, DeviceDirectory, StorageAdapter};
