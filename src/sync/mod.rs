// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation: from cached cluster state to a proxy configuration.

pub mod annotations;
pub mod builder;
pub mod manager;
pub mod queue;
pub mod resolver;
pub mod tls;

pub use builder::{ConfigBuilder, TlsBindings, TlsFiles};
pub use manager::{resync_loop, ResourceEvent, SyncEvent, SyncManager, SyncManagerHandle};
pub use queue::{Process, WorkQueue};
