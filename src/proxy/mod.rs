// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! External proxy process: configuration rendering and lifecycle.

pub mod supervisor;
pub mod template;

pub use supervisor::ProxySupervisor;
pub use template::Template;
