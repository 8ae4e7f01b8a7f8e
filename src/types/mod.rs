// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Data model of the generated proxy configuration.

pub mod configuration;

pub use configuration::{
    Backend, Configuration, Location, Ports, Protocol, ProxySettings, Server, Upstream, UpstreamId,
};
