// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Endpoint resolution: service port to concrete backend addresses.

use crate::cache::ClusterCache;
use crate::constants::backend;
use crate::types::{Backend, Configuration, Upstream};
use k8s_openapi::api::core::v1::Endpoints;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::{debug, warn};

pub fn resolve_upstreams(conf: &mut Configuration, cache: &ClusterCache) {
    for upstream in &mut conf.upstreams {
        resolve_upstream(upstream, cache);
    }
}

/// Attach the ready endpoints of the upstream's service port, sorted by address.
/// Leaves the upstream without backends when it cannot be resolved.
pub fn resolve_upstream(upstream: &mut Upstream, cache: &ClusterCache) {
    let id = &upstream.id;
    let Some(service) = cache.service(&id.namespace, &id.name) else {
        warn!("Cannot resolve upstream {}, service not found", id.label());
        return;
    };

    let ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .map(|p| p.as_slice())
        .unwrap_or_default();

    let wanted = i32::from(id.port);
    for port in ports {
        let target = port.target_port.clone().unwrap_or(IntOrString::Int(port.port));
        let matches = port.port == wanted
            || match &target {
                IntOrString::Int(n) => *n == wanted,
                IntOrString::String(s) => *s == wanted.to_string(),
            };
        if !matches {
            continue;
        }

        match target {
            IntOrString::Int(target_port) => {
                let Some(endpoints) = cache.endpoints(&id.namespace, &id.name) else {
                    debug!("No endpoints object for upstream {}", id.label());
                    return;
                };
                upstream.endpoints = resolve_endpoints(&endpoints, target_port);
            }
            IntOrString::String(name) => {
                warn!(
                    "Cannot resolve named target port {:?} of upstream {}",
                    name,
                    id.label()
                );
            }
        }
        return;
    }

    warn!(
        "Failed to find matching service name/port for {}",
        id.label()
    );
}

/// Ready TCP addresses exposing `port`, sorted by address
pub fn resolve_endpoints(endpoints: &Endpoints, port: i32) -> Vec<Backend> {
    let Ok(backend_port) = u16::try_from(port) else {
        return Vec::new();
    };

    let mut out: Vec<Backend> = endpoints
        .subsets
        .iter()
        .flatten()
        .filter(|subset| {
            subset.ports.iter().flatten().any(|p| {
                p.port == port && p.protocol.as_deref().unwrap_or("TCP") == "TCP"
            })
        })
        .flat_map(|subset| subset.addresses.iter().flatten())
        .map(|address| Backend {
            address: address.ip.clone(),
            port: backend_port,
            max_fails: backend::MAX_FAILS,
            fail_timeout: backend::FAIL_TIMEOUT_SECS,
        })
        .collect();

    out.sort_by(|a, b| a.address.cmp(&b.address));
    out
}
