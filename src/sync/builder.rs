// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Translation of in-scope ingresses into a proxy configuration.

use crate::constants::ports;
use crate::sync::annotations::{backend_protocol, strip_prefix};
use crate::types::{Configuration, Location, Ports, ProxySettings, Server, Upstream, UpstreamId};
use k8s_openapi::api::networking::v1::{Ingress, IngressServiceBackend};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::warn;

/// Certificate and key files materialized for one TLS host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsFiles {
    pub certificate: String,
    pub key: String,
}

/// TLS files keyed by host name
pub type TlsBindings = BTreeMap<String, TlsFiles>;

/// Accumulates servers and upstreams from ingresses fed oldest first.
pub struct ConfigBuilder {
    conf: Configuration,
    default_location: Option<Location>,
    credentials_file: String,
}

impl ConfigBuilder {
    pub fn new(settings: ProxySettings, credentials_file: Option<&str>) -> Self {
        Self {
            conf: Configuration::new(settings),
            default_location: None,
            credentials_file: credentials_file.unwrap_or_default().to_string(),
        }
    }

    pub fn add_ingress(&mut self, ing: &Ingress, service_config_file: &str, tls: &TlsBindings) {
        let namespace = ing.namespace().unwrap_or_default();
        let protocol = backend_protocol(ing);
        let strip_prefix = strip_prefix(ing);
        let Some(spec) = ing.spec.as_ref() else {
            warn!("Ingress {}/{} has no spec, skipping", namespace, ing.name_any());
            return;
        };

        let location = |path: String, upstream: UpstreamId| Location {
            path,
            upstream,
            strip_prefix,
            service_config_file: service_config_file.to_string(),
            credentials_file: self.credentials_file.clone(),
        };

        // the last default backend acts as an implicit "/" rule
        let default_location = spec
            .default_backend
            .as_ref()
            .and_then(|b| b.service.as_ref())
            .and_then(|backend| {
                let port = numeric_port(backend, &namespace, "Default backend")?;
                Some(location(
                    String::new(),
                    UpstreamId {
                        protocol,
                        name: backend.name.clone(),
                        namespace: namespace.clone(),
                        port,
                    },
                ))
            });

        let mut servers = Vec::new();
        let mut upstreams = Vec::new();
        for rule in spec.rules.iter().flatten() {
            let host = rule.host.clone().unwrap_or_default();
            let Some(http) = rule.http.as_ref() else {
                warn!(
                    "Skipping rule for host {:?} of ingress {}/{}, missing an HTTP section",
                    host,
                    namespace,
                    ing.name_any()
                );
                continue;
            };

            let mut server = Server {
                name: host.clone(),
                locations: Vec::new(),
                ports: Ports {
                    http: ports::HTTP,
                    ..Default::default()
                },
                ssl_certificate: String::new(),
                ssl_certificate_key: String::new(),
            };
            if let Some(files) = tls.get(&host) {
                server.ports.ssl = ports::SSL;
                server.ssl_certificate = files.certificate.clone();
                server.ssl_certificate_key = files.key.clone();
            }

            for path in &http.paths {
                let Some(backend) = path.backend.service.as_ref() else {
                    warn!(
                        "Rule path {:?} of ingress {}/{} has no service backend, skipping",
                        path.path,
                        namespace,
                        ing.name_any()
                    );
                    continue;
                };
                let Some(port) = numeric_port(backend, &namespace, "Rule backend") else {
                    continue;
                };

                let id = UpstreamId {
                    protocol,
                    name: backend.name.clone(),
                    namespace: namespace.clone(),
                    port,
                };
                upstreams.push(Upstream::new(id.clone()));
                server
                    .locations
                    .push(location(normalize_path(path.path.as_deref().unwrap_or_default()), id));
            }

            servers.push(server);
        }

        if let Some(location) = default_location {
            if let Some(previous) = &self.default_location {
                warn!(
                    "Overriding the default upstream {} with {} from ingress {}/{}",
                    previous.upstream.label(),
                    location.upstream.label(),
                    namespace,
                    ing.name_any()
                );
            }
            self.default_location = Some(location);
        }
        self.conf.upstreams.extend(upstreams);
        self.conf.servers.extend(servers);
    }

    /// Append the host-less default server and deduplicate upstreams
    pub fn build(mut self) -> Configuration {
        if let Some(location) = self.default_location.take() {
            self.conf.upstreams.push(Upstream::new(location.upstream.clone()));
            self.conf.servers.push(Server {
                name: String::new(),
                locations: vec![location],
                ports: Ports {
                    http: ports::HTTP,
                    ..Default::default()
                },
                ssl_certificate: String::new(),
                ssl_certificate_key: String::new(),
            });
        }

        self.conf.deduplicate_upstreams();
        self.conf
    }
}

/// Strip trailing slashes so that `/v1/` and `/v1` name the same location
pub fn normalize_path(path: &str) -> String {
    path.trim_end_matches('/').to_string()
}

fn numeric_port(backend: &IngressServiceBackend, namespace: &str, what: &str) -> Option<u16> {
    let port = backend.port.as_ref();
    match (port.and_then(|p| p.number), port.and_then(|p| p.name.as_deref())) {
        (Some(number), _) => match u16::try_from(number) {
            Ok(port) => Some(port),
            Err(_) => {
                warn!(
                    "{} {}/{} uses an invalid port {}, skipping",
                    what, namespace, backend.name, number
                );
                None
            }
        },
        (None, Some(name)) => {
            warn!(
                "{} {}/{} uses a named port {:?}, skipping",
                what, namespace, backend.name, name
            );
            None
        }
        (None, None) => {
            warn!(
                "{} {}/{} has no port, skipping",
                what, namespace, backend.name
            );
            None
        }
    }
}
