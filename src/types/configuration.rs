// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use tracing::warn;

/// Protocol spoken between the proxy and an upstream
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
    Grpc,
}

impl Protocol {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            "grpc" => Some(Protocol::Grpc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Grpc => "grpc",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a backend group: a service port reached over a protocol
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpstreamId {
    pub protocol: Protocol,
    pub name: String,
    pub namespace: String,
    pub port: u16,
}

impl UpstreamId {
    /// Label uniquely identifies an upstream within a configuration
    pub fn label(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.protocol, self.name, self.namespace, self.port
        )
    }

    /// In-cluster DNS name of the service
    pub fn address(&self) -> String {
        format!("{}.{}", self.name, self.namespace)
    }
}

impl Serialize for UpstreamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("UpstreamId", 6)?;
        s.serialize_field("Protocol", &self.protocol)?;
        s.serialize_field("Name", &self.name)?;
        s.serialize_field("Namespace", &self.namespace)?;
        s.serialize_field("Port", &self.port)?;
        s.serialize_field("Label", &self.label())?;
        s.serialize_field("Address", &self.address())?;
        s.end()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Upstream {
    #[serde(flatten)]
    pub id: UpstreamId,
    pub endpoints: Vec<Backend>,
}

impl Upstream {
    pub fn new(id: UpstreamId) -> Self {
        Self {
            id,
            endpoints: Vec::new(),
        }
    }

    pub fn label(&self) -> String {
        self.id.label()
    }
}

/// One resolved network endpoint of an upstream
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Backend {
    pub address: String,
    pub port: u16,
    pub max_fails: u32,
    pub fail_timeout: u32,
}

/// Listener ports of a server; a zero port is disabled
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Ports {
    #[serde(rename = "SSL")]
    pub ssl: u16,
    #[serde(rename = "HTTP")]
    pub http: u16,
    #[serde(rename = "HTTP2")]
    pub http2: u16,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Server {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Locations")]
    pub locations: Vec<Location>,
    #[serde(rename = "Ports")]
    pub ports: Ports,
    #[serde(rename = "SSLCertificate")]
    pub ssl_certificate: String,
    #[serde(rename = "SSLCertificateKey")]
    pub ssl_certificate_key: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    pub path: String,
    pub upstream: UpstreamId,
    pub strip_prefix: bool,
    pub service_config_file: String,
    pub credentials_file: String,
}

/// Global scalars of the rendered proxy configuration
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProxySettings {
    #[serde(rename = "StatusPort")]
    pub status_port: u16,
    #[serde(rename = "MetadataServer")]
    pub metadata_server: String,
    #[serde(rename = "DNSResolver")]
    pub dns_resolver: String,
    #[serde(rename = "AccessLog")]
    pub access_log: String,
    #[serde(rename = "ErrorLog")]
    pub error_log: String,
    #[serde(rename = "UseUpstreamResolver")]
    pub use_upstream_resolver: bool,
    #[serde(rename = "PID")]
    pub pid: String,
    #[serde(rename = "MimeTypes")]
    pub mime_types: String,
    #[serde(rename = "NumWorkerProcesses")]
    pub num_worker_processes: usize,
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "TempDir")]
    pub temp_dir: String,
}

/// Root aggregate handed to the proxy template
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Configuration {
    #[serde(rename = "Upstreams")]
    pub upstreams: Vec<Upstream>,
    #[serde(rename = "Servers")]
    pub servers: Vec<Server>,
    #[serde(flatten)]
    pub settings: ProxySettings,
}

impl Configuration {
    pub fn new(settings: ProxySettings) -> Self {
        Self {
            upstreams: Vec::new(),
            servers: Vec::new(),
            settings,
        }
    }

    /// Keep the first upstream of every label
    pub fn deduplicate_upstreams(&mut self) {
        let mut seen = HashSet::new();
        self.upstreams.retain(|upstream| seen.insert(upstream.id.clone()));
    }

    pub fn remove_empty_upstreams(&mut self) {
        self.upstreams.retain(|upstream| {
            if upstream.endpoints.is_empty() {
                warn!(
                    "Upstream {} does not have any active endpoints",
                    upstream.label()
                );
                false
            } else {
                true
            }
        });
    }

    /// Drop locations whose upstream is gone, then servers left without locations
    pub fn remove_stale_locations(&mut self) {
        let known: HashSet<&UpstreamId> = self.upstreams.iter().map(|u| &u.id).collect();

        for server in &mut self.servers {
            server.locations.retain(|location| {
                if known.contains(&location.upstream) {
                    true
                } else {
                    warn!(
                        "Missing upstream {} for location {:?}",
                        location.upstream.label(),
                        location.path
                    );
                    false
                }
            });
        }
        self.servers.retain(|server| !server.locations.is_empty());
    }
}
