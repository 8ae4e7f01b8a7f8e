// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: Kubernetes object fixtures, cache seeding, a fake
//! service registry, a scripted stand-in for the proxy binary, and a mock
//! API server.

use crate::cache::{CacheWriter, CacheWriters};
use crate::constants::{annotations, tls};
use crate::error::{IngressError, Result};
use crate::registry::ServiceRegistry;
use crate::types::ProxySettings;
use bytes::Bytes;
use http::{Request, Response};
use k8s_openapi::api::core::v1::{
    EndpointAddress, EndpointPort, EndpointSubset, Endpoints, Secret, Service, ServicePort,
    ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::runtime::watcher;
use kube::Client;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tempfile::TempDir;
use tower::Service as TowerService;

/// Service config name carried by fixture ingresses
pub const SERVICE_NAME: &str = "bookstore.endpoints.example.com";
/// Service config ID carried by fixture ingresses
pub const SERVICE_CONFIG_ID: &str = "2024-01-01r0";

pub fn settings() -> ProxySettings {
    ProxySettings {
        status_port: 8090,
        metadata_server: "http://169.254.169.254".to_string(),
        dns_resolver: "8.8.8.8".to_string(),
        access_log: "/dev/stdout".to_string(),
        error_log: "stderr".to_string(),
        use_upstream_resolver: false,
        pid: "/var/run/nginx.pid".to_string(),
        mime_types: "/etc/nginx/mime.types".to_string(),
        num_worker_processes: 1,
        platform: "linux".to_string(),
        temp_dir: String::new(),
    }
}

fn meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

fn backend(service: &str, port: ServiceBackendPort) -> IngressBackend {
    IngressBackend {
        service: Some(IngressServiceBackend {
            name: service.to_string(),
            port: Some(port),
        }),
        ..Default::default()
    }
}

fn number(port: i32) -> ServiceBackendPort {
    ServiceBackendPort {
        number: Some(port),
        name: None,
    }
}

fn named(port: &str) -> ServiceBackendPort {
    ServiceBackendPort {
        number: None,
        name: Some(port.to_string()),
    }
}

/// Builder for an in-scope ingress in the `default` namespace
pub struct IngressFixture {
    name: String,
    annotations: BTreeMap<String, String>,
    rules: Vec<IngressRule>,
    default_backend: Option<IngressBackend>,
    tls: Vec<IngressTLS>,
    created: Option<Time>,
}

impl IngressFixture {
    pub fn new(name: &str) -> Self {
        let annotations = [
            (annotations::INGRESS_CLASS, "esp"),
            (annotations::SERVICE_NAME, SERVICE_NAME),
            (annotations::SERVICE_CONFIG_ID, SERVICE_CONFIG_ID),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: name.to_string(),
            annotations,
            rules: Vec::new(),
            default_backend: None,
            tls: Vec::new(),
            created: None,
        }
    }

    fn annotate(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.annotate(annotations::INGRESS_CLASS, class)
    }

    pub fn protocol(self, protocol: &str) -> Self {
        self.annotate(annotations::BACKEND_PROTOCOL, protocol)
    }

    pub fn strip_prefix(self) -> Self {
        self.annotate(annotations::STRIP_PREFIX, "true")
    }

    pub fn service_config(self, name: &str, version: Option<&str>) -> Self {
        let mut fixture = self.annotate(annotations::SERVICE_NAME, name);
        match version {
            Some(version) => fixture.annotate(annotations::SERVICE_CONFIG_ID, version),
            None => {
                fixture.annotations.remove(annotations::SERVICE_CONFIG_ID);
                fixture
            }
        }
    }

    pub fn without_service_config(mut self) -> Self {
        self.annotations.remove(annotations::SERVICE_NAME);
        self.annotations.remove(annotations::SERVICE_CONFIG_ID);
        self
    }

    /// RFC 3339 creation timestamp
    pub fn created(mut self, timestamp: &str) -> Self {
        self.created = Some(serde_json::from_value(serde_json::json!(timestamp)).unwrap());
        self
    }

    fn path(mut self, host: &str, path: &str, backend: IngressBackend) -> Self {
        let host = (!host.is_empty()).then(|| host.to_string());
        let entry = HTTPIngressPath {
            path: Some(path.to_string()),
            path_type: "Prefix".to_string(),
            backend,
        };

        match self.rules.iter_mut().find(|r| r.host == host) {
            Some(rule) => {
                if let Some(http) = rule.http.as_mut() {
                    http.paths.push(entry);
                }
            }
            None => self.rules.push(IngressRule {
                host,
                http: Some(HTTPIngressRuleValue { paths: vec![entry] }),
            }),
        }
        self
    }

    /// Route `host` + `path` to a numeric service port; an empty host matches any
    pub fn rule(self, host: &str, path: &str, service: &str, port: i32) -> Self {
        self.path(host, path, backend(service, number(port)))
    }

    pub fn named_port_rule(self, host: &str, path: &str, service: &str, port: &str) -> Self {
        self.path(host, path, backend(service, named(port)))
    }

    pub fn default_backend(mut self, service: &str, port: i32) -> Self {
        self.default_backend = Some(backend(service, number(port)));
        self
    }

    pub fn named_default_backend(mut self, service: &str, port: &str) -> Self {
        self.default_backend = Some(backend(service, named(port)));
        self
    }

    pub fn tls(mut self, hosts: &[&str], secret: &str) -> Self {
        self.tls.push(IngressTLS {
            hosts: (!hosts.is_empty()).then(|| hosts.iter().map(|h| h.to_string()).collect()),
            secret_name: Some(secret.to_string()),
        });
        self
    }
}

pub fn ingress(fixture: IngressFixture) -> Ingress {
    let mut metadata = meta(&fixture.name, "default");
    metadata.annotations = Some(fixture.annotations);
    metadata.creation_timestamp = fixture.created;

    Ingress {
        metadata,
        spec: Some(IngressSpec {
            default_backend: fixture.default_backend,
            rules: (!fixture.rules.is_empty()).then_some(fixture.rules),
            tls: (!fixture.tls.is_empty()).then_some(fixture.tls),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ingress of another controller's class
pub fn plain_ingress(name: &str, class: &str) -> Ingress {
    ingress(
        IngressFixture::new(name)
            .class(class)
            .rule("", "/", "bookstore", 80),
    )
}

/// In-scope ingress routing `api.example.com/` to bookstore:80 over TLS
pub fn ingress_with_tls(name: &str, hosts: &[&str], secret: &str) -> Ingress {
    ingress(
        IngressFixture::new(name)
            .rule("api.example.com", "/", "bookstore", 80)
            .tls(hosts, secret),
    )
}

/// TLS secret; `None` leaves out the certificate and key
pub fn secret(name: &str, namespace: &str, pem: Option<(&str, &str)>) -> Secret {
    Secret {
        metadata: meta(name, namespace),
        type_: Some("kubernetes.io/tls".to_string()),
        data: pem.map(|(cert, key)| {
            BTreeMap::from([
                (tls::CERT_KEY.to_string(), ByteString(cert.as_bytes().to_vec())),
                (tls::PRIVATE_KEY_KEY.to_string(), ByteString(key.as_bytes().to_vec())),
            ])
        }),
        ..Default::default()
    }
}

/// Service in `default` exposing one TCP port
pub fn service(name: &str, port: i32, target_port: IntOrString) -> Service {
    Service {
        metadata: meta(name, "default"),
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port,
                target_port: Some(target_port),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Endpoints in `default` with every address ready on one TCP port
pub fn endpoints(name: &str, addresses: &[&str], port: i32) -> Endpoints {
    Endpoints {
        metadata: meta(name, "default"),
        subsets: Some(vec![EndpointSubset {
            addresses: Some(
                addresses
                    .iter()
                    .map(|ip| EndpointAddress {
                        ip: ip.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ports: Some(vec![EndpointPort {
                port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }]),
    }
}

pub fn apply<K>(cache: &mut CacheWriter<K>, obj: K)
where
    K: kube::Resource<DynamicType = ()> + Clone + 'static,
{
    cache.writer.apply_watcher_event(&watcher::Event::Apply(obj));
}

pub fn delete<K>(cache: &mut CacheWriter<K>, obj: K)
where
    K: kube::Resource<DynamicType = ()> + Clone + 'static,
{
    cache.writer.apply_watcher_event(&watcher::Event::Delete(obj));
}

pub fn mark_synced(writers: &CacheWriters) {
    let flags: [&AtomicBool; 4] = [
        &writers.ingresses.synced,
        &writers.secrets.synced,
        &writers.endpoints.synced,
        &writers.services.synced,
    ];
    for flag in flags {
        flag.store(true, Ordering::SeqCst);
    }
}

/// In-memory registry; unknown configs answer 404
#[derive(Clone, Default)]
pub struct FakeRegistry {
    documents: HashMap<(String, Option<String>), Bytes>,
    calls: Arc<AtomicUsize>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, name: &str, version: &str, body: &str) -> Self {
        self.documents.insert(
            (name.to_string(), Some(version.to_string())),
            Bytes::from(body.to_string()),
        );
        self
    }

    pub fn with_latest(mut self, name: &str, body: &str) -> Self {
        self.documents
            .insert((name.to_string(), None), Bytes::from(body.to_string()));
        self
    }

    /// Number of fetches served so far
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl ServiceRegistry for FakeRegistry {
    async fn fetch(&self, name: &str, version: Option<&str>) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(&(name.to_string(), version.map(str::to_string)))
            .cloned()
            .ok_or_else(|| IngressError::RegistryStatus {
                name: name.to_string(),
                version: version.unwrap_or("latest").to_string(),
                status: 404,
            })
    }
}

/// Shell script standing in for the proxy binary, logging its arguments
pub struct FakeProxy {
    pub binary: PathBuf,
    pub conf_path: PathBuf,
    log: PathBuf,
    _dir: TempDir,
}

impl FakeProxy {
    /// Argument lists of every invocation, oldest first
    pub fn invocations(&self) -> Vec<String> {
        std::fs::read_to_string(&self.log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

/// Create a proxy stand-in that records its arguments, then runs `body`
#[cfg(unix)]
pub fn fake_proxy(body: &str) -> FakeProxy {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let binary = dir.path().join("nginx");
    let log = dir.path().join("invocations.log");
    let script = format!("#!/bin/sh\necho \"$*\" >> '{}'\n{}\n", log.display(), body);
    std::fs::write(&binary, script).unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

    FakeProxy {
        binary,
        conf_path: dir.path().join("nginx.conf"),
        log,
        _dir: dir,
    }
}

/// `/version` response body of an API server
pub fn version_json(major: &str, minor: &str) -> String {
    serde_json::json!({
        "major": major,
        "minor": minor,
        "gitVersion": format!("v{}.{}.0", major, minor),
        "gitCommit": "0000000",
        "gitTreeState": "clean",
        "buildDate": "2024-01-01T00:00:00Z",
        "goVersion": "go1.22.0",
        "compiler": "gc",
        "platform": "linux/amd64"
    })
    .to_string()
}

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone, Default)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(("GET".to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }
}

impl TowerService<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let key = (req.method().to_string(), req.uri().path().to_string());
        let response = self.responses.lock().unwrap().get(&key).cloned();

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| {
                let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                (404, body.to_string())
            });
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}
