// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Read-only view over the replicated caches of the four watched resource kinds.

use crate::constants::tls;
use crate::sync::annotations::is_esp_ingress;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::ResourceExt;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Write halves of the caches, one per watcher
pub struct CacheWriters {
    pub ingresses: CacheWriter<Ingress>,
    pub secrets: CacheWriter<Secret>,
    pub endpoints: CacheWriter<Endpoints>,
    pub services: CacheWriter<Service>,
}

/// A reflector writer paired with the flag raised once its initial list completed
pub struct CacheWriter<K: kube::Resource<DynamicType = ()> + Clone + 'static> {
    pub writer: reflector::store::Writer<K>,
    pub synced: Arc<AtomicBool>,
}

#[derive(Clone)]
pub struct ClusterCache {
    ingress_class: Arc<str>,
    ingresses: Store<Ingress>,
    secrets: Store<Secret>,
    endpoints: Store<Endpoints>,
    services: Store<Service>,
    synced: [Arc<AtomicBool>; 4],
}

fn cache_pair<K>() -> (Store<K>, CacheWriter<K>)
where
    K: kube::Resource<DynamicType = ()> + Clone + 'static,
{
    let (reader, writer) = reflector::store::<K>();
    let synced = Arc::new(AtomicBool::new(false));
    (reader, CacheWriter { writer, synced })
}

impl ClusterCache {
    pub fn new(ingress_class: &str) -> (Self, CacheWriters) {
        let (ingresses, ingress_writer) = cache_pair::<Ingress>();
        let (secrets, secret_writer) = cache_pair::<Secret>();
        let (endpoints, endpoints_writer) = cache_pair::<Endpoints>();
        let (services, service_writer) = cache_pair::<Service>();

        let cache = Self {
            ingress_class: Arc::from(ingress_class),
            ingresses,
            secrets,
            endpoints,
            services,
            synced: [
                ingress_writer.synced.clone(),
                secret_writer.synced.clone(),
                endpoints_writer.synced.clone(),
                service_writer.synced.clone(),
            ],
        };

        let writers = CacheWriters {
            ingresses: ingress_writer,
            secrets: secret_writer,
            endpoints: endpoints_writer,
            services: service_writer,
        };

        (cache, writers)
    }

    pub fn ingress_class(&self) -> &str {
        &self.ingress_class
    }

    /// True once every watcher finished its initial list
    pub fn has_synced(&self) -> bool {
        self.synced.iter().all(|s| s.load(AtomicOrdering::SeqCst))
    }

    /// In-scope ingresses, oldest first (see [`by_creation_time`])
    pub fn esp_ingresses(&self) -> Vec<Arc<Ingress>> {
        let mut ingresses: Vec<_> = self
            .ingresses
            .state()
            .into_iter()
            .filter(|ing| is_esp_ingress(ing, &self.ingress_class))
            .collect();
        ingresses.sort_by(|a, b| by_creation_time(a, b));
        ingresses
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.services.get(&ObjectRef::new(name).within(namespace))
    }

    pub fn endpoints(&self, namespace: &str, name: &str) -> Option<Arc<Endpoints>> {
        self.endpoints.get(&ObjectRef::new(name).within(namespace))
    }

    /// True when some in-scope ingress routes to the named service,
    /// through its default backend or any rule path
    pub fn references_service(&self, namespace: &str, name: &str) -> bool {
        self.ingresses.state().iter().any(|ing| {
            if !is_esp_ingress(ing, &self.ingress_class)
                || ing.namespace().as_deref() != Some(namespace)
            {
                return false;
            }
            let Some(spec) = ing.spec.as_ref() else {
                return false;
            };

            let default_backend = spec
                .default_backend
                .as_ref()
                .and_then(|b| b.service.as_ref())
                .is_some_and(|s| s.name == name);

            default_backend
                || spec.rules.iter().flatten().any(|rule| {
                    rule.http.as_ref().is_some_and(|http| {
                        http.paths.iter().any(|path| {
                            path.backend.service.as_ref().is_some_and(|s| s.name == name)
                        })
                    })
                })
        })
    }

    /// True when some in-scope ingress in the secret's namespace uses it for TLS
    pub fn references_secret(&self, secret: &Secret) -> bool {
        let name = secret.name_any();
        let namespace = secret.namespace();

        self.ingresses.state().iter().any(|ing| {
            is_esp_ingress(ing, &self.ingress_class)
                && ing.namespace() == namespace
                && ing
                    .spec
                    .as_ref()
                    .and_then(|s| s.tls.as_ref())
                    .is_some_and(|tls| {
                        tls.iter()
                            .any(|t| t.secret_name.as_deref() == Some(name.as_str()))
                    })
        })
    }

    /// PEM certificate and private key held by a TLS secret
    pub fn tls_data(&self, namespace: &str, name: &str) -> Option<(Vec<u8>, Vec<u8>)> {
        let secret = self.secrets.get(&ObjectRef::new(name).within(namespace))?;
        let data = secret.data.as_ref()?;
        let cert = data.get(tls::CERT_KEY)?;
        let key = data.get(tls::PRIVATE_KEY_KEY)?;
        Some((cert.0.clone(), key.0.clone()))
    }
}

/// Ordering of ingresses by creation time, namespace and name breaking ties.
///
/// When several ingresses declare a default backend, the last one in this
/// order wins.
pub fn by_creation_time(a: &Ingress, b: &Ingress) -> Ordering {
    a.metadata
        .creation_timestamp
        .cmp(&b.metadata.creation_timestamp)
        .then_with(|| a.metadata.namespace.cmp(&b.metadata.namespace))
        .then_with(|| a.metadata.name.cmp(&b.metadata.name))
}
