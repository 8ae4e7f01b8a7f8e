// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Central coordinator turning cluster state into proxy configuration.
//!
//! Watchers push [`SyncEvent`]s through a [`SyncManagerHandle`]; the
//! manager's single worker rebuilds the full configuration from the caches
//! on every event and hands it to the proxy supervisor.

use crate::cache::ClusterCache;
use crate::config::Config;
use crate::error::{IngressError, Result};
use crate::proxy::ProxySupervisor;
use crate::registry::{ConfigStore, ServiceRegistry};
use crate::sync::annotations::service_config;
use crate::sync::builder::ConfigBuilder;
use crate::sync::queue::{Process, WorkQueue};
use crate::sync::resolver::resolve_upstreams;
use crate::sync::tls;
use crate::types::{Configuration, ProxySettings};
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::{Resource, ResourceExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Change observed on one cached object
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<K> {
    Added(Arc<K>),
    Updated(Arc<K>),
    Deleted(Arc<K>),
}

impl<K: Resource> ResourceEvent<K> {
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Added(obj) | ResourceEvent::Updated(obj) | ResourceEvent::Deleted(obj) => {
                &**obj
            }
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            ResourceEvent::Added(_) => "added",
            ResourceEvent::Updated(_) => "updated",
            ResourceEvent::Deleted(_) => "deleted",
        }
    }
}

/// Events that watchers send to the SyncManager
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Ingress(ResourceEvent<Ingress>),
    Secret(ResourceEvent<Secret>),
    Endpoints(ResourceEvent<Endpoints>),
    Service(ResourceEvent<Service>),
    /// Periodic rebuild without a triggering object
    Resync,
}

fn describe<K: Resource<DynamicType = ()>>(
    f: &mut fmt::Formatter<'_>,
    event: &ResourceEvent<K>,
) -> fmt::Result {
    let obj = event.object();
    write!(
        f,
        "{} {}/{} {}",
        K::kind(&()),
        obj.namespace().unwrap_or_default(),
        obj.name_any(),
        event.verb()
    )
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Ingress(e) => describe(f, e),
            SyncEvent::Secret(e) => describe(f, e),
            SyncEvent::Endpoints(e) => describe(f, e),
            SyncEvent::Service(e) => describe(f, e),
            SyncEvent::Resync => f.write_str("periodic resync"),
        }
    }
}

/// Handle to send events to the SyncManager
#[derive(Clone)]
pub struct SyncManagerHandle {
    queue: WorkQueue<SyncEvent>,
}

impl SyncManagerHandle {
    pub fn new(queue: WorkQueue<SyncEvent>) -> Self {
        Self { queue }
    }

    pub fn enqueue(&self, event: SyncEvent) {
        debug!("Enqueueing {}", event);
        self.queue.enqueue(event);
    }
}

pub struct SyncManager<R> {
    cache: ClusterCache,
    config_store: ConfigStore<R>,
    supervisor: ProxySupervisor,
    settings: ProxySettings,
    credentials_file: Option<String>,
    tls_dir: PathBuf,
    queue: WorkQueue<SyncEvent>,
}

impl<R> SyncManager<R>
where
    R: ServiceRegistry + Send + Sync,
{
    pub fn new(
        cache: ClusterCache,
        config_store: ConfigStore<R>,
        supervisor: ProxySupervisor,
        config: &Config,
    ) -> (Self, SyncManagerHandle) {
        let queue = WorkQueue::new();
        let manager = Self {
            cache,
            config_store,
            supervisor,
            settings: config.settings(),
            credentials_file: config.credentials_file.clone(),
            tls_dir: config.tls_dir.clone(),
            queue: queue.clone(),
        };

        (manager, SyncManagerHandle::new(queue))
    }

    /// Launch the proxy with a configuration holding no servers
    pub async fn start(&mut self) -> Result<()> {
        let empty = Configuration::new(self.settings.clone());
        self.supervisor.run(&empty).await
    }

    /// Process events until `shutdown` fires
    pub async fn run(&mut self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("SyncManager started, waiting for events...");
        let queue = self.queue.clone();
        queue.run(self, shutdown).await;
        info!("SyncManager stopped");
        Ok(())
    }

    pub async fn stop(&mut self) {
        self.queue.close();
        self.supervisor.stop().await;
    }

    /// Derive the configuration from the current cache contents.
    ///
    /// Ingresses that cannot be translated are left out of this generation;
    /// upstreams without backends and the locations pointing at them are
    /// pruned.
    pub async fn build_configuration(&mut self) -> Configuration {
        self.generate().await.0
    }

    /// Build the configuration and report whether any TLS file was rewritten
    #[instrument(skip(self))]
    async fn generate(&mut self) -> (Configuration, bool) {
        let mut builder =
            ConfigBuilder::new(self.settings.clone(), self.credentials_file.as_deref());
        let mut rotated = false;

        for ing in self.cache.esp_ingresses() {
            let (name, version) = match service_config(&ing) {
                Ok(found) => found,
                Err(e) => {
                    warn!("Skipping ingress: {}", e);
                    continue;
                }
            };

            let file = match self
                .config_store
                .get_config(&name, version.as_deref())
                .await
            {
                Ok(file) => file,
                Err(e) => {
                    warn!(
                        "Skipping ingress {}/{}, failed to fetch service config {}: {}",
                        ing.namespace().unwrap_or_default(),
                        ing.name_any(),
                        name,
                        e
                    );
                    continue;
                }
            };

            let tls = tls::materialize(&ing, &self.cache, &self.tls_dir).await;
            rotated |= tls.rotated;
            builder.add_ingress(&ing, &file.display().to_string(), &tls.bindings);
        }

        let mut conf = builder.build();
        resolve_upstreams(&mut conf, &self.cache);
        conf.remove_empty_upstreams();
        conf.remove_stale_locations();
        (conf, rotated)
    }

    /// Rebuild and apply the configuration. Returns whether the proxy was reloaded.
    #[instrument(skip(self))]
    pub async fn sync(&mut self) -> Result<bool> {
        if !self.cache.has_synced() {
            return Err(IngressError::NotSynced);
        }

        let (conf, rotated) = self.generate().await;
        info!(
            "Built configuration with {} upstreams and {} servers",
            conf.upstreams.len(),
            conf.servers.len()
        );
        if rotated {
            info!("TLS material changed, forcing a reload");
            self.supervisor.invalidate();
        }
        self.supervisor.reload(&conf).await
    }
}

impl<R> Process<SyncEvent> for SyncManager<R>
where
    R: ServiceRegistry + Send + Sync,
{
    async fn process(&mut self, event: &SyncEvent) -> Result<()> {
        debug!("Handling {}", event);
        match self.sync().await {
            Ok(_) => Ok(()),
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                error!("Sync after {} failed: {}", event, e);
                Ok(())
            }
        }
    }
}

/// Enqueue a [`SyncEvent::Resync`] every `period` until `shutdown` fires.
/// A zero period disables the resync.
pub async fn resync_loop(
    handle: SyncManagerHandle,
    period: Duration,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    if period.is_zero() {
        info!("Periodic resync disabled");
        return Ok(());
    }

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => handle.enqueue(SyncEvent::Resync),
            _ = shutdown.cancelled() => break,
        }
    }
    Ok(())
}
