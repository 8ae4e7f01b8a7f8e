// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! List+watch loops feeding the caches and the sync queue.
//!
//! One [`ResourceWatcher`] runs per watched kind. It applies every API
//! event to its cache, and enqueues a [`SyncEvent`] only for relevant
//! objects whose content actually changed.

pub mod endpoints;
pub mod ingress;
pub mod secret;
pub mod service;

use crate::cache::{CacheWriter, ClusterCache};
use crate::sync::{ResourceEvent, SyncEvent, SyncManagerHandle};
use futures::{StreamExt, TryStreamExt};
use kube::runtime::reflector::{store::Writer, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Resource, ResourceExt};
use kube_runtime::watcher::Config as WatcherConfig;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A resource kind the controller watches
pub trait Watched:
    Resource<DynamicType = ()> + Clone + PartialEq + DeserializeOwned + Debug + Send + Sync + 'static
{
    /// Whether a change to this object can affect the generated configuration
    fn is_relevant(&self, cache: &ClusterCache) -> bool;

    fn to_event(event: ResourceEvent<Self>) -> SyncEvent;
}

pub struct ResourceWatcher<K: Watched> {
    writer: Writer<K>,
    reader: Store<K>,
    synced: Arc<AtomicBool>,
    cache: ClusterCache,
    handle: SyncManagerHandle,
}

impl<K: Watched> ResourceWatcher<K> {
    pub fn new(cache_writer: CacheWriter<K>, cache: ClusterCache, handle: SyncManagerHandle) -> Self {
        let reader = cache_writer.writer.as_reader();
        Self {
            writer: cache_writer.writer,
            reader,
            synced: cache_writer.synced,
            cache,
            handle,
        }
    }

    /// Apply one watch event to the cache and enqueue it when relevant
    pub fn handle(&mut self, event: watcher::Event<K>) {
        let kind = K::kind(&());
        match &event {
            watcher::Event::Init => {
                debug!("{} list started", kind);
                self.writer.apply_watcher_event(&event);
            }
            watcher::Event::InitDone => {
                self.writer.apply_watcher_event(&event);
                if !self.synced.swap(true, Ordering::SeqCst) {
                    info!("{} cache synced", kind);
                }
                // objects removed while the watch was down vanish without a delete
                self.handle.enqueue(SyncEvent::Resync);
            }
            watcher::Event::Apply(obj) | watcher::Event::InitApply(obj) => {
                let old = self.reader.get(&ObjectRef::from_obj(obj));
                self.writer.apply_watcher_event(&event);

                let new = Arc::new(obj.clone());
                let change = match old {
                    Some(old) if *old == *obj => {
                        debug!("{} {} unchanged", kind, describe(obj));
                        return;
                    }
                    Some(old) => {
                        if !obj.is_relevant(&self.cache) && !old.is_relevant(&self.cache) {
                            return;
                        }
                        ResourceEvent::Updated(new)
                    }
                    None => {
                        if !obj.is_relevant(&self.cache) {
                            return;
                        }
                        ResourceEvent::Added(new)
                    }
                };
                self.handle.enqueue(K::to_event(change));
            }
            watcher::Event::Delete(obj) => {
                self.writer.apply_watcher_event(&event);
                if obj.is_relevant(&self.cache) {
                    self.handle
                        .enqueue(K::to_event(ResourceEvent::Deleted(Arc::new(obj.clone()))));
                }
            }
        }
    }

    /// Watch `api` until `shutdown` fires. Watch errors are retried with backoff.
    pub async fn run(mut self, api: Api<K>, shutdown: CancellationToken) -> anyhow::Result<()> {
        let kind = K::kind(&());
        info!("Starting {} watcher", kind);

        let mut stream = watcher::watcher(api, WatcherConfig::default())
            .default_backoff()
            .boxed();

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = stream.try_next() => event,
            };
            match event {
                Ok(Some(event)) => self.handle(event),
                Ok(None) => {
                    warn!("{} watch stream ended", kind);
                    break;
                }
                Err(e) => warn!("{} watch failed: {}", kind, e),
            }
        }

        info!("{} watcher stopped", kind);
        Ok(())
    }
}

fn describe<K: Resource>(obj: &K) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}
