// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::cache::ClusterCache;
use crate::sync::{ResourceEvent, SyncEvent};
use crate::watchers::Watched;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;

impl Watched for Service {
    fn is_relevant(&self, cache: &ClusterCache) -> bool {
        cache.references_service(&self.namespace().unwrap_or_default(), &self.name_any())
    }

    fn to_event(event: ResourceEvent<Self>) -> SyncEvent {
        SyncEvent::Service(event)
    }
}
