// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::cache::ClusterCache;
use crate::sync::{ResourceEvent, SyncEvent};
use crate::watchers::Watched;
use k8s_openapi::api::core::v1::Secret;

/// Secrets matter only as TLS material of an in-scope ingress
impl Watched for Secret {
    fn is_relevant(&self, cache: &ClusterCache) -> bool {
        cache.references_secret(self)
    }

    fn to_event(event: ResourceEvent<Self>) -> SyncEvent {
        SyncEvent::Secret(event)
    }
}
