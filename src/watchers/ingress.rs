// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use crate::cache::ClusterCache;
use crate::sync::annotations::is_esp_ingress;
use crate::sync::{ResourceEvent, SyncEvent};
use crate::watchers::Watched;
use k8s_openapi::api::networking::v1::Ingress;

/// Ingresses are in scope when they carry the controller's class
impl Watched for Ingress {
    fn is_relevant(&self, cache: &ClusterCache) -> bool {
        is_esp_ingress(self, cache.ingress_class())
    }

    fn to_event(event: ResourceEvent<Self>) -> SyncEvent {
        SyncEvent::Ingress(event)
    }
}
