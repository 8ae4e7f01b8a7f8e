// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client construction and API handles.

pub mod client;

pub use client::{check_connectivity, create_client};

use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};

/// Namespaced API handle; an empty namespace spans all namespaces
pub fn api<K>(client: &Client, namespace: &str) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    if namespace.is_empty() {
        Api::all(client.clone())
    } else {
        Api::namespaced(client.clone(), namespace)
    }
}
