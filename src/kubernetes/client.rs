// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! API server client creation

use crate::config::Config;
use crate::error::{IngressError, Result};
use kube::{Client, Config as KConfig};
use tracing::{info, instrument};

/// Create a client from the pod's service account, or from the local
/// kubeconfig when running outside the cluster
pub async fn create_client(config: &Config) -> Result<Client> {
    let client_config = if config.in_cluster {
        KConfig::incluster().map_err(|e| {
            IngressError::KubeconfigError(format!("Failed to load in-cluster config: {}", e))
        })?
    } else {
        KConfig::infer()
            .await
            .map_err(|e| IngressError::KubeconfigError(format!("Failed to infer config: {}", e)))?
    };
    info!("Using API server {}", client_config.cluster_url);

    Client::try_from(client_config)
        .map_err(|e| IngressError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Fail fast when the API server is unreachable
#[instrument(skip(client))]
pub async fn check_connectivity(client: &Client) -> Result<()> {
    let version = client.apiserver_version().await?;
    info!(
        "Connected to Kubernetes {}.{} ({})",
        version.major, version.minor, version.git_version
    );
    Ok(())
}
