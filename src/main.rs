// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use clap::Parser;
use k8s_openapi::api::core::v1::{Endpoints, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use esp_ingress::cache::ClusterCache;
use esp_ingress::config::Config;
use esp_ingress::kubernetes::{api, check_connectivity, create_client};
use esp_ingress::proxy::{ProxySupervisor, Template};
use esp_ingress::registry::{ConfigStore, HttpRegistry};
use esp_ingress::sync::{resync_loop, SyncManager};
use esp_ingress::watchers::ResourceWatcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting ESP Ingress controller");

    // Load configuration
    let config = Config::parse();
    info!(
        "Configuration loaded: namespace={:?}, ingress_class={}, resync={}s",
        config.namespace, config.ingress_class, config.resync_secs
    );

    // Create Kubernetes client
    let client = create_client(&config).await?;
    check_connectivity(&client).await?;

    let template = match &config.template {
        Some(path) => Template::from_file(path).await?,
        None => Template::builtin(),
    };
    let supervisor = ProxySupervisor::new(&config, template);
    let config_store = ConfigStore::new(HttpRegistry::new(&config)?, &config.service_config_dir);

    let (cache, writers) = ClusterCache::new(&config.ingress_class);
    let (mut sync_manager, sync_handle) =
        SyncManager::new(cache.clone(), config_store, supervisor, &config);

    let ingress_watcher = ResourceWatcher::new(writers.ingresses, cache.clone(), sync_handle.clone());
    let secret_watcher = ResourceWatcher::new(writers.secrets, cache.clone(), sync_handle.clone());
    let endpoints_watcher =
        ResourceWatcher::new(writers.endpoints, cache.clone(), sync_handle.clone());
    let service_watcher = ResourceWatcher::new(writers.services, cache, sync_handle.clone());

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    sync_manager.start().await?;

    info!("Starting watchers...");

    // Run the sync worker, the watchers and the resync ticker until shutdown
    let result = tokio::try_join!(
        sync_manager.run(shutdown.clone()),
        ingress_watcher.run(api::<Ingress>(&client, &config.namespace), shutdown.clone()),
        secret_watcher.run(api::<Secret>(&client, &config.namespace), shutdown.clone()),
        endpoints_watcher.run(api::<Endpoints>(&client, &config.namespace), shutdown.clone()),
        service_watcher.run(api::<Service>(&client, &config.namespace), shutdown.clone()),
        resync_loop(sync_handle, config.resync_period(), shutdown),
    );

    sync_manager.stop().await;
    if let Err(e) = &result {
        warn!("Controller stopped with an error: {}", e);
    }
    result?;

    info!("ESP Ingress controller stopped");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
