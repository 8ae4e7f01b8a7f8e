// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local cache of fetched service configs.
//!
//! Versioned configs are immutable, so each `(name, version)` is fetched at
//! most once and served from disk afterwards. A request without a version
//! asks for the latest rollout; it is never cached and always re-fetched.
//!
//! The cache is owned by the single sync worker and is not shared between
//! tasks.

use crate::error::{IngressError, Result};
use crate::files::write_if_changed;
use crate::registry::ServiceRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ConfigId {
    name: String,
    version: String,
}

pub struct ConfigStore<R> {
    registry: R,
    root: PathBuf,
    files: HashMap<ConfigId, PathBuf>,
}

impl<R: ServiceRegistry> ConfigStore<R> {
    pub fn new(registry: R, root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            root: root.into(),
            files: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the local copy of a service config, fetching it when needed
    #[instrument(skip(self))]
    pub async fn get_config(&mut self, name: &str, version: Option<&str>) -> Result<PathBuf> {
        let Some(version) = version else {
            return self.fetch_latest(name).await;
        };

        let id = ConfigId {
            name: name.to_string(),
            version: version.to_string(),
        };
        if let Some(file) = self.files.get(&id) {
            return Ok(file.clone());
        }

        let file = self.file_for(name, version)?;
        info!("Fetching service config {}:{}", name, version);
        let document = self.registry.fetch(name, Some(version)).await?;
        write_if_changed(&file, &document).await?;

        self.files.insert(id, file.clone());
        Ok(file)
    }

    async fn fetch_latest(&self, name: &str) -> Result<PathBuf> {
        self.file_for(name, "latest")?;
        info!("Fetching the latest service config of {}", name);
        let document = self.registry.fetch(name, None).await?;

        let parsed: serde_json::Value = serde_json::from_slice(&document)?;
        let version = parsed
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("latest");
        info!("Using the latest service config ID {} for {}", version, name);

        let file = self.file_for(name, version)?;
        write_if_changed(&file, &document).await?;
        Ok(file)
    }

    /// Name and version come from ingress annotations and registry
    /// documents; both must stay a plain file name component
    fn file_for(&self, name: &str, version: &str) -> Result<PathBuf> {
        let plain = |part: &str| {
            !part.is_empty() && !part.contains(['/', '\\']) && !part.contains("..")
        };
        if !plain(name) || !plain(version) {
            return Err(IngressError::UnsafeServiceConfig {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        Ok(self.root.join(format!("{}-{}.json", name, version)))
    }
}
