// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Service configuration registry client and the local config file cache.

pub mod store;

pub use store::ConfigStore;

use crate::config::Config;
use crate::error::{IngressError, Result};
use bytes::Bytes;
use std::future::Future;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Source of service configuration documents
pub trait ServiceRegistry {
    /// Fetch a config document; `None` selects the latest rollout
    fn fetch(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Service management API over HTTP
pub struct HttpRegistry {
    client: reqwest::Client,
    base: Url,
    token_file: Option<PathBuf>,
}

impl HttpRegistry {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("esp-ingress/", env!("CARGO_PKG_VERSION")))
                .build()?,
            base: Url::parse(&config.registry_url)?,
            token_file: config.registry_token_file.clone(),
        })
    }

    pub fn config_url(&self, name: &str, version: Option<&str>) -> Result<Url> {
        let path = match version {
            Some(version) => format!("v1/services/{}/configs/{}", name, version),
            None => format!("v1/services/{}/config", name),
        };
        Ok(self.base.join(&path)?)
    }
}

impl ServiceRegistry for HttpRegistry {
    async fn fetch(&self, name: &str, version: Option<&str>) -> Result<Bytes> {
        let url = self.config_url(name, version)?;
        debug!("GET {}", url);

        let mut request = self.client.get(url);
        if let Some(path) = &self.token_file {
            // tokens rotate, read on every request
            let token = tokio::fs::read_to_string(path).await?;
            request = request.bearer_auth(token.trim());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngressError::RegistryStatus {
                name: name.to_string(),
                version: version.unwrap_or("latest").to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}
