// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Lifecycle of the external proxy process.
//!
//! The supervisor owns the rendered configuration file. It starts the proxy
//! once, asks it to reload whenever the rendered text changes, and asks it
//! to quit on shutdown. Only the sync worker drives it.

use crate::config::Config;
use crate::error::{IngressError, Result};
use crate::proxy::template::Template;
use crate::types::Configuration;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

pub struct ProxySupervisor {
    binary: PathBuf,
    conf_path: PathBuf,
    template: Template,
    timeout: Duration,
    current: Option<String>,
    child: Option<Child>,
}

impl ProxySupervisor {
    pub fn new(config: &Config, template: Template) -> Self {
        Self {
            binary: config.binary.clone(),
            conf_path: config.conf_path.clone(),
            template,
            timeout: config.command_timeout(),
            current: None,
            child: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Last successfully written configuration text
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Write the configuration unconditionally and launch the proxy.
    /// Does not wait for the proxy to become ready.
    pub async fn run(&mut self, conf: &Configuration) -> Result<()> {
        info!("Starting {}", self.binary.display());
        let text = self.template.render(conf)?;
        self.write(&text).await?;

        let child = Command::new(&self.binary)
            .arg("-c")
            .arg(&self.conf_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;
        debug!("Proxy started with pid {:?}", child.id());
        self.child = Some(child);
        Ok(())
    }

    /// Apply a new configuration. Returns false when the rendered text is
    /// unchanged, in which case neither the file nor the proxy is touched.
    pub async fn reload(&mut self, conf: &Configuration) -> Result<bool> {
        let text = self.template.render(conf)?;
        if self.current.as_deref() == Some(text.as_str()) {
            info!("Configuration is identical, skipping reload");
            return Ok(false);
        }

        info!("Reloading {}", self.binary.display());
        debug!("New configuration:\n{}", text);
        self.write(&text).await?;

        if let Err(e) = self.invoke(&["-s", "reload"]).await {
            error!("Proxy reload failed: {}", e);
            // forget the text so that a retry reloads again
            self.current = None;
            return Err(e);
        }
        Ok(true)
    }

    /// Make the next [`reload`](Self::reload) reach the proxy even when the
    /// rendered text is unchanged, e.g. after files it references were rewritten
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Ask the proxy to quit gracefully. Failures are logged, not returned.
    pub async fn stop(&mut self) {
        info!("Quitting {}", self.binary.display());
        if let Err(e) = self.invoke(&["-s", "quit"]).await {
            error!("Proxy quit failed: {}", e);
        }

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(self.timeout, child.wait()).await {
                Ok(Ok(status)) => info!("Proxy exited with {}", status),
                Ok(Err(e)) => warn!("Failed to wait for the proxy: {}", e),
                Err(_) => {
                    warn!("Proxy did not exit in time, killing it");
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill the proxy: {}", e);
                    }
                }
            }
        }
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        tokio::fs::write(&self.conf_path, text).await?;
        self.current = Some(text.to_string());
        Ok(())
    }

    /// Run the proxy binary with `args` and capture its combined output
    async fn invoke(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(IngressError::ProcessTimeout {
                    command,
                    seconds: self.timeout.as_secs(),
                })
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(IngressError::ProcessFailed {
                command,
                status: output.status,
                output: combined,
            });
        }

        debug!("`{}` succeeded: {}", command, combined.trim());
        Ok(combined)
    }
}
