// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::ProxySettings;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Controller configuration loaded from flags, with environment fallbacks
#[derive(Parser, Debug, Clone)]
#[command(name = "esp-ingress", about = "ESP Ingress controller")]
pub struct Config {
    /// Namespace to watch for ingresses (empty watches all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Use the in-cluster service account instead of a kubeconfig
    #[arg(long = "cluster", env = "IN_CLUSTER", default_value_t = true, action = clap::ArgAction::Set)]
    pub in_cluster: bool,

    /// Period of forced re-synchronization, in seconds
    #[arg(long = "resync", env = "RESYNC_SECONDS", default_value_t = 5)]
    pub resync_secs: u64,

    /// Value of the ingress class annotation selecting ingresses into scope
    #[arg(long, env = "INGRESS_CLASS", default_value = "esp")]
    pub ingress_class: String,

    #[arg(long = "nginx", env = "NGINX_BINARY", default_value = "/usr/sbin/nginx")]
    pub binary: PathBuf,

    #[arg(long = "nginx-conf", env = "NGINX_CONF", default_value = "/etc/nginx/nginx.conf")]
    pub conf_path: PathBuf,

    /// Configuration template; the built-in template is used when absent
    #[arg(long, env = "NGINX_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Directory where fetched service configs are stored
    #[arg(long, env = "SERVICE_CONFIG_DIR", default_value = "/etc/nginx/endpoints")]
    pub service_config_dir: PathBuf,

    /// Directory where TLS material from secrets is stored
    #[arg(long, env = "TLS_DIR", default_value = "/etc/nginx/ssl")]
    pub tls_dir: PathBuf,

    #[arg(
        long,
        env = "REGISTRY_URL",
        default_value = "https://servicemanagement.googleapis.com"
    )]
    pub registry_url: String,

    /// File holding a bearer token for the service registry
    #[arg(long, env = "REGISTRY_TOKEN_FILE")]
    pub registry_token_file: Option<PathBuf>,

    /// Service account credentials passed to every location
    #[arg(long, env = "CREDENTIALS_FILE")]
    pub credentials_file: Option<String>,

    #[arg(long, env = "STATUS_PORT", default_value_t = 8090)]
    pub status_port: u16,

    #[arg(long, env = "METADATA_SERVER", default_value = "http://169.254.169.254")]
    pub metadata_server: String,

    #[arg(long, env = "DNS_RESOLVER", default_value = "8.8.8.8")]
    pub dns_resolver: String,

    #[arg(long, env = "NGINX_PID", default_value = "/var/run/nginx.pid")]
    pub pid_file: String,

    #[arg(long, env = "NGINX_MIME_TYPES", default_value = "/etc/nginx/mime.types")]
    pub mime_types: String,

    /// Number of proxy worker processes, one per CPU by default
    #[arg(long, env = "NGINX_WORKERS", default_value_t = default_worker_processes())]
    pub worker_processes: usize,

    /// Upper bound on a single reload or quit invocation, in seconds
    #[arg(long = "command-timeout", env = "COMMAND_TIMEOUT_SECONDS", default_value_t = 30)]
    pub command_timeout_secs: u64,
}

fn default_worker_processes() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl Config {
    /// Zero disables the periodic resync
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Global settings block of every generated configuration
    pub fn settings(&self) -> ProxySettings {
        ProxySettings {
            status_port: self.status_port,
            metadata_server: self.metadata_server.clone(),
            dns_resolver: self.dns_resolver.clone(),
            access_log: "/dev/stdout".to_string(),
            error_log: "stderr".to_string(),
            use_upstream_resolver: false,
            pid: self.pid_file.clone(),
            mime_types: self.mime_types.clone(),
            num_worker_processes: self.worker_processes,
            platform: std::env::consts::OS.to_string(),
            temp_dir: String::new(),
        }
    }
}
