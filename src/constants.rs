// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Ingress annotation keys consumed by the controller
pub mod annotations {
    /// Selects an Ingress into scope when equal to the controller's class
    pub const INGRESS_CLASS: &str = "kubernetes.io/ingress.class";
    /// One of `http`, `https`, `grpc`
    pub const BACKEND_PROTOCOL: &str = "googleapis.com/backend-protocol";
    pub const SERVICE_NAME: &str = "googleapis.com/service-name";
    pub const SERVICE_CONFIG_ID: &str = "googleapis.com/service-config-id";
    /// `"true"` (any case) strips the location prefix before proxying
    pub const STRIP_PREFIX: &str = "googleapis.com/strip-prefix";
}

/// Work queue pacing
pub mod queue {
    use std::time::Duration;

    /// Delay before a failed work item is processed again
    pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);
    /// Retry limit meaning a failed item is retried until it succeeds or
    /// the queue closes
    pub const RETRY_FOREVER: Option<u32> = None;
    /// Retries of one failed work item before it is dropped
    pub const MAX_RETRIES: Option<u32> = RETRY_FOREVER;
    /// Sustained processing rate (items per second)
    pub const RATE_LIMIT_QPS: f64 = 10.0;
    /// Maximum burst of items processed without waiting
    pub const RATE_LIMIT_BURST: u32 = 100;
}

/// Failure thresholds attached to every resolved backend
pub mod backend {
    pub const MAX_FAILS: u32 = 0;
    pub const FAIL_TIMEOUT_SECS: u32 = 0;
}

/// Listener ports of generated servers
pub mod ports {
    pub const HTTP: u16 = 80;
    pub const SSL: u16 = 443;
}

/// Keys of a `kubernetes.io/tls` secret
pub mod tls {
    pub const CERT_KEY: &str = "tls.crt";
    pub const PRIVATE_KEY_KEY: &str = "tls.key";
}
