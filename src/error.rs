// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngressError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to load Kubernetes credentials: {0}")]
    KubeconfigError(String),

    #[error("Deferring sync till watchers have synced")]
    NotSynced,

    #[error("Missing annotation {annotation} on ingress {namespace}/{name}")]
    MissingAnnotation {
        namespace: String,
        name: String,
        annotation: &'static str,
    },

    #[error("Registry request for service config {name}:{version} failed with status {status}")]
    RegistryStatus {
        name: String,
        version: String,
        status: u16,
    },

    #[error("Service config {name}:{version} does not name a file below the config directory")]
    UnsafeServiceConfig { name: String, version: String },

    #[error("Registry transport error: {0}")]
    RegistryError(#[from] reqwest::Error),

    #[error("Invalid registry URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid service config document: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),

    #[error("`{command}` exited with {status}: {output}")]
    ProcessFailed {
        command: String,
        status: ExitStatus,
        output: String,
    },

    #[error("`{command}` did not finish within {seconds}s")]
    ProcessTimeout { command: String, seconds: u64 },
}

impl IngressError {
    /// Failures for which the whole sync pass should be retried by the queue.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngressError::NotSynced
                | IngressError::IoError(_)
                | IngressError::ProcessFailed { .. }
                | IngressError::ProcessTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IngressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_synced_is_retryable() {
        assert!(IngressError::NotSynced.is_retryable());
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = IngressError::ProcessTimeout {
            command: "nginx -s reload".to_string(),
            seconds: 30,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_annotation_is_not_retryable() {
        let err = IngressError::MissingAnnotation {
            namespace: "default".to_string(),
            name: "bookstore".to_string(),
            annotation: "googleapis.com/service-name",
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Missing annotation googleapis.com/service-name on ingress default/bookstore"
        );
    }
}
