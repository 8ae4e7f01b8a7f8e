// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ingress annotation accessors

use crate::constants::annotations;
use crate::error::{IngressError, Result};
use crate::types::Protocol;
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use tracing::warn;

fn annotation<'a>(ing: &'a Ingress, key: &str) -> Option<&'a str> {
    ing.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(|v| v.as_str())
}

/// Check if an ingress carries the controller's class annotation
pub fn is_esp_ingress(ing: &Ingress, class: &str) -> bool {
    annotation(ing, annotations::INGRESS_CLASS) == Some(class)
}

/// Backend protocol of every upstream of the ingress, `http` when unset or unknown
pub fn backend_protocol(ing: &Ingress) -> Protocol {
    match annotation(ing, annotations::BACKEND_PROTOCOL) {
        None => Protocol::Http,
        Some(value) => Protocol::parse(value).unwrap_or_else(|| {
            warn!(
                "Unsupported service backend protocol {:?} on ingress {}/{}, using http",
                value,
                ing.namespace().unwrap_or_default(),
                ing.name_any()
            );
            Protocol::Http
        }),
    }
}

/// Service config name and version; a missing version selects the latest config
pub fn service_config(ing: &Ingress) -> Result<(String, Option<String>)> {
    let name = annotation(ing, annotations::SERVICE_NAME).ok_or_else(|| {
        IngressError::MissingAnnotation {
            namespace: ing.namespace().unwrap_or_default(),
            name: ing.name_any(),
            annotation: annotations::SERVICE_NAME,
        }
    })?;

    let version = match annotation(ing, annotations::SERVICE_CONFIG_ID) {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => {
            warn!(
                "Missing service config ID for ingress {}/{}, using the latest",
                ing.namespace().unwrap_or_default(),
                ing.name_any()
            );
            None
        }
    };

    Ok((name.to_string(), version))
}

pub fn strip_prefix(ing: &Ingress) -> bool {
    annotation(ing, annotations::STRIP_PREFIX).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}
