// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Materialization of ingress TLS secrets as certificate/key files.

use crate::cache::ClusterCache;
use crate::files::write_if_changed;
use crate::sync::builder::{TlsBindings, TlsFiles};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::path::Path;
use tracing::{info, warn};

/// TLS files of one ingress
#[derive(Debug, Default)]
pub struct TlsMaterial {
    pub bindings: TlsBindings,
    /// Some certificate or key file got new contents. The file names stay
    /// the same, so the proxy only picks them up through a reload.
    pub rotated: bool,
}

/// Write the TLS material referenced by an ingress below `dir` and map
/// every covered host to its files. An entry without hosts covers every
/// rule host of the ingress.
pub async fn materialize(ing: &Ingress, cache: &ClusterCache, dir: &Path) -> TlsMaterial {
    let mut material = TlsMaterial::default();
    let namespace = ing.namespace().unwrap_or_default();
    let Some(spec) = ing.spec.as_ref() else {
        return material;
    };

    for entry in spec.tls.iter().flatten() {
        let Some(secret_name) = entry.secret_name.as_deref() else {
            continue;
        };
        let Some((cert, key)) = cache.tls_data(&namespace, secret_name) else {
            warn!(
                "Secret {}/{} for ingress {} is missing or lacks tls.crt/tls.key",
                namespace,
                secret_name,
                ing.name_any()
            );
            continue;
        };

        let cert_path = dir.join(format!("{}-{}.crt", namespace, secret_name));
        let key_path = dir.join(format!("{}-{}.key", namespace, secret_name));
        let mut written = true;
        for (path, contents) in [(&cert_path, &cert), (&key_path, &key)] {
            match write_if_changed(path, contents).await {
                Ok(true) => {
                    info!("Wrote TLS material {}", path.display());
                    material.rotated = true;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to write TLS material {}: {}", path.display(), e);
                    written = false;
                }
            }
        }
        if !written {
            continue;
        }

        let files = TlsFiles {
            certificate: cert_path.display().to_string(),
            key: key_path.display().to_string(),
        };
        let hosts: Vec<String> = match entry.hosts.as_ref() {
            Some(hosts) if !hosts.is_empty() => hosts.clone(),
            _ => spec
                .rules
                .iter()
                .flatten()
                .filter_map(|r| r.host.clone())
                .collect(),
        };
        for host in hosts {
            material.bindings.insert(host, files.clone());
        }
    }

    material
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{apply, ingress_with_tls, secret};

    #[tokio::test]
    async fn test_materialize_writes_files_and_binds_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, mut writers) = ClusterCache::new("esp");
        let ing = ingress_with_tls("bookstore", &["api.example.com"], "bookstore-tls");
        apply(&mut writers.ingresses, ing.clone());
        apply(
            &mut writers.secrets,
            secret("bookstore-tls", "default", Some(("CERT", "KEY"))),
        );

        let material = materialize(&ing, &cache, dir.path()).await;

        assert!(material.rotated);
        let files = material.bindings.get("api.example.com").unwrap();
        assert!(files.certificate.ends_with("default-bookstore-tls.crt"));
        assert_eq!(std::fs::read(&files.certificate).unwrap(), b"CERT");
        assert_eq!(std::fs::read(&files.key).unwrap(), b"KEY");
    }

    #[tokio::test]
    async fn test_rotation_is_reported_only_for_new_contents() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, mut writers) = ClusterCache::new("esp");
        let ing = ingress_with_tls("bookstore", &["api.example.com"], "bookstore-tls");
        apply(
            &mut writers.secrets,
            secret("bookstore-tls", "default", Some(("CERT", "KEY"))),
        );
        assert!(materialize(&ing, &cache, dir.path()).await.rotated);
        assert!(!materialize(&ing, &cache, dir.path()).await.rotated);

        apply(
            &mut writers.secrets,
            secret("bookstore-tls", "default", Some(("CERT2", "KEY2"))),
        );
        let material = materialize(&ing, &cache, dir.path()).await;

        assert!(material.rotated);
        let files = material.bindings.get("api.example.com").unwrap();
        assert_eq!(std::fs::read(&files.certificate).unwrap(), b"CERT2");
    }

    #[tokio::test]
    async fn test_materialize_skips_incomplete_secret() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, mut writers) = ClusterCache::new("esp");
        let ing = ingress_with_tls("bookstore", &["api.example.com"], "bookstore-tls");
        apply(&mut writers.secrets, secret("bookstore-tls", "default", None));

        let material = materialize(&ing, &cache, dir.path()).await;

        assert!(material.bindings.is_empty());
        assert!(!material.rotated);
    }

    #[tokio::test]
    async fn test_entry_without_hosts_covers_rule_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, mut writers) = ClusterCache::new("esp");
        let ing = ingress_with_tls("bookstore", &[], "bookstore-tls");
        apply(
            &mut writers.secrets,
            secret("bookstore-tls", "default", Some(("CERT", "KEY"))),
        );

        let material = materialize(&ing, &cache, dir.path()).await;

        assert!(material.bindings.contains_key("api.example.com"));
    }
}
