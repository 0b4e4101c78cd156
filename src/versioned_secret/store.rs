// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Versioned secrets: every change to a secret is persisted as a new,
//! immutable `<name>-v<N>` secret.
//!
//! The greatest version number is the current version. Existing versions are
//! never changed, except for labels added by [`VersionedSecretStore::decorate`].
//! Deleting a versioned secret removes all of its versions.

use super::backend::{ClientBackend, DynamicBackend, SecretBackend};
use super::naming::{
    generate_secret_name, is_versioned_secret, name_prefix, version_from_name, versions_regex,
};
use crate::config::Config;
use crate::constants::{annotations, labels, OWNER_API_VERSION, VERSIONED_SECRET_KIND};
use crate::error::{Error, Result};
use crate::podref;
use k8s_openapi::api::core::v1::{PodSpec, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::{api::ObjectMeta, Client, ResourceExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// The resource whose deletion garbage-collects all versions of a secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub kind: String,
    pub name: String,
    pub uid: String,
}

impl Owner {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }

    fn reference(&self) -> OwnerReference {
        OwnerReference {
            api_version: OWNER_API_VERSION.to_string(),
            kind: self.kind.clone(),
            name: self.name.clone(),
            uid: self.uid.clone(),
            block_owner_deletion: Some(false),
            controller: Some(true),
        }
    }
}

/// Content of a version to be created
#[derive(Debug, Clone, Default)]
pub struct NewVersion {
    /// Name of the versioned secret, without the version suffix
    pub name: String,
    pub data: BTreeMap<String, ByteString>,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    /// Where the content came from, e.g. the resource it was rendered from
    pub source_description: String,
}

impl NewVersion {
    pub fn new(name: impl Into<String>, source_description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_description: source_description.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.data.insert(key.into(), ByteString(value.into()));
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// Versioned secrets on top of a [`SecretBackend`]
#[derive(Clone)]
pub struct VersionedSecretStore {
    backend: Arc<dyn SecretBackend>,
    timeout: Option<Duration>,
}

impl VersionedSecretStore {
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self {
            backend,
            timeout: None,
        }
    }

    /// Store using the typed secret API, with the configured request timeout
    pub fn from_client(client: Client, config: &Config) -> Self {
        Self::new(Arc::new(ClientBackend::new(client))).with_timeout(config.request_timeout())
    }

    /// Store using the dynamic API, with the configured request timeout
    pub fn from_dynamic_client(client: Client, config: &Config) -> Self {
        Self::new(Arc::new(DynamicBackend::new(client))).with_timeout(config.request_timeout())
    }

    /// Fail each backend call that takes longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create the next version of a secret.
    ///
    /// Fails with [`Error::IdenticalContent`] if the latest version already has
    /// the same data, labels and annotations; callers usually treat that as a no-op.
    #[instrument(skip(self, owner, version), fields(name = %version.name))]
    pub async fn create(
        &self,
        namespace: &str,
        owner: &Owner,
        version: NewVersion,
    ) -> Result<Secret> {
        let NewVersion {
            name,
            data,
            mut annotations,
            mut labels,
            source_description,
        } = version;
        annotations.insert(annotations::SOURCE_DESCRIPTION.to_string(), source_description);

        // Reject names the API server would refuse before touching the backend
        generate_secret_name(&name, 1)?;

        let versions = self.list(namespace, &name).await?;
        let greatest = greatest_version(&versions);

        if let Some(latest) = versions.into_iter().find(|s| version_of(s) == Some(greatest)) {
            if is_identical(&latest, &data, &labels, &annotations) {
                debug!("Latest version {} is identical, not creating a new one", latest.name_any());
                return Err(Error::IdenticalContent(Box::new(latest)));
            }
        }

        let next = greatest + 1;
        let secret_name = generate_secret_name(&name, next)?;
        labels.insert(labels::SECRET_VERSION.to_string(), next.to_string());
        labels.insert(labels::SECRET_KIND.to_string(), VERSIONED_SECRET_KIND.to_string());

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.clone()),
                namespace: Some(namespace.to_string()),
                labels: Some(labels),
                annotations: Some(annotations),
                owner_references: Some(vec![owner.reference()]),
                ..Default::default()
            },
            data: Some(data),
            ..Default::default()
        };

        let created = self
            .call("create", namespace, &secret_name, self.backend.create(&secret))
            .await?;
        info!("Created versioned secret {}/{}", namespace, secret_name);
        Ok(created)
    }

    /// A specific version of a secret
    pub async fn get(&self, namespace: &str, name: &str, version: u64) -> Result<Secret> {
        let secret_name = generate_secret_name(name, version)?;
        self.call("get", namespace, &secret_name, self.backend.get(namespace, &secret_name))
            .await
    }

    /// The version with the greatest version number
    #[instrument(skip(self))]
    pub async fn latest(&self, namespace: &str, name: &str) -> Result<Secret> {
        let greatest = greatest_version(&self.list(namespace, name).await?);
        if greatest == 0 {
            return Err(Error::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        self.get(namespace, name, greatest).await
    }

    /// All versions of a secret, in backend order
    pub async fn list(&self, namespace: &str, name: &str) -> Result<Vec<Secret>> {
        let selector = BTreeMap::from([(
            labels::SECRET_KIND.to_string(),
            VERSIONED_SECRET_KIND.to_string(),
        )]);
        let secrets = self
            .call("list", namespace, name, self.backend.list(namespace, &selector))
            .await?;

        // Label selectors can't match on names, so filter the versions of this secret here
        let ours = versions_regex(name);
        Ok(secrets
            .into_iter()
            .filter(|s| ours.is_match(&s.name_any()))
            .collect())
    }

    pub async fn version_count(&self, namespace: &str, name: &str) -> Result<usize> {
        Ok(self.list(namespace, name).await?.len())
    }

    /// Set a label on the latest version, in place
    #[instrument(skip(self))]
    pub async fn decorate(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<()> {
        let mut secret = self.latest(namespace, name).await?;
        secret
            .labels_mut()
            .insert(key.to_string(), value.to_string());

        let secret_name = secret.name_any();
        self.call("update", namespace, &secret_name, self.backend.update(&secret))
            .await?;
        debug!("Decorated {}/{} with label {}={}", namespace, secret_name, key, value);
        Ok(())
    }

    /// Delete all versions of a secret.
    ///
    /// Versions that are already gone are skipped, so a failed delete can be
    /// retried. The first other failure stops the deletion.
    #[instrument(skip(self))]
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let versions = self.list(namespace, name).await?;
        let mut deleted = 0;

        for secret in &versions {
            let secret_name = secret.name_any();
            let removal = self.backend.delete(namespace, &secret_name);
            match self.call("delete", namespace, &secret_name, removal).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => {
                    debug!("Version {}/{} already deleted", namespace, secret_name);
                }
                Err(e) => {
                    return Err(Error::PartialDelete {
                        namespace: namespace.to_string(),
                        name: name.to_string(),
                        deleted,
                        source: Box::new(e),
                    });
                }
            }
        }

        info!("Deleted {} versions of {}/{}", deleted, namespace, name);
        Ok(())
    }

    /// Point versioned secret references in `spec` at the latest versions.
    ///
    /// Only the pod spec is changed, nothing is persisted.
    #[instrument(skip(self, spec))]
    pub async fn set_secret_references(&self, namespace: &str, spec: &mut PodSpec) -> Result<()> {
        for referenced in podref::secret_names(spec) {
            let prefix = name_prefix(&referenced);
            if prefix.is_empty() {
                continue;
            }

            let latest = match self.latest(namespace, &prefix).await {
                Ok(latest) => latest,
                Err(e) if e.is_not_found() => {
                    debug!("Versioned secret {}/{} doesn't exist yet", namespace, prefix);
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !is_versioned_secret(&latest) {
                continue;
            }

            let latest_name = latest.name_any();
            if latest_name != referenced {
                let replaced = podref::replace_secret_name(spec, &referenced, &latest_name);
                debug!("Replaced {} references of {} with {}", replaced, referenced, latest_name);
            }
        }

        Ok(())
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        namespace: &str,
        name: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let Some(timeout) = self.timeout else {
            return fut.await;
        };
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| Error::Timeout {
                operation,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?
    }
}

fn version_of(secret: &Secret) -> Option<u64> {
    version_from_name(&secret.name_any()).ok()
}

fn greatest_version(versions: &[Secret]) -> u64 {
    versions.iter().filter_map(version_of).max().unwrap_or(0)
}

fn is_identical(
    latest: &Secret,
    data: &BTreeMap<String, ByteString>,
    labels: &BTreeMap<String, String>,
    annotations: &BTreeMap<String, String>,
) -> bool {
    let empty = BTreeMap::new();
    let latest_data = latest.data.as_ref().unwrap_or(&empty);

    let reserved = |k: &str| k == labels::SECRET_VERSION || k == labels::SECRET_KIND;
    let transient = |k: &str| k == annotations::LAST_RECONCILE;

    latest_data == data
        && same_entries(latest.labels(), labels, reserved)
        && same_entries(latest.annotations(), annotations, transient)
}

/// Compare two maps, ignoring keys matched by `ignore`
fn same_entries(
    a: &BTreeMap<String, String>,
    b: &BTreeMap<String, String>,
    ignore: impl Fn(&str) -> bool,
) -> bool {
    let relevant = |m: &BTreeMap<String, String>| {
        m.iter()
            .filter(|(k, _)| !ignore(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>()
    };
    relevant(a) == relevant(b)
}
