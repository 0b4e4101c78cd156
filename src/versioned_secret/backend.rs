// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Storage backends for versioned secrets.

use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{ApiResource, DeleteParams, DynamicObject, ListParams, PostParams},
    core::ErrorResponse,
    Api, Client, ResourceExt,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Operations the versioned secret store needs from the object store.
///
/// A missing object is reported as [`Error::NotFound`], everything else is
/// passed through as [`Error::Backend`].
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Create a secret, failing if one with the same name exists
    async fn create(&self, secret: &Secret) -> Result<Secret>;
    async fn get(&self, namespace: &str, name: &str) -> Result<Secret>;
    /// Replace an existing secret
    async fn update(&self, secret: &Secret) -> Result<Secret>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
    /// All secrets in `namespace` carrying every label in `labels`
    async fn list(&self, namespace: &str, labels: &BTreeMap<String, String>) -> Result<Vec<Secret>>;
}

/// Render labels as an equality-based label selector
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Backend using the typed `Secret` API
#[derive(Clone)]
pub struct ClientBackend {
    client: Client,
}

impl ClientBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretBackend for ClientBackend {
    async fn create(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.namespace().unwrap_or_default();
        self.api(&namespace)
            .create(&PostParams::default(), secret)
            .await
            .map_err(|e| Error::from_kube("create", &namespace, &secret.name_any(), e))
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.api(namespace)
            .get(name)
            .await
            .map_err(|e| Error::from_kube("get", namespace, name, e))
    }

    async fn update(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        self.api(&namespace)
            .replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|e| Error::from_kube("update", &namespace, &name, e))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| Error::from_kube("delete", namespace, name, e))
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>> {
        let selector = label_selector(labels);
        let list = self
            .api(namespace)
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| Error::from_kube_list(namespace, &selector, e))?;
        Ok(list.items)
    }
}

/// Backend going through the untyped dynamic API
#[derive(Clone)]
pub struct DynamicBackend {
    client: Client,
    resource: ApiResource,
}

impl DynamicBackend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resource: ApiResource::erase::<Secret>(&()),
        }
    }

    fn api(&self, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &self.resource)
    }
}

fn to_dynamic(secret: &Secret) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(secret)?)?)
}

fn from_dynamic(object: DynamicObject) -> Result<Secret> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

#[async_trait]
impl SecretBackend for DynamicBackend {
    async fn create(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.namespace().unwrap_or_default();
        let object = self
            .api(&namespace)
            .create(&PostParams::default(), &to_dynamic(secret)?)
            .await
            .map_err(|e| Error::from_kube("create", &namespace, &secret.name_any(), e))?;
        from_dynamic(object)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Secret> {
        let object = self
            .api(namespace)
            .get(name)
            .await
            .map_err(|e| Error::from_kube("get", namespace, name, e))?;
        from_dynamic(object)
    }

    async fn update(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        let object = self
            .api(&namespace)
            .replace(&name, &PostParams::default(), &to_dynamic(secret)?)
            .await
            .map_err(|e| Error::from_kube("update", &namespace, &name, e))?;
        from_dynamic(object)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| Error::from_kube("delete", namespace, name, e))
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>> {
        let selector = label_selector(labels);
        let list = self
            .api(namespace)
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| Error::from_kube_list(namespace, &selector, e))?;
        list.items.into_iter().map(from_dynamic).collect()
    }
}

/// Backend keeping secrets in memory, with the API server's create, update
/// and not-found semantics. Meant for tests of code using the store.
#[derive(Default)]
pub struct InMemoryBackend {
    secrets: Mutex<BTreeMap<(String, String), Secret>>,
    revision: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a secret into the store as-is, bypassing create semantics
    pub fn insert(&self, secret: Secret) {
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        self.secrets().insert(key, secret);
    }

    /// Number of secrets held in `namespace`
    pub fn count(&self, namespace: &str) -> usize {
        self.secrets()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .count()
    }

    fn secrets(&self) -> MutexGuard<'_, BTreeMap<(String, String), Secret>> {
        self.secrets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_revision(&self) -> String {
        (self.revision.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }
}

fn api_error(
    operation: &'static str,
    namespace: &str,
    name: &str,
    code: u16,
    reason: &str,
) -> Error {
    let source = kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("secrets \"{}\" {}", name, reason),
        reason: reason.to_string(),
        code,
    });
    Error::from_kube(operation, namespace, name, source)
}

#[async_trait]
impl SecretBackend for InMemoryBackend {
    async fn create(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        let mut secrets = self.secrets();

        let key = (namespace.clone(), name.clone());
        if secrets.contains_key(&key) {
            return Err(api_error("create", &namespace, &name, 409, "AlreadyExists"));
        }

        let revision = self.next_revision();
        let mut stored = secret.clone();
        stored.metadata.uid = Some(format!("uid-{}", revision));
        stored.metadata.resource_version = Some(revision);
        debug!("In-memory backend created secret {}/{}", namespace, name);
        secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn update(&self, secret: &Secret) -> Result<Secret> {
        let namespace = secret.namespace().unwrap_or_default();
        let name = secret.name_any();
        let mut secrets = self.secrets();

        let key = (namespace.clone(), name.clone());
        let Some(current) = secrets.get(&key) else {
            return Err(Error::NotFound { namespace, name });
        };
        if let Some(expected) = &secret.metadata.resource_version {
            if current.metadata.resource_version.as_ref() != Some(expected) {
                return Err(api_error("update", &namespace, &name, 409, "Conflict"));
            }
        }

        let mut stored = secret.clone();
        stored.metadata.uid = current.metadata.uid.clone();
        stored.metadata.resource_version = Some(self.next_revision());
        secrets.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        self.secrets()
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>> {
        Ok(self
            .secrets()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, secret)| secret)
            .filter(|secret| {
                let have = secret.labels();
                labels.iter().all(|(k, v)| have.get(k) == Some(v))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        failure_json, not_found_json, secret_json, secret_list_json, success_json, MockService,
    };
    use kube::api::ObjectMeta;

    fn make_secret(namespace: &str, name: &str, labels: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn selector(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_label_selector() {
        assert_eq!(label_selector(&selector(&[("b", "2"), ("a", "1")])), "a=1,b=2");
        assert_eq!(label_selector(&BTreeMap::new()), "");
    }

    #[tokio::test]
    async fn test_in_memory_create_is_create_if_absent() {
        let backend = InMemoryBackend::new();
        let created = backend.create(&make_secret("ns1", "db-v1", &[])).await.unwrap();
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let err = backend.create(&make_secret("ns1", "db-v1", &[])).await.unwrap_err();
        assert!(matches!(err, Error::Backend { operation: "create", .. }));

        backend.create(&make_secret("ns2", "db-v1", &[])).await.unwrap();
        assert_eq!(backend.count("ns1"), 1);
        assert_eq!(backend.count("ns2"), 1);
    }

    #[tokio::test]
    async fn test_in_memory_get_and_delete_not_found() {
        let backend = InMemoryBackend::new();
        assert!(backend.get("ns1", "db-v1").await.unwrap_err().is_not_found());
        assert!(backend.delete("ns1", "db-v1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_in_memory_update_checks_resource_version() {
        let backend = InMemoryBackend::new();
        let created = backend.create(&make_secret("ns1", "db-v1", &[])).await.unwrap();

        let mut fresh = created.clone();
        fresh.labels_mut().insert("deployed".to_string(), "true".to_string());
        let updated = backend.update(&fresh).await.unwrap();
        assert_eq!(updated.metadata.uid, created.metadata.uid);

        // the first copy is now stale
        let err = backend.update(&created).await.unwrap_err();
        assert!(matches!(err, Error::Backend { operation: "update", .. }));

        let missing = make_secret("ns1", "db-v9", &[]);
        assert!(backend.update(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_in_memory_list_filters_namespace_and_labels() {
        let backend = InMemoryBackend::new();
        backend.insert(make_secret("ns1", "a-v1", &[("kind", "versioned")]));
        backend.insert(make_secret("ns1", "b", &[("kind", "plain")]));
        backend.insert(make_secret("ns2", "a-v1", &[("kind", "versioned")]));

        let found = backend.list("ns1", &selector(&[("kind", "versioned")])).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name_any(), "a-v1");

        assert_eq!(backend.list("ns1", &BTreeMap::new()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_client_backend_get() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/ns1/secrets/db-v1",
                200,
                &secret_json("ns1", "db-v1", &[("secret-kind", "versionedSecret")]),
            )
            .into_client();
        let backend = ClientBackend::new(client);

        let secret = backend.get("ns1", "db-v1").await.unwrap();
        assert_eq!(secret.name_any(), "db-v1");
        assert_eq!(secret.labels().get("secret-kind").unwrap(), "versionedSecret");
    }

    #[tokio::test]
    async fn test_client_backend_maps_404_to_not_found() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/ns1/secrets/db-v1",
                404,
                &not_found_json("secrets", "db-v1"),
            )
            .into_client();
        let backend = ClientBackend::new(client);

        assert!(backend.get("ns1", "db-v1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_client_backend_list() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/ns1/secrets",
                200,
                &secret_list_json(&[
                    secret_json("ns1", "db-v1", &[]),
                    secret_json("ns1", "db-v2", &[]),
                ]),
            )
            .into_client();
        let backend = ClientBackend::new(client);

        let secrets = backend.list("ns1", &selector(&[("a", "b")])).await.unwrap();
        let names: Vec<_> = secrets.iter().map(|s| s.name_any()).collect();
        assert_eq!(names, vec!["db-v1", "db-v2"]);
    }

    #[tokio::test]
    async fn test_dynamic_backend_create_and_list() {
        let client = MockService::new()
            .on_post(
                "/api/v1/namespaces/ns1/secrets",
                201,
                &secret_json("ns1", "db-v1", &[("secret-kind", "versionedSecret")]),
            )
            .on_get(
                "/api/v1/namespaces/ns1/secrets",
                200,
                &secret_list_json(&[secret_json("ns1", "db-v1", &[])]),
            )
            .into_client();
        let backend = DynamicBackend::new(client);

        let created = backend.create(&make_secret("ns1", "db-v1", &[])).await.unwrap();
        assert_eq!(created.name_any(), "db-v1");
        assert_eq!(created.labels().get("secret-kind").unwrap(), "versionedSecret");

        let listed = backend.list("ns1", &BTreeMap::new()).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_dynamic_backend_maps_404_to_not_found() {
        let client = MockService::new().into_client();
        let backend = DynamicBackend::new(client);

        assert!(backend.get("ns1", "missing-v1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_client_backend_create() {
        let mock = MockService::new().on_post(
            "/api/v1/namespaces/ns1/secrets",
            201,
            &secret_json("ns1", "db-v1", &[("secret-kind", "versionedSecret")]),
        );
        let backend = ClientBackend::new(mock.clone().into_client());

        let created = backend.create(&make_secret("ns1", "db-v1", &[])).await.unwrap();

        assert_eq!(created.name_any(), "db-v1");
        assert_eq!(created.metadata.uid.as_deref(), Some("test-uid"));
        assert_eq!(mock.requests_with("POST"), vec!["/api/v1/namespaces/ns1/secrets"]);
    }

    #[tokio::test]
    async fn test_client_backend_create_conflict() {
        let client = MockService::new()
            .on_post(
                "/api/v1/namespaces/ns1/secrets",
                409,
                &failure_json(409, "AlreadyExists", "secrets \"db-v1\" already exists"),
            )
            .into_client();
        let backend = ClientBackend::new(client);

        let err = backend.create(&make_secret("ns1", "db-v1", &[])).await.unwrap_err();

        match err {
            Error::Backend {
                operation, name, ..
            } => {
                assert_eq!(operation, "create");
                assert_eq!(name, "db-v1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_backend_update() {
        let mock = MockService::new().on_put(
            "/api/v1/namespaces/ns1/secrets/db-v1",
            200,
            &secret_json("ns1", "db-v1", &[("deployed", "true")]),
        );
        let backend = ClientBackend::new(mock.clone().into_client());

        let updated = backend
            .update(&make_secret("ns1", "db-v1", &[("deployed", "true")]))
            .await
            .unwrap();

        assert_eq!(updated.labels().get("deployed").unwrap(), "true");
        assert_eq!(mock.requests_with("PUT"), vec!["/api/v1/namespaces/ns1/secrets/db-v1"]);
    }

    #[tokio::test]
    async fn test_client_backend_update_missing() {
        let backend = ClientBackend::new(MockService::new().into_client());

        let err = backend.update(&make_secret("ns1", "db-v9", &[])).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_client_backend_delete() {
        let mock = MockService::new()
            .on_delete("/api/v1/namespaces/ns1/secrets/db-v1", 200, &success_json());
        let backend = ClientBackend::new(mock.clone().into_client());

        backend.delete("ns1", "db-v1").await.unwrap();
        assert!(backend.delete("ns1", "db-v2").await.unwrap_err().is_not_found());

        assert_eq!(
            mock.requests_with("DELETE"),
            vec![
                "/api/v1/namespaces/ns1/secrets/db-v1",
                "/api/v1/namespaces/ns1/secrets/db-v2"
            ]
        );
    }

    #[tokio::test]
    async fn test_client_backend_list_error_names_selector() {
        let client = MockService::new()
            .on_get(
                "/api/v1/namespaces/ns1/secrets",
                500,
                &failure_json(500, "InternalError", "etcd unavailable"),
            )
            .into_client();
        let backend = ClientBackend::new(client);

        let err = backend
            .list("ns1", &selector(&[("kind", "versioned")]))
            .await
            .unwrap_err();

        match err {
            Error::List {
                namespace,
                selector,
                ..
            } => {
                assert_eq!(namespace, "ns1");
                assert_eq!(selector, "kind=versioned");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dynamic_backend_update_and_delete() {
        let mock = MockService::new()
            .on_put(
                "/api/v1/namespaces/ns1/secrets/db-v1",
                200,
                &secret_json("ns1", "db-v1", &[("deployed", "true")]),
            )
            .on_delete("/api/v1/namespaces/ns1/secrets/db-v1", 200, &success_json());
        let backend = DynamicBackend::new(mock.clone().into_client());

        let updated = backend
            .update(&make_secret("ns1", "db-v1", &[("deployed", "true")]))
            .await
            .unwrap();
        assert_eq!(updated.labels().get("deployed").unwrap(), "true");
        assert_eq!(
            updated.data.unwrap()["password"],
            k8s_openapi::ByteString(b"secret123".to_vec())
        );

        backend.delete("ns1", "db-v1").await.unwrap();
        assert!(backend.delete("ns1", "db-v2").await.unwrap_err().is_not_found());
        assert_eq!(mock.requests_with("PUT").len(), 1);
        assert_eq!(mock.requests_with("DELETE").len(), 2);
    }

    #[tokio::test]
    async fn test_dynamic_backend_update_conflict() {
        let client = MockService::new()
            .on_put(
                "/api/v1/namespaces/ns1/secrets/db-v1",
                409,
                &failure_json(409, "Conflict", "the object has been modified"),
            )
            .into_client();
        let backend = DynamicBackend::new(client);

        let err = backend.update(&make_secret("ns1", "db-v1", &[])).await.unwrap_err();

        assert!(matches!(err, Error::Backend { operation: "update", .. }));
    }
}
