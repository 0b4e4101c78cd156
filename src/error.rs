// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Secret '{namespace}/{name}' not found")]
    NotFound { namespace: String, name: String },

    #[error(
        "The latest version of the versioned secret '{}/{}' is identical to the one to be created",
        .0.namespace().unwrap_or_default(),
        .0.name_any()
    )]
    IdenticalContent(Box<Secret>),

    #[error(
        "Secret name exceeds maximum number of allowed characters \
         (actual={actual}, allowed={allowed})"
    )]
    NameTooLong { actual: usize, allowed: usize },

    #[error(
        "Secret name '{0}' contains invalid characters, only lower case alphanumerics, \
         dot and dash are allowed and it must start with an alphanumeric"
    )]
    InvalidCharacter(String),

    #[error("Invalid secret name '{0}', it does not match the naming schema <name>-v<version>")]
    MalformedName(String),

    #[error("Secret '{name}' has an invalid version label: {reason}")]
    InvalidVersionLabel { name: String, reason: String },

    #[error("Failed to {operation} secret '{namespace}/{name}': {source}")]
    Backend {
        operation: &'static str,
        namespace: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to list secrets in '{namespace}' with selector '{selector}': {source}")]
    List {
        namespace: String,
        selector: String,
        #[source]
        source: kube::Error,
    },

    #[error(
        "Deleting versions of '{namespace}/{name}' stopped after {deleted} deletions: {source}"
    )]
    PartialDelete {
        namespace: String,
        name: String,
        deleted: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Timed out trying to {operation} secret '{namespace}/{name}'")]
    Timeout {
        operation: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Failed to convert secret: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for a missing record, either reported by the API server or by the store itself.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True when `create` skipped a new version because nothing changed.
    pub fn is_identical_content(&self) -> bool {
        matches!(self, Error::IdenticalContent(_))
    }

    /// Map a kube error to a store error, keeping 404 distinguishable.
    pub(crate) fn from_kube(
        operation: &'static str,
        namespace: &str,
        name: &str,
        source: kube::Error,
    ) -> Self {
        match source {
            kube::Error::Api(ref resp) if resp.code == 404 => Error::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            source => Error::Backend {
                operation,
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            },
        }
    }

    pub(crate) fn from_kube_list(namespace: &str, selector: &str, source: kube::Error) -> Self {
        Error::List {
            namespace: namespace.to_string(),
            selector: selector.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
