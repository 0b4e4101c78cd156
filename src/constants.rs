// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes label keys
pub mod labels {
    /// Marks a secret as part of a versioned secret history
    pub const SECRET_KIND: &str = "quarks.cloudfoundry.org/secret-kind";
    /// Version number of a versioned secret
    pub const SECRET_VERSION: &str = "quarks.cloudfoundry.org/secret-version";
}

/// Kubernetes annotation keys
pub mod annotations {
    /// Free text describing where a versioned secret came from
    pub const SOURCE_DESCRIPTION: &str = "quarks.cloudfoundry.org/source-description";
    /// RFC3339 timestamp of the last reconcile, ignored when comparing versions
    pub const LAST_RECONCILE: &str = "quarks.cloudfoundry.org/last-reconcile";
}

/// Value of the secret-kind label for versioned secrets
pub const VERSIONED_SECRET_KIND: &str = "versionedSecret";

/// API version written into owner references of versioned secrets
pub const OWNER_API_VERSION: &str = "quarks.cloudfoundry.org/v1alpha1";

/// Kubernetes name length limits
pub mod limits {
    /// DNS-1123 label, e.g. container or volume names
    pub const DNS_LABEL: usize = 63;
    /// DNS-1123 subdomain, e.g. secret names
    pub const DNS_SUBDOMAIN: usize = 253;
    /// Hex length of an MD5 digest
    pub const MD5_HEX: usize = 32;
}

/// Defaults used when an environment variable is not set
pub mod defaults {
    pub const CTX_TIMEOUT_SECS: u64 = 300;
    pub const MELTDOWN_DURATION_SECS: u64 = 60;
    pub const MELTDOWN_REQUEUE_AFTER_SECS: u64 = 30;
    pub const MONITORED_ID: &str = "default";
    pub const OPERATOR_NAMESPACE: &str = "default";
    pub const DOCKER_IMAGE_ORG: &str = "cfcontainerization";
    pub const DOCKER_IMAGE_REPOSITORY: &str = "cf-operator";
}
