// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The `<prefix>-v<version>` naming scheme of versioned secrets.

use crate::constants::limits::DNS_SUBDOMAIN;
use crate::constants::{labels, VERSIONED_SECRET_KIND};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use regex::Regex;
use std::sync::LazyLock;

static VERSIONED_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+-v(\d+)$").expect("static regex"));

/// Name of version `version` of the versioned secret `prefix`.
pub fn generate_secret_name(prefix: &str, version: u64) -> Result<String> {
    let name = format!("{}-v{}", prefix, version);

    if name.len() > DNS_SUBDOMAIN {
        return Err(Error::NameTooLong {
            actual: name.len(),
            allowed: DNS_SUBDOMAIN,
        });
    }

    if prefix.is_empty() {
        return Err(Error::MalformedName(name));
    }

    let alphanumeric = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid = name.starts_with(alphanumeric)
        && name.chars().all(|c| alphanumeric(c) || c == '.' || c == '-');
    if !valid {
        return Err(Error::InvalidCharacter(name));
    }

    Ok(name)
}

/// Version number encoded in a versioned secret name.
pub fn version_from_name(name: &str) -> Result<u64> {
    VERSIONED_NAME
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| Error::MalformedName(name.to_string()))
}

pub fn is_versioned_secret_name(name: &str) -> bool {
    VERSIONED_NAME.is_match(name)
}

/// Name without the `-v<version>` suffix, or an empty string for names that
/// don't follow the scheme.
pub fn name_prefix(name: &str) -> String {
    if !is_versioned_secret_name(name) {
        return String::new();
    }
    match name.rfind("-v") {
        Some(n) if n > 0 => name[..n].to_string(),
        _ => String::new(),
    }
}

/// Regex matching exactly the versions of `prefix`, and nothing that merely contains it.
pub fn versions_regex(prefix: &str) -> Regex {
    Regex::new(&format!(r"^{}-v\d+$", regex::escape(prefix)))
        .expect("escaped prefix is a valid regex")
}

/// True if the secret carries the versioned secret kind label.
pub fn is_versioned_secret(secret: &Secret) -> bool {
    secret
        .labels()
        .get(labels::SECRET_KIND)
        .is_some_and(|kind| kind == VERSIONED_SECRET_KIND)
}

/// Version from the secret's version label.
pub fn version(secret: &Secret) -> Result<u64> {
    let Some(label) = secret.labels().get(labels::SECRET_VERSION) else {
        return Err(Error::InvalidVersionLabel {
            name: secret.name_any(),
            reason: "no version label".to_string(),
        });
    };

    label.parse().map_err(|_| Error::InvalidVersionLabel {
        name: secret.name_any(),
        reason: format!("'{}' is not a number", label),
    })
}

pub fn is_initial_version(secret: &Secret) -> bool {
    secret
        .labels()
        .get(labels::SECRET_VERSION)
        .is_some_and(|v| v == "1")
}

/// True if `names` holds an older version of the versioned secret `name`.
pub fn contains_outdated_secret_name<S: AsRef<str>>(names: &[S], name: &str) -> bool {
    let prefix = name_prefix(name);
    if prefix.is_empty() {
        return false;
    }
    let Ok(ours) = version_from_name(name) else {
        return false;
    };

    let same_secret = versions_regex(&prefix);
    names
        .iter()
        .map(AsRef::as_ref)
        .filter(|n| same_secret.is_match(n))
        .filter_map(|n| version_from_name(n).ok())
        .any(|theirs| theirs < ours)
}
