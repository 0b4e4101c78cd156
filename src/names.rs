// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Helpers producing names that are valid for Kubernetes resources.

use crate::constants::limits::{DNS_LABEL, DNS_SUBDOMAIN, MD5_HEX};
use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static POD_ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)-([0-9]+)$").expect("static regex"));

/// Produce a valid DNS label, i.e. `[a-z0-9]([-a-z0-9]*[a-z0-9])?`, at most 63 characters.
///
/// Underscores become dashes, everything else outside `[a-z0-9-]` is dropped.
pub fn sanitize(name: &str) -> String {
    let cleaned = clean(name, false);
    truncate_md5(&cleaned, DNS_LABEL)
}

/// Like [`sanitize`], but keeps dots so multi-segment names survive. At most 253 characters.
pub fn sanitize_subdomain(name: &str) -> String {
    let cleaned = clean(name, true);
    truncate_md5(&cleaned, DNS_SUBDOMAIN)
}

/// Lower-case and strip anything that isn't allowed in a DNS label, without shortening.
pub fn dns_label_safe(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// Volume name for a possibly dotted resource name: the last segment, sanitized.
pub fn volume_name(name: &str) -> String {
    sanitize(name.rsplit('.').next().unwrap_or(name))
}

/// Shorten `s` to at most `n` bytes, keeping it unique by appending its MD5 digest.
///
/// Strings that already fit are returned unchanged. For `n > 32` the result is
/// `<prefix>-<md5>`, where the prefix is the start of `s`. For `n <= 32` there is
/// no room for a prefix and the first `n` hex digits of the digest are returned.
pub fn truncate_md5(s: &str, n: usize) -> String {
    if s.len() <= n {
        return s.to_string();
    }

    let sum = format!("{:x}", md5::compute(s.as_bytes()));
    if n <= MD5_HEX {
        return sum[..n].to_string();
    }

    let prefix = s[..floor_char_boundary(s, n - MD5_HEX - 1)].trim_end_matches(['-', '.']);
    if prefix.is_empty() {
        sum
    } else {
        format!("{}-{}", prefix, sum)
    }
}

/// Docker image reference `[org/]repo[:tag]`.
pub fn docker_source_name(org: &str, repo: &str, tag: &str) -> Result<String> {
    if repo.is_empty() {
        return Err(Error::InvalidConfig(
            "docker image repository must not be empty".to_string(),
        ));
    }

    let mut name = if org.is_empty() {
        repo.to_string()
    } else {
        format!("{}/{}", org.trim_end_matches('/'), repo)
    };
    if !tag.is_empty() {
        name.push(':');
        name.push_str(tag);
    }
    Ok(name)
}

/// Ordinal of a stateful set pod, e.g. `3` for `web-3`.
pub fn ordinal_from_pod_name(name: &str) -> Option<u32> {
    POD_ORDINAL
        .captures(name)
        .and_then(|c| c.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

/// Stable index of a pod across availability zones.
///
/// Uses a large fixed stride per zone instead of the replica count, so scaling
/// doesn't change the index of existing pods.
pub fn spec_index(az_index: u32, pod_ordinal: u32) -> u32 {
    (az_index.max(1) - 1) * 10_000 + pod_ordinal
}

fn clean(name: &str, keep_dots: bool) -> String {
    let name = name.replace('_', "-").to_lowercase();
    let filtered: String = name
        .chars()
        .filter(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || (keep_dots && *c == '.')
        })
        .collect();

    if keep_dots {
        filtered.trim_matches(['-', '.']).to_string()
    } else {
        filtered.trim_matches('-').to_string()
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
