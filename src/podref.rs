// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finding and replacing secret and config map references in pod specs.

use k8s_openapi::api::core::v1::{Container, PodSpec};
use std::collections::BTreeSet;

/// Names of all secrets referenced by volumes, `envFrom` and `env` of
/// containers and init containers.
pub fn secret_names(spec: &PodSpec) -> BTreeSet<String> {
    let mut result = BTreeSet::new();

    for volume in spec.volumes.iter().flatten() {
        if let Some(name) = volume.secret.as_ref().and_then(|s| s.secret_name.clone()) {
            result.insert(name);
        }
    }

    for container in all_containers(spec) {
        for env_from in container.env_from.iter().flatten() {
            if let Some(secret_ref) = &env_from.secret_ref {
                result.insert(secret_ref.name.clone());
            }
        }
        for env in container.env.iter().flatten() {
            if let Some(key_ref) = env.value_from.as_ref().and_then(|v| v.secret_key_ref.as_ref()) {
                result.insert(key_ref.name.clone());
            }
        }
    }

    result
}

/// Names of all config maps referenced by volumes, `envFrom` and `env` of
/// containers and init containers.
pub fn config_map_names(spec: &PodSpec) -> BTreeSet<String> {
    let mut result = BTreeSet::new();

    for volume in spec.volumes.iter().flatten() {
        if let Some(cm) = &volume.config_map {
            result.insert(cm.name.clone());
        }
    }

    for container in all_containers(spec) {
        for env_from in container.env_from.iter().flatten() {
            if let Some(cm_ref) = &env_from.config_map_ref {
                result.insert(cm_ref.name.clone());
            }
        }
        for env in container.env.iter().flatten() {
            if let Some(key_ref) = env
                .value_from
                .as_ref()
                .and_then(|v| v.config_map_key_ref.as_ref())
            {
                result.insert(key_ref.name.clone());
            }
        }
    }

    result
}

/// Point every secret reference named `from` at `to`. Returns the number of
/// references changed.
pub fn replace_secret_name(spec: &mut PodSpec, from: &str, to: &str) -> usize {
    let mut replaced = 0;

    for volume in spec.volumes.iter_mut().flatten() {
        if let Some(source) = volume.secret.as_mut() {
            if source.secret_name.as_deref() == Some(from) {
                source.secret_name = Some(to.to_string());
                replaced += 1;
            }
        }
    }

    let containers = spec.containers.iter_mut();
    let init_containers = spec.init_containers.iter_mut().flatten();
    for container in containers.chain(init_containers) {
        replaced += replace_in_container(container, from, to);
    }

    replaced
}

fn replace_in_container(container: &mut Container, from: &str, to: &str) -> usize {
    let mut replaced = 0;

    for env_from in container.env_from.iter_mut().flatten() {
        if let Some(secret_ref) = env_from.secret_ref.as_mut() {
            if secret_ref.name == from {
                secret_ref.name = to.to_string();
                replaced += 1;
            }
        }
    }

    for env in container.env.iter_mut().flatten() {
        if let Some(key_ref) = env
            .value_from
            .as_mut()
            .and_then(|v| v.secret_key_ref.as_mut())
        {
            if key_ref.name == from {
                key_ref.name = to.to_string();
                replaced += 1;
            }
        }
    }

    replaced
}

fn all_containers(spec: &PodSpec) -> impl Iterator<Item = &Container> {
    spec.containers
        .iter()
        .chain(spec.init_containers.iter().flatten())
}
