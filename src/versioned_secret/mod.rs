// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Immutable, versioned secrets stored as `<name>-v<N>` Kubernetes secrets.

pub mod backend;
pub mod naming;
pub mod store;

pub use backend::{ClientBackend, DynamicBackend, InMemoryBackend, SecretBackend};
pub use naming::{generate_secret_name, name_prefix, version_from_name};
pub use store::{NewVersion, Owner, VersionedSecretStore};
