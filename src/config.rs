// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::defaults;
use crate::error::Error;
use crate::names::docker_source_name;
use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Image pull policy for pods created by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PullPolicy {
    Always,
    Never,
    #[default]
    IfNotPresent,
}

impl FromStr for PullPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Always" => Ok(PullPolicy::Always),
            "Never" => Ok(PullPolicy::Never),
            "IfNotPresent" => Ok(PullPolicy::IfNotPresent),
            other => Err(Error::InvalidConfig(format!(
                "invalid image pull policy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PullPolicy::Always => "Always",
            PullPolicy::Never => "Never",
            PullPolicy::IfNotPresent => "IfNotPresent",
        };
        f.write_str(s)
    }
}

/// The operator's own docker image, used for pods that run operator commands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperatorImage {
    pub image: String,
    pub pull_policy: PullPolicy,
}

impl OperatorImage {
    pub fn new(
        org: &str,
        repo: &str,
        tag: &str,
        pull_policy: PullPolicy,
    ) -> crate::error::Result<Self> {
        Ok(Self {
            image: docker_source_name(org, repo, tag)?,
            pull_policy,
        })
    }
}

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Timeout for each Kubernetes API request, zero disables it
    pub ctx_timeout: Duration,
    /// Period after a reconcile in which further reconciles are postponed
    pub meltdown_duration: Duration,
    /// Delay before requeuing a reconcile postponed by a meltdown
    pub meltdown_requeue_after: Duration,
    /// Only namespaces labeled with this id are watched
    pub monitored_id: String,
    /// Namespace holding the operator's webhook services
    pub operator_namespace: String,
    pub webhook_server_host: String,
    pub webhook_server_port: u16,
    pub webhook_use_service_ref: bool,
    pub operator_image: OperatorImage,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ctx_timeout: Duration::from_secs(defaults::CTX_TIMEOUT_SECS),
            meltdown_duration: Duration::from_secs(defaults::MELTDOWN_DURATION_SECS),
            meltdown_requeue_after: Duration::from_secs(defaults::MELTDOWN_REQUEUE_AFTER_SECS),
            monitored_id: defaults::MONITORED_ID.to_string(),
            operator_namespace: defaults::OPERATOR_NAMESPACE.to_string(),
            webhook_server_host: String::new(),
            webhook_server_port: 0,
            webhook_use_service_ref: false,
            operator_image: OperatorImage::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(v) => v
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds, got '{}'", key, v)),
                None => Ok(Duration::from_secs(default)),
            }
        };
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let tag =
            lookup("DOCKER_IMAGE_TAG").context("DOCKER_IMAGE_TAG environment variable not set")?;
        let pull_policy = match lookup("DOCKER_IMAGE_PULL_POLICY") {
            Some(p) => p.parse()?,
            None => PullPolicy::default(),
        };
        let operator_image = OperatorImage::new(
            &string("DOCKER_IMAGE_ORG", defaults::DOCKER_IMAGE_ORG),
            &string("DOCKER_IMAGE_REPOSITORY", defaults::DOCKER_IMAGE_REPOSITORY),
            &tag,
            pull_policy,
        )
        .context("Couldn't parse docker image reference")?;

        let webhook_server_port = match lookup("WEBHOOK_SERVER_PORT") {
            Some(p) => p.parse().with_context(|| {
                format!("WEBHOOK_SERVER_PORT must be a port number, got '{}'", p)
            })?,
            None => 0,
        };
        let webhook_use_service_ref = lookup("WEBHOOK_USE_SERVICE_REFERENCE")
            .and_then(|v| v.parse().ok())
            .unwrap_or(false);

        let mut monitored_id = string("MONITORED_ID", defaults::MONITORED_ID);
        if monitored_id.is_empty() {
            monitored_id = defaults::MONITORED_ID.to_string();
        }

        Ok(Config {
            ctx_timeout: secs("CTX_TIMEOUT", defaults::CTX_TIMEOUT_SECS)?,
            meltdown_duration: secs("MELTDOWN_DURATION", defaults::MELTDOWN_DURATION_SECS)?,
            meltdown_requeue_after: secs(
                "MELTDOWN_REQUEUE_AFTER",
                defaults::MELTDOWN_REQUEUE_AFTER_SECS,
            )?,
            monitored_id,
            operator_namespace: string("OPERATOR_NAMESPACE", defaults::OPERATOR_NAMESPACE),
            webhook_server_host: string("WEBHOOK_SERVER_HOST", ""),
            webhook_server_port,
            webhook_use_service_ref,
            operator_image,
        })
    }

    /// Per-request timeout, if enabled
    pub fn request_timeout(&self) -> Option<Duration> {
        (!self.ctx_timeout.is_zero()).then_some(self.ctx_timeout)
    }
}
