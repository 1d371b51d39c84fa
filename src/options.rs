//! Operator-wide options
//!
//! Options are read once at startup from `MYSQL_OPERATOR_*` environment
//! variables and shared read-only through the controller context.

use std::time::Duration;

use thiserror::Error;

const ENV_PREFIX: &str = "MYSQL_OPERATOR_";

/// Error raised when an option value cannot be parsed
#[derive(Error, Debug, PartialEq)]
#[error("invalid value {value:?} for {name}: {reason}")]
pub struct OptionsError {
    pub name: String,
    pub value: String,
    pub reason: String,
}

/// Options shared by every reconciliation
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorOptions {
    /// MySQL image repository, without tag
    pub mysql_image: String,
    /// Default MySQL image tag when a cluster does not set a version
    pub mysql_image_tag: String,
    /// Helper image used for backups
    pub helper_image: String,
    /// Prometheus exporter sidecar image
    pub metrics_exporter_image: String,
    /// Default image pull policy
    pub image_pull_policy: String,
    /// Default orchestrator address for clusters that do not set one
    pub orchestrator_uri: Option<String>,
    /// Overall timeout for a single orchestrator request
    pub orchestrator_timeout: Duration,
}

impl Default for OperatorOptions {
    fn default() -> Self {
        Self {
            mysql_image: "percona".to_string(),
            mysql_image_tag: "5.7".to_string(),
            helper_image: "quay.io/presslabs/mysql-helper:latest".to_string(),
            metrics_exporter_image: "prom/mysqld-exporter:latest".to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            orchestrator_uri: None,
            orchestrator_timeout: Duration::from_secs(10),
        }
    }
}

impl OperatorOptions {
    /// Build options from the process environment
    pub fn from_env() -> Result<Self, OptionsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build options from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OptionsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };
        let defaults = Self::default();

        let orchestrator_timeout = match get("ORCHESTRATOR_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                    OptionsError {
                        name: format!("{}ORCHESTRATOR_TIMEOUT_SECS", ENV_PREFIX),
                        value: raw.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Duration::from_secs(secs)
            }
            None => defaults.orchestrator_timeout,
        };

        Ok(Self {
            mysql_image: get("MYSQL_IMAGE").unwrap_or(defaults.mysql_image),
            mysql_image_tag: get("MYSQL_IMAGE_TAG").unwrap_or(defaults.mysql_image_tag),
            helper_image: get("HELPER_IMAGE").unwrap_or(defaults.helper_image),
            metrics_exporter_image: get("METRICS_EXPORTER_IMAGE")
                .unwrap_or(defaults.metrics_exporter_image),
            image_pull_policy: get("IMAGE_PULL_POLICY").unwrap_or(defaults.image_pull_policy),
            orchestrator_uri: get("ORCHESTRATOR_URI"),
            orchestrator_timeout,
        })
    }

    /// Full MySQL image reference for a version
    pub fn mysql_image_for(&self, version: &str) -> String {
        format!("{}:{}", self.mysql_image, version)
    }
}
