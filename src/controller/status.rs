//! Status and conditions management for MysqlCluster resources
//!
//! This module provides utilities for managing Kubernetes-style conditions
//! and updating the status subresource.

use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, ResourceExt};

use crate::controller::Context;
use crate::controller::error::Result;
use crate::crd::{Condition, MysqlCluster, MysqlClusterStatus};
use crate::resources::FIELD_MANAGER;

/// Standard condition types following Kubernetes conventions
pub mod condition_types {
    /// Every managed resource is in sync and all members are ready
    pub const READY: &str = "Ready";
    /// The last synchronization failed
    pub const FAILED: &str = "Failed";
}

/// Condition status values
pub mod condition_status {
    pub const TRUE: &str = "True";
    pub const FALSE: &str = "False";
}

/// Builder for creating and updating status conditions
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
    generation: Option<i64>,
}

impl ConditionBuilder {
    /// Create from existing conditions
    pub fn from_existing(existing: Vec<Condition>, generation: Option<i64>) -> Self {
        Self {
            conditions: existing,
            generation,
        }
    }

    /// Set a condition, updating if it exists or adding if it doesn't
    ///
    /// The transition time only moves when the status flips.
    pub fn set_condition(mut self, type_: &str, status: &str, reason: &str, message: &str) -> Self {
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Utc::now().to_rfc3339();
            }
            existing.reason = reason.to_string();
            existing.message = message.to_string();
            existing.observed_generation = self.generation;
        } else {
            self.conditions.push(Condition {
                type_: type_.to_string(),
                status: status.to_string(),
                reason: reason.to_string(),
                message: message.to_string(),
                last_transition_time: Utc::now().to_rfc3339(),
                observed_generation: self.generation,
            });
        }
        self
    }

    fn flag(value: bool) -> &'static str {
        if value {
            condition_status::TRUE
        } else {
            condition_status::FALSE
        }
    }

    /// Set the Ready condition
    pub fn ready(self, is_ready: bool, reason: &str, message: &str) -> Self {
        self.set_condition(condition_types::READY, Self::flag(is_ready), reason, message)
    }

    /// Set the Failed condition
    pub fn failed(self, is_failed: bool, reason: &str, message: &str) -> Self {
        self.set_condition(condition_types::FAILED, Self::flag(is_failed), reason, message)
    }

    /// Build the conditions list
    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

/// What a successful reconciliation observed about the cluster
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    pub ready_nodes: i32,
    pub master_host: String,
    pub healthy_slave_host: String,
}

/// Compute the status after a successful synchronization
pub fn synced_status(cluster: &MysqlCluster, observed: &Observation) -> MysqlClusterStatus {
    let generation = cluster.metadata.generation;
    let existing = cluster
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    let all_ready = observed.ready_nodes >= cluster.spec.replicas;
    let message = format!(
        "{}/{} members ready",
        observed.ready_nodes, cluster.spec.replicas
    );
    let conditions = ConditionBuilder::from_existing(existing, generation)
        .ready(
            all_ready,
            if all_ready { "ClusterReady" } else { "MembersNotReady" },
            &message,
        )
        .failed(false, "Synced", "All resources are in sync")
        .build();

    MysqlClusterStatus {
        ready_nodes: observed.ready_nodes,
        master_host: Some(observed.master_host.clone()),
        healthy_slave_host: Some(observed.healthy_slave_host.clone()),
        observed_generation: generation,
        conditions,
    }
}

/// Compute the status after a failed synchronization
///
/// Hosts and ready count from the previous status are kept.
pub fn failed_status(cluster: &MysqlCluster, reason: &str, message: &str) -> MysqlClusterStatus {
    let generation = cluster.metadata.generation;
    let existing = cluster.status.clone().unwrap_or_default();

    let conditions = ConditionBuilder::from_existing(existing.conditions, generation)
        .ready(false, reason, message)
        .failed(true, reason, message)
        .build();

    MysqlClusterStatus {
        conditions,
        observed_generation: generation,
        ..existing
    }
}

/// Status manager for MysqlCluster resources
pub struct StatusManager<'a> {
    cluster: &'a MysqlCluster,
    ctx: &'a Context,
    ns: &'a str,
}

impl<'a> StatusManager<'a> {
    /// Create a new status manager
    pub fn new(cluster: &'a MysqlCluster, ctx: &'a Context, ns: &'a str) -> Self {
        Self { cluster, ctx, ns }
    }

    /// Update the cluster status with full status object
    pub async fn update(&self, status: MysqlClusterStatus) -> Result<()> {
        let api: Api<MysqlCluster> = Api::namespaced(self.ctx.client.clone(), self.ns);
        let name = self.cluster.name_any();

        let patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            &name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;

        Ok(())
    }

    /// Record a successful synchronization
    pub async fn set_synced(&self, observed: &Observation) -> Result<()> {
        self.update(synced_status(self.cluster, observed)).await
    }

    /// Record a failed synchronization
    pub async fn set_failed(&self, reason: &str, message: &str) -> Result<()> {
        self.update(failed_status(self.cluster, reason, message))
            .await
    }
}
