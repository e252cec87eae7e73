// SPDX-License-Identifier: Apache-2.0

//! The `MachineDeployment` custom resource: a template-versioned target owning
//! `MachineSet`s and driving rolling updates between them.

use super::common::{IntOrString, LabelSelector};
use super::machine_set::MachineTemplateSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `MachineDeployment` declares a desired replica count and template; the reconciler
/// materializes revisions of it as `MachineSet`s and rolls out template changes.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "MachineDeployment",
    namespaced,
    shortname = "md",
    doc = "MachineDeployment declaratively manages a rolling fleet of worker node Machines via owned MachineSets.",
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Updated","type":"integer","jsonPath":".status.updatedReplicas"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#,
    printcolumn = r#"{"name":"Paused","type":"boolean","jsonPath":".spec.paused"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "MachineDeploymentStatus")]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    /// Desired number of Machines across all active `MachineSet`s.
    pub replicas: i32,

    /// Selector that must match `template.metadata.labels`.
    pub selector: LabelSelector,

    /// Template stamped onto created `MachineSet`s (and, transitively, their Machines).
    pub template: MachineTemplateSpec,

    /// Update strategy; only `RollingUpdate` is currently supported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<MachineDeploymentStrategy>,

    /// Minimum number of seconds a newly bound Node must be Ready before its Machine is
    /// counted as available. Propagated verbatim to owned `MachineSet`s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ready_seconds: Option<i32>,

    /// Number of old, fully-scaled-down `MachineSet`s to retain for rollback history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_history_limit: Option<i32>,

    /// When true, the reconciler only proportionally scales existing Sets; it creates no
    /// new Set and performs no rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    /// Seconds without rollout progress before the Deployment is considered stalled.
    /// Surfaced only as a condition; does not block reconciliation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_deadline_seconds: Option<i32>,
}

/// The rollout strategy for a `MachineDeployment`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentStrategy {
    /// Strategy discriminator. Only `"RollingUpdate"` is accepted; any other value is a
    /// configuration error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Rolling-update budget parameters, required when `type == "RollingUpdate"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdateMachineDeployment>,
}

/// Rolling-update budget: how far the fleet may surge above, or dip below, the desired
/// replica count during a rollout.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateMachineDeployment {
    /// Maximum number of Machines that may exist above `spec.replicas` during a rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrString>,

    /// Maximum number of Machines that may be unavailable below `spec.replicas` during a
    /// rollout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrString>,
}

/// Observed status of a `MachineDeployment`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentStatus {
    /// Total Machines across all active (non-zero-replica) owned Sets.
    #[serde(default)]
    pub replicas: i32,

    /// Machines belonging to the current (newest-template) Set.
    #[serde(default)]
    pub updated_replicas: i32,

    /// Machines whose bound Node is Ready, summed across owned Sets.
    #[serde(default)]
    pub ready_replicas: i32,

    /// Machines counted as available, summed across owned Sets.
    #[serde(default)]
    pub available_replicas: i32,

    /// `replicas - available_replicas`, clamped to zero.
    #[serde(default)]
    pub unavailable_replicas: i32,

    /// Number of hash collisions encountered while deriving the current revision's Set
    /// name; incremented each time a newly computed template hash collides with an
    /// existing, non-matching Set.
    #[serde(default)]
    pub collision_count: i32,

    /// `metadata.generation` last fully processed by the reconciler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Standard status conditions (`Available`, `Progressing`).
    #[serde(default)]
    pub conditions: Vec<super::common::Condition>,
}
