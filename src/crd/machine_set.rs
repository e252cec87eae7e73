// SPDX-License-Identifier: Apache-2.0

//! The `MachineSet` custom resource: one versioned generation of a `MachineDeployment`'s
//! template.

use super::common::LabelSelector;
use super::machine::MachineSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `MachineSet` ensures a fixed number of `Machine`s exist for one template revision.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "MachineSet",
    namespaced,
    shortname = "ms",
    doc = "MachineSet maintains a fixed number of Machines matching one template revision.",
    printcolumn = r#"{"name":"Desired","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Current","type":"integer","jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Available","type":"integer","jsonPath":".status.availableReplicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "MachineSetStatus")]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    /// Desired number of Machines.
    pub replicas: i32,

    /// Selector that must match `template.metadata.labels`; every owned Machine also
    /// matches this selector.
    pub selector: LabelSelector,

    /// Template used to create new Machines.
    pub template: MachineTemplateSpec,

    /// Minimum number of seconds a newly bound Node must be Ready before the Machine is
    /// counted as available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ready_seconds: Option<i32>,

    /// Delete prioritization policy: `Random`, `Newest`, `Oldest`, or empty (= `Random`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_policy: Option<String>,
}

/// The object metadata + spec used as a template for Machines created by a `MachineSet`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateSpec {
    /// Labels and annotations applied to created Machines.
    #[serde(default)]
    pub metadata: MachineTemplateMetadata,

    /// The `MachineSpec` each created Machine is stamped with.
    pub spec: MachineSpec,
}

/// The subset of `ObjectMeta` meaningful on a Machine template.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineTemplateMetadata {
    /// Labels stamped onto created Machines (merged with the template-hash label).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    /// Annotations stamped onto created Machines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

/// Observed status of a `MachineSet`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetStatus {
    /// Count of non-deleting Machines matching the selector.
    #[serde(default)]
    pub replicas: i32,

    /// Count of matched Machines whose template labels are a superset of the Set's
    /// `template.metadata.labels`.
    #[serde(default)]
    pub fully_labeled_replicas: i32,

    /// Count of matched Machines whose bound Node is Ready.
    #[serde(default)]
    pub ready_replicas: i32,

    /// Count of matched Machines whose bound Node has been Ready for at least
    /// `spec.minReadySeconds`.
    #[serde(default)]
    pub available_replicas: i32,

    /// `metadata.generation` last fully processed by the reconciler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
