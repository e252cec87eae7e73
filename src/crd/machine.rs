// SPDX-License-Identifier: Apache-2.0

//! The `Machine` custom resource: one desired Kubernetes worker node and its backing VM.

use super::common::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `Machine` represents one desired cluster node and drives its backing cloud instance
/// through creation, node-binding, and eventual cleanup.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "Machine",
    namespaced,
    shortname = "ma",
    doc = "Machine represents one desired Kubernetes worker node and the cloud instance backing it.",
    printcolumn = r#"{"name":"Node","type":"string","jsonPath":".status.nodeRef.name"}"#,
    printcolumn = r#"{"name":"Kubelet","type":"string","jsonPath":".spec.versions.kubelet"}"#,
    printcolumn = r#"{"name":"Error","type":"string","jsonPath":".status.errorReason"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "MachineStatus")]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Opaque, provider-specific configuration (JSON), resolved by the `Provider`
    /// implementation named in `providerSpec.value.cloudProvider`.
    pub provider_spec: ProviderSpec,

    /// Desired component versions for this node.
    #[serde(default)]
    pub versions: MachineVersionInfo,

    /// Taints to apply to the bound Node once it joins the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub taints: Option<Vec<MachineTaint>>,

    /// Optional reference to an external configuration source (e.g. an
    /// operating-system profile) consumed by the userdata collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_source: Option<ObjectReference>,
}

/// Opaque provider configuration carried on a `Machine`/`MachineSet` template.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Raw provider configuration, interpreted only by the selected `Provider` impl and
    /// the `ConfigVarResolver`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Desired component versions for a Machine.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineVersionInfo {
    /// Desired kubelet version, e.g. `"v1.31.2"`.
    #[serde(default)]
    pub kubelet: String,
}

/// A taint applied to the Node once it is bound to this Machine.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineTaint {
    /// Taint key.
    pub key: String,
    /// Taint value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Taint effect: `NoSchedule`, `PreferNoSchedule`, or `NoExecute`.
    pub effect: String,
}

/// Describes the operating system a Machine's userdata should target, consumed only by
/// the external userdata-rendering collaborator (see [`crate::userdata`]).
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemSpec {
    /// Operating system identifier, e.g. `"ubuntu"`, `"flatcar"`.
    #[serde(default)]
    pub name: String,
    /// Arbitrary distro-specific config, opaque to the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

/// Observed status of a `Machine`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    /// Reference to the bound Node, once one has been matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_ref: Option<ObjectReference>,

    /// Observed component versions, copied from the bound Node once available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<MachineVersionInfo>,

    /// Observed addresses of the backing instance/Node.
    #[serde(default)]
    pub addresses: Vec<MachineAddress>,

    /// RFC3339 timestamp of the last status write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    /// Terminal-error tag; non-empty only once a `TerminalError` has been surfaced by a
    /// `Provider` call or validation failure. Never cleared without a spec change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,

    /// Human-readable detail accompanying `error_reason`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Provider-owned status blob, preserved byte-for-byte by the core. Only the owning
    /// `Provider` implementation interprets its contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status: Option<Value>,

    /// Schema version tag accompanying `provider_status`, set by the owning provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_status_schema_version: Option<String>,

    /// Normalized provider instance ID, mirrored from the instance snapshot once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// `metadata.generation` last fully processed by the reconciler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Free-form phase string for human consumption (`Provisioning`, `Running`,
    /// `Deleting`, …), not consumed by any reconciler logic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// A single observed network address.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineAddress {
    /// Address type: `InternalIP`, `ExternalIP`, `Hostname`, …
    pub r#type: String,
    /// The address value.
    pub address: String,
}

impl MachineStatus {
    /// True once a terminal error has been surfaced for this Machine.
    #[must_use]
    pub fn is_terminal_error(&self) -> bool {
        self.error_reason.is_some() || self.error_message.is_some()
    }
}

/// Convenience alias used by reconcilers that need to merge template labels.
pub type LabelMap = BTreeMap<String, String>;
