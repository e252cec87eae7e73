// SPDX-License-Identifier: Apache-2.0

//! Types shared by all three `cluster.k8s.io/v1alpha1` resources.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label selector to match Kubernetes resources.
///
/// A label selector is a label query over a set of resources. The result of
/// `matchLabels` and `matchExpressions` are ANDed. An empty label selector matches all
/// objects.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Map of {key,value} pairs. A single {key,value} in the `matchLabels` map is
    /// equivalent to an element of `matchExpressions`, whose key field is "key", the
    /// operator is "In", and the values array contains only "value". All requirements
    /// must be satisfied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,

    /// List of label selector requirements. All requirements must be satisfied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// A label selector requirement is a selector that contains values, a key, and an
/// operator that relates the key and values.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// The label key that the selector applies to.
    pub key: String,

    /// Operator represents a key's relationship to a set of values. Valid operators are
    /// `In`, `NotIn`, `Exists` and `DoesNotExist`.
    pub operator: String,

    /// An array of string values. If the operator is `In` or `NotIn`, the values array
    /// must be non-empty. If the operator is `Exists` or `DoesNotExist`, the values array
    /// must be empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// A standard Kubernetes status condition.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of the condition, e.g. "Ready".
    pub r#type: String,

    /// Status of the condition: "True", "False", or "Unknown".
    pub status: String,

    /// RFC3339 timestamp of the last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    /// A programmatic, CamelCase reason for the condition's last transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A reference to a namespaced Kubernetes object.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// Kind of the referenced resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Name of the referenced resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace of the referenced resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// UID of the referenced resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

/// An absolute count or a percentage, as used by `maxSurge`/`maxUnavailable`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntOrString {
    /// An absolute replica count.
    Int(i32),
    /// A percentage, e.g. `"25%"`.
    String(String),
}

impl IntOrString {
    /// Resolve this value to an absolute count against `total`, rounding per the
    /// Kubernetes convention: up when computing `maxSurge`, down when computing
    /// `maxUnavailable`. Callers pass `round_up` accordingly.
    #[must_use]
    pub fn resolve(&self, total: i32, round_up: bool) -> i32 {
        match self {
            IntOrString::Int(v) => *v,
            IntOrString::String(s) => {
                let pct = s.trim_end_matches('%').parse::<f64>().unwrap_or(0.0);
                let value = f64::from(total) * pct / 100.0;
                if round_up {
                    value.ceil() as i32
                } else {
                    value.floor() as i32
                }
            }
        }
    }
}

impl Default for IntOrString {
    fn default() -> Self {
        IntOrString::Int(0)
    }
}
