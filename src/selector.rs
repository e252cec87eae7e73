// SPDX-License-Identifier: Apache-2.0

//! Label selector matching utilities shared by all three reconcilers.
//!
//! `MachineSet` adopts/releases `Machine`s by testing `spec.selector` against each
//! candidate's labels, and `MachineDeployment` does the same against `MachineSet`s. Both
//! use the functions here instead of hand-rolled map comparisons.

use crate::crd::{LabelSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

/// Returns true if `labels` satisfies every requirement in `selector`.
///
/// An empty selector (`matchLabels` and `matchExpressions` both absent) matches
/// everything, mirroring Kubernetes semantics.
#[must_use]
pub fn matches_selector(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    if let Some(match_labels) = &selector.match_labels {
        for (k, v) in match_labels {
            if labels.get(k) != Some(v) {
                return false;
            }
        }
    }

    if let Some(exprs) = &selector.match_expressions {
        for expr in exprs {
            if !matches_requirement(expr, labels) {
                return false;
            }
        }
    }

    true
}

fn matches_requirement(req: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    match req.operator.as_str() {
        "In" => req
            .values
            .as_ref()
            .is_some_and(|values| labels.get(&req.key).is_some_and(|v| values.contains(v))),
        "NotIn" => req
            .values
            .as_ref()
            .is_none_or(|values| !labels.get(&req.key).is_some_and(|v| values.contains(v))),
        "Exists" => labels.contains_key(&req.key),
        "DoesNotExist" => !labels.contains_key(&req.key),
        _ => false,
    }
}

/// Returns true if `labels` is a superset of `required` (every key/value in `required`
/// is present and equal in `labels`). Used for `MachineSet.status.fullyLabeledReplicas`.
#[must_use]
pub fn is_superset(labels: &BTreeMap<String, String>, required: &BTreeMap<String, String>) -> bool {
    required.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Merge `overlay` into `base`, with `overlay` values winning on key collision. Used when
/// stamping template labels plus the `machine-template-hash` label onto a new Machine or
/// MachineSet.
#[must_use]
pub fn merge_labels(
    base: &BTreeMap<String, String>,
    overlay: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = base.clone();
    merged.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
