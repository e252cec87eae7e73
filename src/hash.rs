// SPDX-License-Identifier: Apache-2.0

//! Template hashing for `MachineSet`/`MachineDeployment` revisioning.
//!
//! Mirrors the well-known Deployment/ReplicaSet `ComputeHash` approach: hash a stable
//! JSON encoding of the pod (here, Machine) template plus an optional collision-count
//! salt, then render the hash as a short, DNS-label-safe string.

use crate::crd::MachineTemplateSpec;
use fnv::FnvHasher;
use std::hash::Hasher;

/// Compute the template hash for a `MachineSet`'s template, salted by `collision_count`
/// so a hash collision can be resolved by re-deriving with an incremented salt.
#[must_use]
pub fn compute_template_hash(template: &MachineTemplateSpec, collision_count: i32) -> String {
    // serde_json's BTreeMap-backed Value serializer produces key-sorted output, giving a
    // stable encoding regardless of struct field declaration order.
    let mut canonical = serde_json::to_value(template).unwrap_or(serde_json::Value::Null);
    sort_json(&mut canonical);
    let encoded = canonical.to_string();

    let mut hasher = FnvHasher::default();
    hasher.write(encoded.as_bytes());
    hasher.write_i32(collision_count);
    let digest = hasher.finish();

    safe_encode(digest)
}

/// Recursively sort object keys so structurally-identical templates always serialize
/// identically even if `serde_json::Value`'s internal map type changes.
fn sort_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for v in map.values_mut() {
                sort_json(v);
            }
        }
        serde_json::Value::Array(items) => {
            for v in items.iter_mut() {
                sort_json(v);
            }
        }
        _ => {}
    }
}

/// Render a 64-bit digest as a short, lowercase, DNS-label-safe string suitable for use
/// in a Kubernetes object name (`<deployment>-<safeEncode(hash)>`).
///
/// Uses a restricted base-32 alphabet that excludes visually-ambiguous characters
/// (`0/o`, `1/l/i`), matching the upstream Kubernetes `rand.SafeEncodeString` approach.
#[must_use]
pub fn safe_encode(mut digest: u64) -> String {
    const ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
    let base = ALPHABET.len() as u64;
    let mut out = Vec::with_capacity(10);
    for _ in 0..10 {
        let idx = (digest % base) as usize;
        out.push(ALPHABET[idx]);
        digest /= base;
    }
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Derive the name for a new `MachineSet` created for `deployment_name`'s current
/// template. Deterministic, so a retried create after a timeout is idempotent.
#[must_use]
pub fn machine_set_name(deployment_name: &str, template_hash: &str) -> String {
    format!("{deployment_name}-{template_hash}")
}

/// True if two templates are identical once the `machine-template-hash` label is
/// stripped from both. Used to distinguish a genuine hash collision (different
/// templates, same hash) from simply finding the `MachineSet` already owned for this
/// revision.
#[must_use]
pub fn template_equal_ignoring_hash(a: &MachineTemplateSpec, b: &MachineTemplateSpec) -> bool {
    strip_hash_label(a) == strip_hash_label(b)
}

fn strip_hash_label(template: &MachineTemplateSpec) -> serde_json::Value {
    let mut value = serde_json::to_value(template).unwrap_or(serde_json::Value::Null);
    if let Some(labels) = value
        .pointer_mut("/metadata/labels")
        .and_then(serde_json::Value::as_object_mut)
    {
        labels.remove(crate::labels::MACHINE_TEMPLATE_HASH_LABEL);
    }
    sort_json(&mut value);
    value
}

#[cfg(test)]
#[path = "hash_tests.rs"]
mod hash_tests;
