// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::crd::{MachineSpec, MachineTemplateSpec, ProviderSpec};

fn template(kubelet: &str) -> MachineTemplateSpec {
    MachineTemplateSpec {
        metadata: Default::default(),
        spec: MachineSpec {
            provider_spec: ProviderSpec { value: None },
            versions: crate::crd::MachineVersionInfo { kubelet: kubelet.to_string() },
            taints: None,
            config_source: None,
        },
    }
}

#[test]
fn same_template_same_hash() {
    let a = compute_template_hash(&template("v1.31.2"), 0);
    let b = compute_template_hash(&template("v1.31.2"), 0);
    assert_eq!(a, b);
}

#[test]
fn different_template_different_hash() {
    let a = compute_template_hash(&template("v1.31.2"), 0);
    let b = compute_template_hash(&template("v1.31.3"), 0);
    assert_ne!(a, b);
}

#[test]
fn collision_salt_changes_hash() {
    let a = compute_template_hash(&template("v1.31.2"), 0);
    let b = compute_template_hash(&template("v1.31.2"), 1);
    assert_ne!(a, b);
}

#[test]
fn safe_encode_is_fixed_length_and_alphabet_restricted() {
    let encoded = safe_encode(0xdead_beef_cafe_babe);
    assert_eq!(encoded.len(), 10);
    assert!(encoded.bytes().all(|b| !matches!(b, b'0' | b'o' | b'1' | b'l' | b'i')));
}

#[test]
fn machine_set_name_joins_deployment_and_hash() {
    assert_eq!(machine_set_name("workers", "abc123xyz0"), "workers-abc123xyz0");
}
