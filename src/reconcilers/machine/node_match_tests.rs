// SPDX-License-Identifier: Apache-2.0

use super::*;
use k8s_openapi::api::core::v1::{NodeAddress, NodeSpec, NodeStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

fn node(name: &str, provider_id: Option<&str>, addresses: Vec<(&str, &str)>) -> Arc<Node> {
    Arc::new(Node {
        metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
        spec: Some(NodeSpec { provider_id: provider_id.map(str::to_string), ..Default::default() }),
        status: Some(NodeStatus {
            addresses: Some(
                addresses
                    .into_iter()
                    .map(|(t, a)| NodeAddress { type_: t.to_string(), address: a.to_string() })
                    .collect(),
            ),
            ..Default::default()
        }),
    })
}

#[test]
fn normalize_strips_aws_zone_prefix() {
    assert_eq!(normalize_provider_id("aws:///us-east-1a/i-0abcd1234"), "i-0abcd1234");
}

#[test]
fn normalize_strips_hcloud_prefix() {
    assert_eq!(normalize_provider_id("hcloud://12345"), "12345");
}

#[test]
fn normalize_strips_openstack_prefix() {
    assert_eq!(normalize_provider_id("openstack:///550e8400-e29b-41d4-a716-446655440000"), "550e8400-e29b-41d4-a716-446655440000");
}

#[test]
fn normalize_leaves_azure_id_unchanged() {
    let azure_id = "azure:///subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1";
    assert_eq!(normalize_provider_id(azure_id), azure_id);
}

#[test]
fn find_node_for_instance_matches_by_normalized_provider_id() {
    let nodes = vec![
        node("node-a", Some("aws:///us-east-1a/i-aaa"), vec![]),
        node("node-b", Some("aws:///us-east-1b/i-bbb"), vec![]),
    ];
    let found = find_node_for_instance(Some("aws:///us-east-1a/i-aaa"), &[], "i-aaa", &nodes);
    assert_eq!(found.unwrap().metadata.name.as_deref(), Some("node-a"));
}

#[test]
fn find_node_for_instance_hetzner_requires_name_match() {
    let nodes = vec![node("worker-1", Some("hcloud://999"), vec![]), node("worker-2", Some("hcloud://999"), vec![])];
    let found = find_node_for_instance(Some("hcloud://999"), &[], "worker-2", &nodes);
    assert_eq!(found.unwrap().metadata.name.as_deref(), Some("worker-2"));
}

#[test]
fn find_node_for_instance_falls_back_to_address_match() {
    let nodes = vec![node("node-a", None, vec![("InternalIP", "10.0.0.5")])];
    let addresses = vec![MachineAddress { r#type: "InternalIP".to_string(), address: "10.0.0.5".to_string() }];
    let found = find_node_for_instance(None, &addresses, "i-aaa", &nodes);
    assert_eq!(found.unwrap().metadata.name.as_deref(), Some("node-a"));
}

#[test]
fn find_node_for_instance_returns_none_when_nothing_matches() {
    let nodes = vec![node("node-a", Some("aws:///us-east-1a/i-aaa"), vec![])];
    let found = find_node_for_instance(Some("aws:///us-east-1a/i-zzz"), &[], "i-zzz", &nodes);
    assert!(found.is_none());
}

#[test]
fn find_matching_node_uses_machine_status() {
    use crate::crd::{Machine, MachineSpec, MachineStatus, ProviderSpec};
    let nodes = vec![node("node-a", Some("hcloud://42"), vec![])];
    let machine = Machine {
        metadata: ObjectMeta { name: Some("m1".to_string()), ..Default::default() },
        spec: MachineSpec {
            provider_spec: ProviderSpec { value: None },
            versions: Default::default(),
            taints: None,
            config_source: None,
        },
        status: Some(MachineStatus { provider_id: Some("hcloud://42".to_string()), ..Default::default() }),
    };
    let found = find_matching_node(&nodes, &machine);
    assert_eq!(found.unwrap().metadata.name.as_deref(), Some("node-a"));
}

#[test]
fn find_matching_node_returns_none_without_status() {
    let nodes = vec![node("node-a", Some("hcloud://42"), vec![])];
    use crate::crd::{Machine, MachineSpec, ProviderSpec};
    let machine = Machine {
        metadata: ObjectMeta { name: Some("m1".to_string()), ..Default::default() },
        spec: MachineSpec {
            provider_spec: ProviderSpec { value: None },
            versions: Default::default(),
            taints: None,
            config_source: None,
        },
        status: None,
    };
    assert!(find_matching_node(&nodes, &machine).is_none());
}
