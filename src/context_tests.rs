// SPDX-License-Identifier: Apache-2.0

//! Unit tests for context.rs

use super::*;
use crate::crd::{LabelSelector, MachineSetSpec, MachineSpec, MachineTemplateSpec, ProviderSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::watcher::Event;
use std::collections::BTreeMap;

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn test_machine_spec() -> MachineSpec {
    MachineSpec {
        provider_spec: ProviderSpec { value: None },
        versions: Default::default(),
        taints: None,
        config_source: None,
    }
}

fn test_machine(name: &str, namespace: &str, lbls: BTreeMap<String, String>) -> Machine {
    Machine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(lbls),
            ..Default::default()
        },
        spec: test_machine_spec(),
        status: None,
    }
}

fn test_machine_set(name: &str, namespace: &str, lbls: BTreeMap<String, String>) -> MachineSet {
    MachineSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(lbls.clone()),
            ..Default::default()
        },
        spec: MachineSetSpec {
            replicas: 1,
            selector: LabelSelector { match_labels: Some(lbls), match_expressions: None },
            template: MachineTemplateSpec { metadata: Default::default(), spec: test_machine_spec() },
            min_ready_seconds: None,
            delete_policy: None,
        },
        status: None,
    }
}

fn stores_with(machines: Vec<Machine>, machine_sets: Vec<MachineSet>) -> Stores {
    let (machines_store, mut machines_writer) = kube::runtime::reflector::store::<Machine>();
    for m in machines {
        machines_writer.apply_watcher_event(&Event::Apply(m));
    }

    let (ms_store, mut ms_writer) = kube::runtime::reflector::store::<MachineSet>();
    for ms in machine_sets {
        ms_writer.apply_watcher_event(&Event::Apply(ms));
    }

    let (md_store, _md_writer) = kube::runtime::reflector::store::<MachineDeployment>();
    let (node_store, _node_writer) = kube::runtime::reflector::store::<Node>();

    Stores {
        machines: machines_store,
        machine_sets: ms_store,
        machine_deployments: md_store,
        nodes: node_store,
    }
}

#[test]
fn machines_matching_selector_filters_by_namespace_and_labels() {
    let selector =
        LabelSelector { match_labels: Some(labels(&[("app", "worker")])), match_expressions: None };
    let stores = stores_with(
        vec![
            test_machine("m1", "ns1", labels(&[("app", "worker")])),
            test_machine("m2", "ns1", labels(&[("app", "other")])),
            test_machine("m3", "ns2", labels(&[("app", "worker")])),
        ],
        vec![],
    );

    let matched = stores.machines_matching_selector(&selector, "ns1");
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].metadata.name.as_deref(), Some("m1"));
}

#[test]
fn machines_owned_by_matches_owner_reference_kind_and_name() {
    let mut machine = test_machine("m1", "ns1", labels(&[]));
    machine.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "cluster.k8s.io/v1alpha1".to_string(),
        kind: "MachineSet".to_string(),
        name: "workers-abc".to_string(),
        uid: "uid-1".to_string(),
        ..Default::default()
    }]);
    let unrelated = test_machine("m2", "ns1", labels(&[]));

    let stores = stores_with(vec![machine, unrelated], vec![]);
    let owned = stores.machines_owned_by("workers-abc", "ns1");
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].metadata.name.as_deref(), Some("m1"));
}

#[test]
fn get_machine_set_finds_by_name_and_namespace() {
    let stores = stores_with(vec![], vec![test_machine_set("workers-abc", "ns1", labels(&[]))]);
    assert!(stores.get_machine_set("workers-abc", "ns1").is_some());
    assert!(stores.get_machine_set("workers-abc", "ns2").is_none());
    assert!(stores.get_machine_set("missing", "ns1").is_none());
}
