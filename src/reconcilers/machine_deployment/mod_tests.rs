// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::crd::{MachineSetSpec, MachineSpec, MachineTemplateMetadata, MachineTemplateSpec, ProviderSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

fn machine_spec() -> MachineSpec {
    MachineSpec { provider_spec: ProviderSpec { value: None }, versions: Default::default(), taints: None, config_source: None }
}

fn template() -> MachineTemplateSpec {
    MachineTemplateSpec { metadata: MachineTemplateMetadata::default(), spec: machine_spec() }
}

fn deployment(name: &str, replicas: i32) -> MachineDeployment {
    MachineDeployment {
        metadata: ObjectMeta { name: Some(name.to_string()), generation: Some(3), uid: Some("md-uid".to_string()), ..Default::default() },
        spec: crate::crd::MachineDeploymentSpec {
            replicas,
            selector: crate::crd::LabelSelector::default(),
            template: template(),
            strategy: None,
            min_ready_seconds: None,
            revision_history_limit: None,
            paused: None,
            progress_deadline_seconds: None,
        },
        status: None,
    }
}

fn machine_set_with_annotations(name: &str, replicas: i32, available: i32, revision: i64) -> MachineSet {
    let mut annotations = BTreeMap::new();
    annotations.insert(REVISION_ANNOTATION.to_string(), revision.to_string());

    MachineSet {
        metadata: ObjectMeta { name: Some(name.to_string()), annotations: Some(annotations), ..Default::default() },
        spec: MachineSetSpec {
            replicas,
            selector: crate::crd::LabelSelector::default(),
            template: template(),
            min_ready_seconds: None,
            delete_policy: None,
        },
        status: Some(crate::crd::MachineSetStatus {
            replicas,
            fully_labeled_replicas: replicas,
            ready_replicas: available,
            available_replicas: available,
            observed_generation: None,
        }),
    }
}

#[test]
fn owner_reference_for_marks_controller_and_blocks_owner_deletion() {
    let md = deployment("workers", 3);
    let owner_ref = owner_reference_for(&md);

    assert_eq!(owner_ref.kind, "MachineDeployment");
    assert_eq!(owner_ref.name, "workers");
    assert_eq!(owner_ref.uid, "md-uid");
    assert_eq!(owner_ref.controller, Some(true));
    assert_eq!(owner_ref.block_owner_deletion, Some(true));
}

#[test]
fn next_revision_is_one_more_than_highest_existing() {
    let sets = vec![machine_set_with_annotations("a", 1, 1, 1), machine_set_with_annotations("b", 1, 1, 4)];
    assert_eq!(next_revision(&sets), 5);
}

#[test]
fn next_revision_starts_at_one_with_no_existing_sets() {
    assert_eq!(next_revision(&[]), 1);
}

#[test]
fn compute_status_sums_replicas_across_active_sets_only() {
    let md = deployment("workers", 6);
    let current = machine_set_with_annotations("workers-new", 4, 4, 2);
    let old = machine_set_with_annotations("workers-old", 2, 2, 1);
    let scaled_down = machine_set_with_annotations("workers-ancient", 0, 0, 0);

    let status = compute_status(&md, &[current, old, scaled_down]);

    assert_eq!(status.replicas, 6, "only Sets with replicas > 0 count toward status.replicas");
    assert_eq!(status.available_replicas, 6);
    assert_eq!(status.updated_replicas, 4, "the highest-revision Set is the updated one");
    assert_eq!(status.unavailable_replicas, 0);
    assert_eq!(status.observed_generation, Some(3));
}

#[test]
fn compute_status_reports_unavailable_replicas_below_desired() {
    let md = deployment("workers", 10);
    let current = machine_set_with_annotations("workers-new", 10, 6, 1);

    let status = compute_status(&md, &[current]);

    assert_eq!(status.unavailable_replicas, 4);
    assert!(
        status.conditions.iter().any(|c| c.r#type == "Available" && c.status == "False"),
        "availability condition reflects the shortfall"
    );
}

#[test]
fn upsert_condition_replaces_existing_type_on_status_change() {
    let mut conditions = vec![crate::reconcilers::status::create_condition("Available", "False", "Waiting", "not yet")];
    upsert_condition(&mut conditions, crate::reconcilers::status::create_condition("Available", "True", "Ready", "now ready"));

    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].status, "True");
}

#[test]
fn upsert_condition_appends_new_type() {
    let mut conditions = vec![crate::reconcilers::status::create_condition("Available", "True", "Ready", "ok")];
    upsert_condition(&mut conditions, crate::reconcilers::status::create_condition("Progressing", "True", "RolloutDone", "done"));

    assert_eq!(conditions.len(), 2);
}

#[test]
fn delete_machine_deployment_awaits_change_without_error() {
    let md = deployment("workers", 3);
    let action = delete_machine_deployment(&md);
    assert!(action.is_ok());
}
