// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::crd::{
    LabelSelector, MachineDeploymentSpec, MachineDeploymentStrategy, MachineSetSpec, MachineSpec,
    MachineTemplateMetadata, MachineTemplateSpec, ProviderSpec, RollingUpdateMachineDeployment,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::BTreeMap;

fn machine_spec() -> MachineSpec {
    MachineSpec { provider_spec: ProviderSpec { value: None }, versions: Default::default(), taints: None, config_source: None }
}

fn template() -> MachineTemplateSpec {
    MachineTemplateSpec { metadata: MachineTemplateMetadata::default(), spec: machine_spec() }
}

fn deployment(replicas: i32, max_surge: Option<IntOrString>, max_unavailable: Option<IntOrString>) -> MachineDeployment {
    MachineDeployment {
        metadata: ObjectMeta { generation: Some(1), ..Default::default() },
        spec: MachineDeploymentSpec {
            replicas,
            selector: LabelSelector::default(),
            template: template(),
            strategy: Some(MachineDeploymentStrategy {
                r#type: Some("RollingUpdate".to_string()),
                rolling_update: Some(RollingUpdateMachineDeployment { max_surge, max_unavailable }),
            }),
            min_ready_seconds: None,
            revision_history_limit: None,
            paused: None,
            progress_deadline_seconds: None,
        },
        status: None,
    }
}

fn machine_set_with(name: &str, replicas: i32, available: i32, created_secs_ago: i64) -> MachineSet {
    MachineSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            creation_timestamp: Some(Time(chrono::Utc::now() - chrono::Duration::seconds(created_secs_ago))),
            annotations: Some(BTreeMap::new()),
            ..Default::default()
        },
        spec: MachineSetSpec {
            replicas,
            selector: LabelSelector::default(),
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
fn max_surge_defaults_to_one() {
    let md = deployment(10, None, None);
    assert_eq!(max_surge(&md), 1);
}

#[test]
fn max_unavailable_defaults_to_zero() {
    let md = deployment(10, None, None);
    assert_eq!(max_unavailable(&md), 0);
}

#[test]
fn max_unavailable_fencepost_forces_one_when_both_budgets_are_zero() {
    let md = deployment(10, Some(IntOrString::Int(0)), Some(IntOrString::Int(0)));
    assert_eq!(max_surge(&md), 0);
    assert_eq!(max_unavailable(&md), 1);
}

#[test]
fn max_surge_resolves_percentage_rounding_up() {
    let md = deployment(10, Some(IntOrString::String("25%".to_string())), None);
    assert_eq!(max_surge(&md), 3);
}

#[test]
fn max_unavailable_resolves_percentage_rounding_down() {
    let md = deployment(10, None, Some(IntOrString::String("25%".to_string())));
    assert_eq!(max_unavailable(&md), 2);
}

#[test]
fn reconcile_new_machine_set_scales_up_within_surge_budget() {
    let md = deployment(10, Some(IntOrString::Int(1)), Some(IntOrString::Int(0)));
    let old = machine_set_with("old", 10, 10, 1000);
    let new_ms = machine_set_with("new", 0, 0, 0);
    let all = [&old, &new_ms];

    let target = reconcile_new_machine_set(&md, &all, &new_ms);
    assert_eq!(target, Some(1));
}

#[test]
fn reconcile_new_machine_set_returns_none_once_saturated() {
    let md = deployment(10, Some(IntOrString::Int(1)), Some(IntOrString::Int(0)));
    let new_ms = machine_set_with("new", 10, 10, 0);
    let all = [&new_ms];

    assert_eq!(reconcile_new_machine_set(&md, &all, &new_ms), None);
}

#[test]
fn reconcile_new_machine_set_scales_down_if_above_desired() {
    let md = deployment(5, Some(IntOrString::Int(1)), Some(IntOrString::Int(0)));
    let new_ms = machine_set_with("new", 8, 8, 0);
    let all = [&new_ms];

    assert_eq!(reconcile_new_machine_set(&md, &all, &new_ms), Some(5));
}

#[test]
fn reconcile_old_machine_sets_cleans_up_unhealthy_first() {
    let md = deployment(10, Some(IntOrString::Int(1)), Some(IntOrString::Int(1)));
    let old = machine_set_with("old", 10, 8, 1000);
    let new_ms = machine_set_with("new", 1, 1, 0);
    let all = [&old, &new_ms];
    let olds = [&old];

    let plan = reconcile_old_machine_sets(&md, &all, &olds, &new_ms);
    assert_eq!(plan, vec![("old".to_string(), 8)], "the 2 unhealthy replicas are cleaned up first");
}

#[test]
fn reconcile_old_machine_sets_no_scale_down_when_budget_exhausted() {
    let md = deployment(10, Some(IntOrString::Int(1)), Some(IntOrString::Int(0)));
    let old = machine_set_with("old", 9, 9, 1000);
    let new_ms = machine_set_with("new", 1, 0, 0);
    let all = [&old, &new_ms];
    let olds = [&old];

    let plan = reconcile_old_machine_sets(&md, &all, &olds, &new_ms);
    assert!(plan.is_empty(), "new Set being unavailable consumes the whole budget");
}

#[test]
fn new_ms_new_replicas_caps_at_desired() {
    let md = deployment(10, Some(IntOrString::Int(2)), Some(IntOrString::Int(0)));
    let old = machine_set_with("old", 10, 10, 1000);
    let new_ms = machine_set_with("new", 0, 0, 0);
    let all = [&old, &new_ms];

    assert_eq!(new_ms_new_replicas(&md, &all, &new_ms), 2);
}

#[test]
fn new_ms_new_replicas_unchanged_while_paused() {
    let mut md = deployment(10, Some(IntOrString::Int(2)), Some(IntOrString::Int(0)));
    md.spec.paused = Some(true);
    let new_ms = machine_set_with("new", 3, 3, 0);
    let all = [&new_ms];

    assert_eq!(new_ms_new_replicas(&md, &all, &new_ms), 3);
}

#[test]
fn scale_drives_single_active_set_directly_to_desired() {
    let md = deployment(5, None, None);
    let only = machine_set_with("only", 2, 2, 0);
    let active = [&only];

    let plan = scale(&md, &active, "only");
    assert_eq!(plan, vec![("only".to_string(), 5)]);
}

#[test]
fn scale_zeros_old_sets_once_new_set_is_saturated() {
    let md = deployment(5, None, None);
    let new_ms = machine_set_with("new", 5, 5, 0);
    let old = machine_set_with("old", 2, 2, 1000);
    let active = [&new_ms, &old];

    let plan = scale(&md, &active, "new");
    assert_eq!(plan, vec![("old".to_string(), 0)]);
}

#[test]
fn scale_allocates_remainder_to_largest_set_by_desired_replicas_annotation() {
    let md = deployment(10, Some(IntOrString::Int(0)), None);

    let mut a = machine_set_with("a", 1, 1, 3000);
    a.metadata.annotations = Some(BTreeMap::from([(DESIRED_REPLICAS_ANNOTATION.to_string(), "10".to_string())]));
    let mut b = machine_set_with("b", 1, 1, 2000);
    b.metadata.annotations = Some(BTreeMap::from([(DESIRED_REPLICAS_ANNOTATION.to_string(), "5".to_string())]));
    let mut c = machine_set_with("c", 1, 1, 1000);
    c.metadata.annotations = Some(BTreeMap::from([(DESIRED_REPLICAS_ANNOTATION.to_string(), "1".to_string())]));
    let active = [&a, &b, &c];

    let plan = scale(&md, &active, "a");
    let plan: BTreeMap<_, _> = plan.into_iter().collect();
    assert_eq!(*plan.get("a").unwrap(), 4, "index 0 (highest desired-replicas annotation) absorbs the rounding remainder");
    assert_eq!(*plan.get("b").unwrap(), 3);
    assert_eq!(*plan.get("c").unwrap(), 3);
    assert_eq!(plan.values().sum::<i32>(), 10, "every active Set's new replica count together equals the allowed size");
}

#[test]
fn deployment_complete_requires_matching_generation_and_full_availability() {
    let md = deployment(5, None, None);
    let mut status = crate::crd::MachineDeploymentStatus { updated_replicas: 5, available_replicas: 5, observed_generation: Some(1), ..Default::default() };
    assert!(deployment_complete(&md, &status));

    status.observed_generation = Some(0);
    assert!(!deployment_complete(&md, &status));

    status.observed_generation = Some(1);
    status.available_replicas = 4;
    assert!(!deployment_complete(&md, &status));
}
