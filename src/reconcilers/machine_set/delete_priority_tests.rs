// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::crd::{MachineSpec, MachineStatus, MachineVersionInfo, ProviderSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::BTreeMap;

fn machine_at_age(name: &str, age_secs: i64, now: DateTime<Utc>) -> Arc<Machine> {
    Arc::new(Machine {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            creation_timestamp: Some(Time(now - chrono::Duration::seconds(age_secs))),
            ..Default::default()
        },
        spec: MachineSpec {
            provider_spec: ProviderSpec { value: None },
            versions: MachineVersionInfo::default(),
            taints: None,
            config_source: None,
        },
        status: None,
    })
}

fn errored_machine(name: &str, now: DateTime<Utc>) -> Arc<Machine> {
    let mut m = (*machine_at_age(name, 100, now)).clone();
    m.status = Some(MachineStatus { error_reason: Some("CreateMachineError".to_string()), ..Default::default() });
    Arc::new(m)
}

fn deleting_machine(name: &str, now: DateTime<Utc>) -> Arc<Machine> {
    let mut m = (*machine_at_age(name, 100, now)).clone();
    m.metadata.deletion_timestamp = Some(Time(now));
    Arc::new(m)
}

#[test]
fn parse_delete_policy_accepts_known_values() {
    assert_eq!(parse_delete_policy(None).unwrap(), DeletePolicy::Random);
    assert_eq!(parse_delete_policy(Some("")).unwrap(), DeletePolicy::Random);
    assert_eq!(parse_delete_policy(Some("Random")).unwrap(), DeletePolicy::Random);
    assert_eq!(parse_delete_policy(Some("Newest")).unwrap(), DeletePolicy::Newest);
    assert_eq!(parse_delete_policy(Some("Oldest")).unwrap(), DeletePolicy::Oldest);
}

#[test]
fn parse_delete_policy_rejects_unknown_value() {
    assert!(parse_delete_policy(Some("Weighted")).is_err());
}

#[test]
fn deleting_machine_always_scores_must_delete() {
    let now = Utc::now();
    let m = deleting_machine("m1", now);
    assert_eq!(score_machine(&m, DeletePolicy::Random, now), PRIORITY_MUST_DELETE);
    assert_eq!(score_machine(&m, DeletePolicy::Oldest, now), PRIORITY_MUST_DELETE);
}

#[test]
fn errored_machine_scores_better_delete_under_random_but_must_delete_otherwise() {
    let now = Utc::now();
    let m = errored_machine("m1", now);
    assert_eq!(score_machine(&m, DeletePolicy::Random, now), PRIORITY_BETTER_DELETE);
    assert_eq!(score_machine(&m, DeletePolicy::Oldest, now), PRIORITY_MUST_DELETE);
    assert_eq!(score_machine(&m, DeletePolicy::Newest, now), PRIORITY_MUST_DELETE);
}

#[test]
fn random_policy_baseline_is_could_delete() {
    let now = Utc::now();
    let m = machine_at_age("m1", 100, now);
    assert_eq!(score_machine(&m, DeletePolicy::Random, now), PRIORITY_COULD_DELETE);
}

#[test]
fn oldest_policy_prefers_older_machines() {
    let now = Utc::now();
    let young = machine_at_age("young", 10, now);
    let old = machine_at_age("old", 1_000_000, now);
    assert!(score_machine(&old, DeletePolicy::Oldest, now) > score_machine(&young, DeletePolicy::Oldest, now));
}

#[test]
fn newest_policy_prefers_younger_machines() {
    let now = Utc::now();
    let young = machine_at_age("young", 10, now);
    let old = machine_at_age("old", 1_000_000, now);
    assert!(score_machine(&young, DeletePolicy::Newest, now) > score_machine(&old, DeletePolicy::Newest, now));
}

#[test]
fn select_for_deletion_picks_highest_scores_first() {
    let now = Utc::now();
    let machines = vec![
        machine_at_age("healthy", 100, now),
        deleting_machine("terminating", now),
        errored_machine("errored", now),
    ];
    let selected = select_for_deletion(machines, 2, DeletePolicy::Random, now);
    assert_eq!(selected.len(), 2);
    let names: Vec<&str> = selected.iter().map(|m| m.metadata.name.as_deref().unwrap()).collect();
    assert!(names.contains(&"terminating"));
    assert!(names.contains(&"errored"));
}

#[test]
fn select_for_deletion_truncates_to_count() {
    let now = Utc::now();
    let machines: Vec<_> = (0..5).map(|i| machine_at_age(&format!("m{i}"), i * 10, now)).collect();
    let selected = select_for_deletion(machines, 2, DeletePolicy::Oldest, now);
    assert_eq!(selected.len(), 2);
}

#[allow(dead_code)]
fn unused_btreemap_import_anchor() -> BTreeMap<String, String> {
    BTreeMap::new()
}
