// SPDX-License-Identifier: Apache-2.0

//! Pure rolling-update budget math for the rollout state machine:
//! surge/unavailability accounting for the active `MachineSet`s plus the proportional
//! `scale()` used while paused or mid-rollout. None of these functions touch the
//! Kubernetes API; [`super`] applies whatever replica counts they return.

use crate::crd::{IntOrString, MachineDeployment, MachineDeploymentStatus, MachineSet};
use crate::labels::{DESIRED_REPLICAS_ANNOTATION, MAX_REPLICAS_ANNOTATION};
use kube::ResourceExt;
use std::cmp::Ordering;

/// Resolve `spec.strategy.rollingUpdate.maxSurge`, defaulting to `1`.
#[must_use]
pub fn max_surge(md: &MachineDeployment) -> i32 {
    let raw = md
        .spec
        .strategy
        .as_ref()
        .and_then(|s| s.rolling_update.as_ref())
        .and_then(|ru| ru.max_surge.clone())
        .unwrap_or(IntOrString::Int(1));
    raw.resolve(md.spec.replicas, true).max(0)
}

/// Resolve `spec.strategy.rollingUpdate.maxUnavailable`, defaulting to `0`. Applies the
/// upstream Deployment "fencepost" guarantee: if both budgets would resolve to zero, the
/// unavailable budget is raised to `1` so a rollout with replicas > 0 can always progress.
#[must_use]
pub fn max_unavailable(md: &MachineDeployment) -> i32 {
    let raw = md
        .spec
        .strategy
        .as_ref()
        .and_then(|s| s.rolling_update.as_ref())
        .and_then(|ru| ru.max_unavailable.clone())
        .unwrap_or(IntOrString::Int(0));
    let resolved = raw.resolve(md.spec.replicas, false).max(0);
    if resolved == 0 && max_surge(md) == 0 && md.spec.replicas > 0 {
        1
    } else {
        resolved
    }
}

fn replicas(ms: &MachineSet) -> i32 {
    ms.spec.replicas
}

fn available_replicas(ms: &MachineSet) -> i32 {
    ms.status.as_ref().map_or(0, |s| s.available_replicas)
}

fn total_replicas(all: &[&MachineSet]) -> i32 {
    all.iter().map(|ms| replicas(ms)).sum()
}

fn creation_time(ms: &MachineSet) -> Option<chrono::DateTime<chrono::Utc>> {
    ms.metadata.creation_timestamp.as_ref().map(|t| t.0)
}

/// Scale-up step (`reconcileNewMachineSet`): the replica count `new_ms` should be driven
/// to, or `None` if it is already correct.
#[must_use]
pub fn reconcile_new_machine_set(
    md: &MachineDeployment,
    all: &[&MachineSet],
    new_ms: &MachineSet,
) -> Option<i32> {
    let desired = md.spec.replicas;
    let current = replicas(new_ms);

    match current.cmp(&desired) {
        Ordering::Equal => None,
        Ordering::Greater => Some(desired),
        Ordering::Less => {
            let allowed_total = desired + max_surge(md);
            let room = (allowed_total - total_replicas(all)).max(0);
            Some((current + room).min(desired))
        }
    }
}

/// Scale-down step (`reconcileOldMachineSets`): `(name, new_replica_count)` pairs for
/// every old Set whose replica count should change, computed in two passes — unhealthy
/// replicas first, then a proportional trim of the remaining healthy surplus.
#[must_use]
pub fn reconcile_old_machine_sets(
    md: &MachineDeployment,
    all: &[&MachineSet],
    old: &[&MachineSet],
    new_ms: &MachineSet,
) -> Vec<(String, i32)> {
    let desired = md.spec.replicas;
    let min_available = desired - max_unavailable(md);
    let new_unavailable = replicas(new_ms) - available_replicas(new_ms);
    let mut max_scaled_down = total_replicas(all) - min_available - new_unavailable;
    if max_scaled_down <= 0 {
        return Vec::new();
    }

    let mut sorted: Vec<&MachineSet> = old.to_vec();
    sorted.sort_by_key(|ms| creation_time(ms));

    let mut remaining: Vec<i32> = sorted.iter().map(|ms| replicas(ms)).collect();

    // Pass 1: clean up unhealthy replicas, oldest Set first.
    for (idx, ms) in sorted.iter().enumerate() {
        if max_scaled_down <= 0 {
            break;
        }
        let unhealthy = (remaining[idx] - available_replicas(ms)).max(0);
        if unhealthy == 0 {
            continue;
        }
        let scaled_down = unhealthy.min(max_scaled_down);
        remaining[idx] -= scaled_down;
        max_scaled_down -= scaled_down;
    }

    // Pass 2: only if we're still above minAvailable, trim healthy surplus, oldest first.
    let available_machine_count: i32 = sorted.iter().map(|ms| available_replicas(ms)).sum();
    if available_machine_count > min_available {
        let mut budget = available_machine_count - min_available;
        for (idx, _ms) in sorted.iter().enumerate() {
            if budget <= 0 {
                break;
            }
            let current = remaining[idx];
            if current == 0 {
                continue;
            }
            let scaled_down = current.min(budget);
            remaining[idx] -= scaled_down;
            budget -= scaled_down;
        }
    }

    sorted
        .iter()
        .enumerate()
        .filter(|(idx, ms)| remaining[*idx] != replicas(ms))
        .map(|(idx, ms)| (ms.name_any(), remaining[idx]))
        .collect()
}

/// `NewMSNewReplicas`: the replica count the new Set should carry right now, derived
/// purely from observed state. Paused or non-rolling Deployments leave it unchanged —
/// the caller is responsible for not creating new Sets in that case.
#[must_use]
pub fn new_ms_new_replicas(md: &MachineDeployment, all: &[&MachineSet], new_ms: &MachineSet) -> i32 {
    let is_rolling = md
        .spec
        .strategy
        .as_ref()
        .and_then(|s| s.r#type.as_deref())
        .is_none_or(|t| t == crate::constants::STRATEGY_ROLLING_UPDATE);

    if md.spec.paused.unwrap_or(false) || !is_rolling {
        return replicas(new_ms);
    }

    let desired = md.spec.replicas;
    let allowed_total = desired + max_surge(md);
    let target = replicas(new_ms) + allowed_total - total_replicas(all);
    target.clamp(0, desired)
}

fn desired_replicas_annotation(ms: &MachineSet) -> i32 {
    ms.annotations()
        .get(DESIRED_REPLICAS_ANNOTATION)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn max_replicas_annotation(ms: &MachineSet) -> i32 {
    ms.annotations()
        .get(MAX_REPLICAS_ANNOTATION)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Proportional scaling used while paused or in steady state:
/// - a single active Set is driven directly to `spec.replicas`;
/// - once `new_ms_name` is saturated (replicas == desired), every other active Set is
///   driven to zero;
/// - otherwise the remaining headroom (`desired + maxSurge - total`) is allocated across
///   all active Sets in proportion to their current replica count, with the Set carrying
///   the largest `desired-replicas` annotation (ties: `max-replicas` annotation, then
///   oldest creation time) absorbing the rounding remainder (the
///   list is sorted descending before this step so index 0 is reliably "the largest").
#[must_use]
pub fn scale(md: &MachineDeployment, active: &[&MachineSet], new_ms_name: &str) -> Vec<(String, i32)> {
    let desired = md.spec.replicas;

    if active.len() == 1 {
        let only = active[0];
        return if replicas(only) == desired { Vec::new() } else { vec![(only.name_any(), desired)] };
    }

    let new_saturated = active
        .iter()
        .find(|ms| ms.name_any() == new_ms_name)
        .is_some_and(|ms| replicas(ms) >= desired);

    if new_saturated {
        return active
            .iter()
            .filter(|ms| ms.name_any() != new_ms_name && replicas(ms) != 0)
            .map(|ms| (ms.name_any(), 0))
            .collect();
    }

    let total = total_replicas(active);
    if total == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<&MachineSet> = active.to_vec();
    sorted.sort_by(|a, b| {
        desired_replicas_annotation(b)
            .cmp(&desired_replicas_annotation(a))
            .then_with(|| max_replicas_annotation(b).cmp(&max_replicas_annotation(a)))
            .then_with(|| creation_time(a).cmp(&creation_time(b)))
    });

    let allowed_size = desired + max_surge(md);
    let to_add = allowed_size - total;

    let mut proportions = vec![0i32; sorted.len()];
    let mut allocated_rest = 0;
    for (idx, ms) in sorted.iter().enumerate().skip(1) {
        let share = (f64::from(to_add) * f64::from(replicas(ms)) / f64::from(total)).round() as i32;
        proportions[idx] = share;
        allocated_rest += share;
    }
    proportions[0] = to_add - allocated_rest;

    sorted
        .iter()
        .enumerate()
        .filter_map(|(idx, ms)| {
            let new_replicas = (replicas(ms) + proportions[idx]).max(0);
            (new_replicas != replicas(ms)).then(|| (ms.name_any(), new_replicas))
        })
        .collect()
}

/// `DeploymentComplete`: true once the new Set carries every desired, available replica
/// and the status reflects the current generation.
#[must_use]
pub fn deployment_complete(md: &MachineDeployment, status: &MachineDeploymentStatus) -> bool {
    let desired = md.spec.replicas;
    status.updated_replicas == desired
        && status.available_replicas == desired
        && status
            .observed_generation
            .zip(md.metadata.generation)
            .is_some_and(|(observed, generation)| observed >= generation)
}

#[cfg(test)]
#[path = "rollout_tests.rs"]
mod rollout_tests;
