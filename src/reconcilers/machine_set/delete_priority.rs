// SPDX-License-Identifier: Apache-2.0

//! Delete-prioritization scoring for `MachineSet` scale-down.
//!
//! Every candidate `Machine` is scored in `[0, 100]`; scale-down sorts descending and
//! removes the highest-scoring candidates first, so a Machine already marked for removal
//! (deletion timestamp, `delete-machine` annotation, or a terminal error) is always chosen
//! over a healthy one.

use crate::constants::{
    OLDEST_PRIORITY_TIME_CONSTANT_SECS, PRIORITY_BETTER_DELETE, PRIORITY_COULD_DELETE,
    PRIORITY_MUST_DELETE, PRIORITY_MUST_NOT_DELETE,
};
use crate::crd::Machine;
use crate::labels::DELETE_MACHINE_ANNOTATION;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use std::sync::Arc;

/// How a `MachineSet` chooses which excess Machines to delete first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Score by annotation/error markers only; ties broken arbitrarily.
    Random,
    /// Prefer deleting the most recently created Machines.
    Newest,
    /// Prefer deleting the oldest Machines.
    Oldest,
}

/// Parse `spec.deletePolicy`. Empty string and `"Random"` both mean [`DeletePolicy::Random`].
///
/// # Errors
///
/// Returns an error if `policy` is set to anything other than `"Random"`, `"Newest"`,
/// `"Oldest"`, or empty/absent.
pub fn parse_delete_policy(policy: Option<&str>) -> Result<DeletePolicy> {
    match policy.unwrap_or("") {
        "" | "Random" => Ok(DeletePolicy::Random),
        "Newest" => Ok(DeletePolicy::Newest),
        "Oldest" => Ok(DeletePolicy::Oldest),
        other => bail!("invalid deletePolicy {other:?}: must be Random, Newest, or Oldest"),
    }
}

fn has_delete_timestamp(machine: &Machine) -> bool {
    machine.metadata.deletion_timestamp.is_some()
}

fn is_annotated_or_errored(machine: &Machine) -> bool {
    machine.annotations().contains_key(DELETE_MACHINE_ANNOTATION)
        || machine.status.as_ref().is_some_and(crate::crd::MachineStatus::is_terminal_error)
}

fn age_seconds(machine: &Machine, now: DateTime<Utc>) -> Option<f64> {
    machine
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| (now - t.0).num_milliseconds() as f64 / 1000.0)
}

/// Score a single Machine for deletion priority under `policy`. Higher scores are
/// deleted first.
///
/// A Machine with a deletion timestamp always scores `mustDelete`. Annotated/errored
/// Machines score `mustDelete` under the age-ordered policies (`Newest`/`Oldest`), but
/// only `betterDelete` under `Random`, where the remaining age-insensitive baseline is
/// `couldDelete`.
#[must_use]
pub fn score_machine(machine: &Machine, policy: DeletePolicy, now: DateTime<Utc>) -> f64 {
    if has_delete_timestamp(machine) {
        return PRIORITY_MUST_DELETE;
    }

    if is_annotated_or_errored(machine) {
        return if policy == DeletePolicy::Random { PRIORITY_BETTER_DELETE } else { PRIORITY_MUST_DELETE };
    }

    let Some(age) = age_seconds(machine, now) else {
        return PRIORITY_MUST_NOT_DELETE;
    };
    if age <= 0.0 {
        return PRIORITY_MUST_NOT_DELETE;
    }

    match policy {
        DeletePolicy::Random => PRIORITY_COULD_DELETE,
        DeletePolicy::Oldest => 100.0 * (1.0 - (-age / OLDEST_PRIORITY_TIME_CONSTANT_SECS).exp()),
        DeletePolicy::Newest => {
            let oldest_score = 100.0 * (1.0 - (-age / OLDEST_PRIORITY_TIME_CONSTANT_SECS).exp());
            100.0 - oldest_score
        }
    }
}

/// Select `count` Machines for deletion, highest delete-priority first.
#[must_use]
pub fn select_for_deletion(
    mut machines: Vec<Arc<Machine>>,
    count: usize,
    policy: DeletePolicy,
    now: DateTime<Utc>,
) -> Vec<Arc<Machine>> {
    machines.sort_by(|a, b| {
        score_machine(b, policy, now)
            .partial_cmp(&score_machine(a, policy, now))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    machines.truncate(count);
    machines
}

#[cfg(test)]
#[path = "delete_priority_tests.rs"]
mod delete_priority_tests;
