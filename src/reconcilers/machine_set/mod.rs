// SPDX-License-Identifier: Apache-2.0

//! Maintains a fixed replica count of `Machine`s matching one `MachineSet`'s template
//! revision: adopts/releases Machines by selector, creates or deletes to close the
//! replica diff, and recomputes status by walking the owned Machines.

pub mod delete_priority;

use crate::constants::REQUEUE_WHEN_READY_SECS;
use crate::context::Context;
use crate::crd::{LabelMap, Machine, MachineSet, MachineSetStatus};
use delete_priority::{parse_delete_policy, select_for_deletion};
use crate::selector::{is_superset, matches_selector, merge_labels};
use anyhow::Result;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Reconcile one `MachineSet`: adopt/release Machines, close the replica diff, and write
/// back observed status.
///
/// # Errors
///
/// Returns an error on any Kubernetes API failure, or if `spec.deletePolicy` names an
/// unrecognized policy (a fatal configuration error).
pub async fn reconcile_machine_set(ms: Arc<MachineSet>, ctx: Arc<Context>) -> Result<Action> {
    if ms.metadata.deletion_timestamp.is_some() {
        return delete_machine_set(&ms);
    }

    let namespace = ms.namespace().unwrap_or_default();
    let name = ms.name_any();

    let mut controlled = adopt_and_release(&ctx, &ms, &namespace, &name).await?;

    let diff = controlled.len() as i32 - ms.spec.replicas;
    if diff < 0 {
        create_machines(&ctx, &ms, (-diff) as usize).await?;
    } else if diff > 0 {
        let policy = parse_delete_policy(ms.spec.delete_policy.as_deref())?;
        let to_delete = select_for_deletion(controlled.clone(), diff as usize, policy, Utc::now());
        for machine in &to_delete {
            delete_machine_object(&ctx, machine).await?;
        }
        let deleted_names: std::collections::BTreeSet<_> =
            to_delete.iter().map(|m| m.name_any()).collect();
        controlled.retain(|m| !deleted_names.contains(&m.name_any()));
    }

    let status = compute_status(&ctx.stores, &ms, &controlled);
    write_status(&ctx, &ms, status).await?;

    info!(machine_set = %name, replicas = controlled.len(), desired = ms.spec.replicas, "reconciled MachineSet");
    Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
}

/// Handle a `MachineSet` with a deletion timestamp. `MachineSet` carries no finalizer of
/// its own; owned Machines are cascade-deleted by the Kubernetes garbage collector via
/// their ownerReferences, so there is nothing left for this reconciler to drive.
///
/// # Errors
///
/// Never returns an error; the signature matches the other reconcilers' `Result<Action>`
/// convention.
pub fn delete_machine_set(ms: &MachineSet) -> Result<Action> {
    debug!(machine_set = %ms.name_any(), "MachineSet terminating, owned Machines cascade-delete via garbage collection");
    Ok(Action::await_change())
}

/// Adopt matching, unowned Machines and release owned Machines that no longer match the
/// selector; returns the resulting set of Machines controlled by `ms`.
async fn adopt_and_release(
    ctx: &Context,
    ms: &MachineSet,
    namespace: &str,
    name: &str,
) -> Result<Vec<Arc<Machine>>> {
    let mut controlled = ctx.stores.machines_owned_by(name, namespace);

    for machine in controlled.clone() {
        if !matches_selector(&ms.spec.selector, machine.labels()) {
            release_machine(ctx, &machine).await?;
        }
    }
    controlled.retain(|m| matches_selector(&ms.spec.selector, m.labels()));

    for machine in ctx.stores.machines_matching_selector(&ms.spec.selector, namespace) {
        let has_controller = machine.owner_references().iter().any(|r| r.controller == Some(true));
        if !has_controller && machine.metadata.deletion_timestamp.is_none() {
            adopt_machine(ctx, ms, &machine).await?;
            controlled.push(machine);
        }
    }

    Ok(controlled)
}

fn owner_reference_for(ms: &MachineSet) -> OwnerReference {
    OwnerReference {
        api_version: MachineSet::api_version(&()).to_string(),
        kind: MachineSet::kind(&()).to_string(),
        name: ms.name_any(),
        uid: ms.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

async fn adopt_machine(ctx: &Context, ms: &MachineSet, machine: &Machine) -> Result<()> {
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), &machine.namespace().unwrap_or_default());
    let owner_ref = serde_json::to_value(owner_reference_for(ms))?;
    let patch = json!({ "metadata": { "ownerReferences": [owner_ref] } });
    api.patch(&machine.name_any(), &PatchParams::default(), &Patch::Merge(&patch)).await?;
    info!(machine = %machine.name_any(), machine_set = %ms.name_any(), "adopted Machine");
    Ok(())
}

async fn release_machine(ctx: &Context, machine: &Machine) -> Result<()> {
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), &machine.namespace().unwrap_or_default());
    let remaining: Vec<_> = machine
        .owner_references()
        .iter()
        .filter(|r| r.kind != "MachineSet")
        .cloned()
        .collect();
    let patch = json!({ "metadata": { "ownerReferences": remaining } });
    api.patch(&machine.name_any(), &PatchParams::default(), &Patch::Merge(&patch)).await?;
    info!(machine = %machine.name_any(), "released Machine, no longer matches selector");
    Ok(())
}

fn random_suffix() -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..5).map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char).collect()
}

async fn create_machines(ctx: &Context, ms: &MachineSet, count: usize) -> Result<()> {
    let namespace = ms.namespace().unwrap_or_default();
    let template_labels = ms.spec.template.metadata.labels.clone().unwrap_or_default();
    let selector_labels = ms.spec.selector.match_labels.clone().unwrap_or_default();
    let labels: LabelMap = merge_labels(&selector_labels, &template_labels);
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), &namespace);

    for _ in 0..count {
        let machine = Machine {
            metadata: ObjectMeta {
                name: Some(format!("{}-{}", ms.name_any(), random_suffix())),
                namespace: Some(namespace.clone()),
                labels: Some(labels.clone()),
                annotations: ms.spec.template.metadata.annotations.clone(),
                owner_references: Some(vec![owner_reference_for(ms)]),
                ..Default::default()
            },
            spec: ms.spec.template.spec.clone(),
            status: None,
        };

        let created = crate::reconcilers::retry::retry_api_call(
            || api.create(&PostParams::default(), &machine),
            "create Machine",
        )
        .await?;
        info!(machine = %created.name_any(), machine_set = %ms.name_any(), "created Machine");
    }

    Ok(())
}

async fn delete_machine_object(ctx: &Context, machine: &Machine) -> Result<()> {
    let namespace = machine.namespace().unwrap_or_default();
    let name = machine.name_any();
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), &namespace);

    let result = crate::reconcilers::retry::retry_api_call(
        || api.delete(&name, &DeleteParams::default()),
        "delete Machine",
    )
    .await;

    match result {
        Ok(_) => {
            info!(machine = %name, "deleted excess Machine");
            Ok(())
        }
        Err(e) => match e.downcast_ref::<kube::Error>() {
            Some(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            _ => Err(e),
        },
    }
}

fn node_ready_since(node: &Node) -> Option<DateTime<Utc>> {
    let conditions = node.status.as_ref()?.conditions.as_ref()?;
    let ready = conditions.iter().find(|c| c.type_ == "Ready")?;
    if ready.status != "True" {
        return None;
    }
    Some(ready.last_transition_time.as_ref()?.0)
}

fn compute_status(
    stores: &crate::context::Stores,
    ms: &MachineSet,
    controlled: &[Arc<Machine>],
) -> MachineSetStatus {
    let template_labels = ms.spec.template.metadata.labels.clone().unwrap_or_default();
    let min_ready_seconds = i64::from(ms.spec.min_ready_seconds.unwrap_or(0));
    let now = Utc::now();

    let live: Vec<&Arc<Machine>> =
        controlled.iter().filter(|m| m.metadata.deletion_timestamp.is_none()).collect();

    let mut fully_labeled = 0;
    let mut ready = 0;
    let mut available = 0;

    for machine in &live {
        if is_superset(machine.labels(), &template_labels) {
            fully_labeled += 1;
        }
        if let Some(node) = stores.find_node_for_machine(machine) {
            if let Some(ready_since) = node_ready_since(&node) {
                ready += 1;
                if now.signed_duration_since(ready_since).num_seconds() >= min_ready_seconds {
                    available += 1;
                }
            }
        }
    }

    MachineSetStatus {
        replicas: live.len() as i32,
        fully_labeled_replicas: fully_labeled,
        ready_replicas: ready,
        available_replicas: available,
        observed_generation: ms.metadata.generation,
    }
}

async fn write_status(ctx: &Context, ms: &MachineSet, status: MachineSetStatus) -> Result<()> {
    let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), &ms.namespace().unwrap_or_default());
    let name = ms.name_any();
    let status_patch = json!({ "status": status });

    match api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch)).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => {
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&status_patch)).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
