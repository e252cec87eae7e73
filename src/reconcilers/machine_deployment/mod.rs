// SPDX-License-Identifier: Apache-2.0

//! Rolls out `spec.template` changes across owned `MachineSet`s: computes the
//! template-hash revision, creates or reuses the `MachineSet` for it, then drives
//! replica counts across the active Sets via the rolling-update (or, while paused,
//! purely proportional) algorithm in [`rollout`].

pub mod rollout;

use crate::constants::{REQUEUE_WHEN_READY_SECS, STRATEGY_ROLLING_UPDATE};
use crate::context::Context;
use crate::crd::{
    Condition, MachineDeployment, MachineDeploymentStatus, MachineSet, MachineSetSpec,
};
use crate::hash::{compute_template_hash, machine_set_name, template_equal_ignoring_hash};
use crate::labels::{
    DESIRED_REPLICAS_ANNOTATION, MACHINE_TEMPLATE_HASH_LABEL, MAX_REPLICAS_ANNOTATION,
    REVISION_ANNOTATION,
};
use crate::reconcilers::status::create_condition;
use crate::selector::{matches_selector, merge_labels};
use anyhow::{bail, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Number of salted rehashes attempted before giving up on a `MachineSet` name
/// collision. Mirrors the upstream Deployment controller's retry budget.
const MAX_HASH_COLLISIONS: i32 = 10;

/// Reconcile one `MachineDeployment`: adopt/release owned `MachineSet`s,
/// materialize the current template's revision as a `MachineSet`, roll replicas across
/// active Sets, then trim old Sets down to `revisionHistoryLimit`.
///
/// # Errors
///
/// Returns an error on any Kubernetes API failure, an unsupported `strategy.type`, or a
/// `MachineSet` name collision that persists past [`MAX_HASH_COLLISIONS`] retries.
pub async fn reconcile_machine_deployment(
    md: Arc<MachineDeployment>,
    ctx: Arc<Context>,
) -> Result<Action> {
    if md.metadata.deletion_timestamp.is_some() {
        return delete_machine_deployment(&md);
    }

    if let Some(strategy) = md.spec.strategy.as_ref() {
        if strategy.r#type.as_deref().is_some_and(|t| t != STRATEGY_ROLLING_UPDATE) {
            bail!(
                "machinedeployment {}: unsupported strategy.type {:?}, only RollingUpdate is supported",
                md.name_any(),
                strategy.r#type
            );
        }
    }

    let namespace = md.namespace().unwrap_or_default();
    let name = md.name_any();

    let mut sets = adopt_and_release(&ctx, &md, &namespace, &name).await?;
    let new_ms = get_or_create_new_machine_set(&ctx, &md, &namespace, &mut sets).await?;
    sync_replica_annotations(&ctx, &md, &mut sets).await?;

    if md.spec.paused.unwrap_or(false) {
        let active: Vec<&MachineSet> = sets.iter().filter(|ms| ms.spec.replicas > 0).collect();
        let active = if active.iter().any(|ms| ms.name_any() == new_ms.name_any()) {
            active
        } else {
            sets.iter().chain(std::iter::once(&new_ms)).collect::<Vec<_>>()
        };
        let plan = rollout::scale(&md, &active, &new_ms.name_any());
        apply_scale_plan(&ctx, &namespace, &mut sets, &new_ms, &plan).await?;
    } else {
        roll(&ctx, &md, &namespace, &mut sets, &new_ms).await?;
    }

    cleanup_old_machine_sets(&ctx, &md, &namespace, &sets, &new_ms).await?;

    let status = compute_status(&md, &sets);
    write_status(&ctx, &md, status).await?;

    info!(machine_deployment = %name, "reconciled MachineDeployment");
    Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
}

/// Handle a `MachineDeployment` with a deletion timestamp. It carries no finalizer of
/// its own; owned `MachineSet`s (and transitively their Machines) cascade-delete via
/// their ownerReferences.
///
/// # Errors
///
/// Never returns an error; the signature matches the other reconcilers' `Result<Action>`
/// convention.
fn delete_machine_deployment(md: &MachineDeployment) -> Result<Action> {
    debug!(machine_deployment = %md.name_any(), "MachineDeployment terminating, owned MachineSets cascade-delete via garbage collection");
    Ok(Action::await_change())
}

async fn adopt_and_release(
    ctx: &Context,
    md: &MachineDeployment,
    namespace: &str,
    name: &str,
) -> Result<Vec<MachineSet>> {
    let owned = ctx.stores.machine_sets_owned_by(name, namespace);
    let mut controlled = Vec::with_capacity(owned.len());

    for ms in owned {
        if matches_selector(&md.spec.selector, ms.labels()) {
            controlled.push((*ms).clone());
        } else {
            release_machine_set(ctx, &ms).await?;
        }
    }

    for ms in ctx.stores.machine_sets_matching_selector(&md.spec.selector, namespace) {
        let has_controller = ms.owner_references().iter().any(|r| r.controller == Some(true));
        if !has_controller && ms.metadata.deletion_timestamp.is_none() {
            adopt_machine_set(ctx, md, &ms).await?;
            controlled.push((*ms).clone());
        }
    }

    Ok(controlled)
}

fn owner_reference_for(md: &MachineDeployment) -> OwnerReference {
    OwnerReference {
        api_version: MachineDeployment::api_version(&()).to_string(),
        kind: MachineDeployment::kind(&()).to_string(),
        name: md.name_any(),
        uid: md.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

async fn adopt_machine_set(ctx: &Context, md: &MachineDeployment, ms: &MachineSet) -> Result<()> {
    let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), &ms.namespace().unwrap_or_default());
    let owner_ref = serde_json::to_value(owner_reference_for(md))?;
    let patch = json!({ "metadata": { "ownerReferences": [owner_ref] } });
    api.patch(&ms.name_any(), &PatchParams::default(), &Patch::Merge(&patch)).await?;
    info!(machine_set = %ms.name_any(), machine_deployment = %md.name_any(), "adopted MachineSet");
    Ok(())
}

async fn release_machine_set(ctx: &Context, ms: &MachineSet) -> Result<()> {
    let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), &ms.namespace().unwrap_or_default());
    let remaining: Vec<_> = ms
        .owner_references()
        .iter()
        .filter(|r| r.kind != "MachineDeployment")
        .cloned()
        .collect();
    let patch = json!({ "metadata": { "ownerReferences": remaining } });
    api.patch(&ms.name_any(), &PatchParams::default(), &Patch::Merge(&patch)).await?;
    info!(machine_set = %ms.name_any(), "released MachineSet, no longer matches selector");
    Ok(())
}

fn revision_of(ms: &MachineSet) -> i64 {
    ms.annotations().get(REVISION_ANNOTATION).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn next_revision(sets: &[MachineSet]) -> i64 {
    sets.iter().map(revision_of).max().unwrap_or(0) + 1
}

/// Find the `MachineSet` matching `md`'s current template among `sets`, creating it if
/// none exists. Reuses `collision_count` from `md.status` as the initial salt and
/// advances it, persisting nothing extra here; the caller's status write carries the
/// final value back via [`compute_status`] reading the created Set's label.
async fn get_or_create_new_machine_set(
    ctx: &Context,
    md: &MachineDeployment,
    namespace: &str,
    sets: &mut Vec<MachineSet>,
) -> Result<MachineSet> {
    let mut collision_count = md.status.as_ref().map_or(0, |s| s.collision_count);

    for _ in 0..MAX_HASH_COLLISIONS {
        let hash = compute_template_hash(&md.spec.template, collision_count);
        let candidate_name = machine_set_name(&md.name_any(), &hash);

        if let Some(existing) = sets.iter().find(|ms| ms.name_any() == candidate_name) {
            if template_equal_ignoring_hash(&existing.spec.template, &md.spec.template) {
                return Ok(existing.clone());
            }
            collision_count += 1;
            continue;
        }

        let revision = next_revision(sets);
        let created =
            create_machine_set(ctx, md, namespace, &candidate_name, &hash, collision_count, revision).await?;
        sets.push(created.clone());
        return Ok(created);
    }

    bail!(
        "machinedeployment {}: could not find a free MachineSet name after {MAX_HASH_COLLISIONS} hash collisions",
        md.name_any()
    )
}

async fn create_machine_set(
    ctx: &Context,
    md: &MachineDeployment,
    namespace: &str,
    name: &str,
    hash: &str,
    collision_count: i32,
    revision: i64,
) -> Result<MachineSet> {
    let mut template = md.spec.template.clone();
    let mut template_labels = template.metadata.labels.clone().unwrap_or_default();
    template_labels.insert(MACHINE_TEMPLATE_HASH_LABEL.to_string(), hash.to_string());
    template.metadata.labels = Some(template_labels.clone());

    let mut selector_labels = md.spec.selector.match_labels.clone().unwrap_or_default();
    selector_labels.insert(MACHINE_TEMPLATE_HASH_LABEL.to_string(), hash.to_string());
    let selector = crate::crd::LabelSelector {
        match_labels: Some(selector_labels.clone()),
        match_expressions: md.spec.selector.match_expressions.clone(),
    };

    let mut labels = merge_labels(&selector_labels, &template_labels);
    labels.insert(MACHINE_TEMPLATE_HASH_LABEL.to_string(), hash.to_string());

    let mut annotations = std::collections::BTreeMap::new();
    annotations.insert(REVISION_ANNOTATION.to_string(), revision.to_string());
    annotations.insert(DESIRED_REPLICAS_ANNOTATION.to_string(), "0".to_string());
    annotations.insert(MAX_REPLICAS_ANNOTATION.to_string(), "0".to_string());

    let machine_set = MachineSet {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: Some(annotations),
            owner_references: Some(vec![owner_reference_for(md)]),
            ..Default::default()
        },
        spec: MachineSetSpec {
            replicas: 0,
            selector,
            template,
            min_ready_seconds: md.spec.min_ready_seconds,
            delete_policy: None,
        },
        status: None,
    };

    let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), namespace);
    let created = crate::reconcilers::retry::retry_api_call(
        || api.create(&PostParams::default(), &machine_set),
        "create MachineSet",
    )
    .await?;
    info!(machine_set = %created.name_any(), machine_deployment = %md.name_any(), collision_count, "created MachineSet for new revision");
    Ok(created)
}

/// Keep each active Set's `desired-replicas`/`max-replicas` annotations current; they
/// back the proportional-scale tie-break in [`rollout::scale`].
async fn sync_replica_annotations(
    ctx: &Context,
    md: &MachineDeployment,
    sets: &mut [MachineSet],
) -> Result<()> {
    let desired = md.spec.replicas.to_string();
    let max = (md.spec.replicas + rollout::max_surge(md)).to_string();

    for ms in sets.iter_mut() {
        let current_desired = ms.annotations().get(DESIRED_REPLICAS_ANNOTATION);
        let current_max = ms.annotations().get(MAX_REPLICAS_ANNOTATION);
        if current_desired == Some(&desired) && current_max == Some(&max) {
            continue;
        }

        let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), &ms.namespace().unwrap_or_default());
        let patch = json!({
            "metadata": {
                "annotations": {
                    DESIRED_REPLICAS_ANNOTATION: desired,
                    MAX_REPLICAS_ANNOTATION: max,
                }
            }
        });
        api.patch(&ms.name_any(), &PatchParams::default(), &Patch::Merge(&patch)).await?;

        let mut annotations = ms.metadata.annotations.clone().unwrap_or_default();
        annotations.insert(DESIRED_REPLICAS_ANNOTATION.to_string(), desired.clone());
        annotations.insert(MAX_REPLICAS_ANNOTATION.to_string(), max.clone());
        ms.metadata.annotations = Some(annotations);
    }

    Ok(())
}

/// Drive one rolling-update step: scale the new Set up, scale old Sets down.
async fn roll(
    ctx: &Context,
    md: &MachineDeployment,
    namespace: &str,
    sets: &mut Vec<MachineSet>,
    new_ms: &MachineSet,
) -> Result<()> {
    let all_refs: Vec<&MachineSet> = sets.iter().collect();

    if let Some(target) = rollout::reconcile_new_machine_set(md, &all_refs, new_ms) {
        scale_machine_set(ctx, namespace, sets, &new_ms.name_any(), target).await?;
    }

    let old_refs: Vec<&MachineSet> =
        sets.iter().filter(|ms| ms.name_any() != new_ms.name_any()).collect();
    let all_refs: Vec<&MachineSet> = sets.iter().collect();
    let new_ms_current =
        sets.iter().find(|ms| ms.name_any() == new_ms.name_any()).cloned().unwrap_or_else(|| new_ms.clone());

    let plan = rollout::reconcile_old_machine_sets(md, &all_refs, &old_refs, &new_ms_current);
    for (name, target) in plan {
        scale_machine_set(ctx, namespace, sets, &name, target).await?;
    }

    Ok(())
}

async fn apply_scale_plan(
    ctx: &Context,
    namespace: &str,
    sets: &mut Vec<MachineSet>,
    _new_ms: &MachineSet,
    plan: &[(String, i32)],
) -> Result<()> {
    for (name, target) in plan {
        scale_machine_set(ctx, namespace, sets, name, *target).await?;
    }
    Ok(())
}

async fn scale_machine_set(
    ctx: &Context,
    namespace: &str,
    sets: &mut [MachineSet],
    name: &str,
    replicas: i32,
) -> Result<()> {
    let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), namespace);
    let patch = json!({ "spec": { "replicas": replicas } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;

    if let Some(ms) = sets.iter_mut().find(|ms| ms.name_any() == name) {
        ms.spec.replicas = replicas;
    }

    debug!(machine_set = %name, replicas, "scaled MachineSet");
    Ok(())
}

/// Delete fully-scaled-down old Sets beyond `spec.revisionHistoryLimit`, newest first
/// (i.e. retain the most recently created ones).
async fn cleanup_old_machine_sets(
    ctx: &Context,
    md: &MachineDeployment,
    namespace: &str,
    sets: &[MachineSet],
    new_ms: &MachineSet,
) -> Result<()> {
    let limit = md
        .spec
        .revision_history_limit
        .unwrap_or(crate::constants::DEFAULT_REVISION_HISTORY_LIMIT)
        .max(0) as usize;

    let mut old: Vec<&MachineSet> = sets
        .iter()
        .filter(|ms| ms.name_any() != new_ms.name_any() && ms.spec.replicas == 0)
        .collect();
    old.sort_by_key(|ms| std::cmp::Reverse(ms.metadata.creation_timestamp.clone().map(|t| t.0)));

    for ms in old.into_iter().skip(limit) {
        let api: Api<MachineSet> = Api::namespaced(ctx.client.clone(), namespace);
        match api.delete(&ms.name_any(), &DeleteParams::default()).await {
            Ok(_) => info!(machine_set = %ms.name_any(), "deleted old MachineSet beyond revisionHistoryLimit"),
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn compute_status(md: &MachineDeployment, sets: &[MachineSet]) -> MachineDeploymentStatus {
    let active: Vec<&MachineSet> = sets.iter().filter(|ms| ms.spec.replicas > 0).collect();

    let replicas: i32 = active.iter().map(|ms| ms.spec.replicas).sum();
    let ready_replicas: i32 =
        active.iter().map(|ms| ms.status.as_ref().map_or(0, |s| s.ready_replicas)).sum();
    let available_replicas: i32 =
        active.iter().map(|ms| ms.status.as_ref().map_or(0, |s| s.available_replicas)).sum();
    let unavailable_replicas = (md.spec.replicas - available_replicas).max(0);

    let updated_replicas = sets.iter().max_by_key(|ms| revision_of(ms)).map_or(0, |ms| ms.spec.replicas);

    let collision_count = md.status.as_ref().map_or(0, |s| s.collision_count);

    let mut status = MachineDeploymentStatus {
        replicas,
        updated_replicas,
        ready_replicas,
        available_replicas,
        unavailable_replicas,
        collision_count,
        observed_generation: md.metadata.generation,
        conditions: md.status.as_ref().map(|s| s.conditions.clone()).unwrap_or_default(),
    };

    let available = create_condition(
        "Available",
        if available_replicas >= md.spec.replicas - rollout::max_unavailable(md) { "True" } else { "False" },
        "MinimumReplicasAvailable",
        "MachineDeployment has minimum availability",
    );
    let progressing = if rollout::deployment_complete(md, &status) {
        create_condition("Progressing", "True", "NewMachineSetAvailable", "MachineDeployment has successfully progressed")
    } else {
        create_condition("Progressing", "True", "ReplicaSetUpdated", "MachineDeployment is progressing")
    };

    upsert_condition(&mut status.conditions, available);
    upsert_condition(&mut status.conditions, progressing);

    status
}

fn upsert_condition(conditions: &mut Vec<Condition>, new_condition: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == new_condition.r#type) {
        if existing.status != new_condition.status {
            *existing = new_condition;
        } else {
            existing.message = new_condition.message;
            existing.reason = new_condition.reason;
        }
    } else {
        conditions.push(new_condition);
    }
}

async fn write_status(ctx: &Context, md: &MachineDeployment, status: MachineDeploymentStatus) -> Result<()> {
    let api: Api<MachineDeployment> = Api::namespaced(ctx.client.clone(), &md.namespace().unwrap_or_default());
    let name = md.name_any();
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

#[cfg(test)]
mod mod_tests;
