// SPDX-License-Identifier: Apache-2.0

//! Drives one `Machine` through its state machine: provider-spec mutation, UID
//! migration, cloud instance creation, Node binding, status reporting, and (given a
//! deletion timestamp) eviction, instance cleanup, Node removal, and finalizer release.

pub mod node_match;

use crate::constants::{
    DELETION_REQUEUE_SECS, PROVISIONING_REQUEUE_SECS, REQUEUE_WHEN_READY_SECS,
};
use crate::context::Context;
use crate::crd::{Machine, MachineStatus, OperatingSystemSpec};
use crate::errors::ProviderError;
use crate::labels::{MACHINE_NODE_DELETE_FINALIZER, MIRROR_POD_ANNOTATION, NODE_OWNER_LABEL_NAME, SAFE_TO_EVICT_ANNOTATION};
use crate::provider::{Instance, InstanceStatus, Provider};
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use anyhow::Result;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, DeleteParams, EvictParams, ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LEGACY_PROVIDER_RENAMES: &[(&str, &str)] = &[("packet", "equinixmetal")];

/// Reconcile one `Machine`, in order: provider-spec mutation, UID
/// migration, deletion dispatch, instance existence, Node binding, status writeback.
///
/// # Errors
///
/// Returns an error on any Kubernetes or provider API failure that the caller's
/// `error_policy` should back off and retry.
pub async fn reconcile_machine(machine: Arc<Machine>, ctx: Arc<Context>) -> Result<Action> {
    let namespace = machine.namespace().unwrap_or_default();
    let name = machine.name_any();

    if machine.metadata.deletion_timestamp.is_some() {
        return delete_machine(&machine, &ctx).await;
    }

    ensure_finalizer(&ctx.client, machine.as_ref(), MACHINE_NODE_DELETE_FINALIZER).await?;

    if let Some(patch) = legacy_provider_rename_patch(&machine) {
        apply_provider_spec_patch(&ctx, &namespace, &name, patch).await?;
        info!(machine = %name, "rewrote legacy providerSpec.cloudProvider name");
        return Ok(Action::requeue(Duration::from_secs(1)));
    }

    let provider_name = provider_name_of(&machine)?;
    let provider = ctx.provider_registry.get(&name, provider_name)?;

    migrate_uid_if_needed(&ctx, provider.as_ref(), &machine).await?;

    let instance = match provider.get(&machine).await {
        Ok(instance) => instance,
        Err(ProviderError::InstanceNotFound { .. }) => create_instance(&ctx, provider.as_ref(), &machine).await?,
        Err(e) if e.is_terminal() => {
            write_terminal_error(&ctx, &machine, &e).await?;
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };

    if instance.status == InstanceStatus::Creating {
        return Ok(Action::requeue(Duration::from_secs(PROVISIONING_REQUEUE_SECS)));
    }

    let mut status = machine.status.clone().unwrap_or_default();
    status.provider_id = Some(instance.provider_id.clone());
    status.addresses = instance.addresses.clone();
    status.error_reason = None;
    status.error_message = None;

    match node_match::find_node_for_instance(
        Some(&instance.provider_id),
        &instance.addresses,
        &instance.name,
        &ctx.stores.nodes.state(),
    ) {
        Some(node) => {
            bind_node(&ctx, &machine, &node, &mut status).await?;
            status.phase = Some("Running".to_string());
        }
        None => {
            status.phase = Some("Provisioning".to_string());
            if join_cluster_timed_out(&machine, ctx.join_cluster_timeout) && owner_is_machine_set(&machine) {
                delete_self_for_retry(&ctx, &namespace, &name).await?;
                return Ok(Action::await_change());
            }
        }
    }

    status.observed_generation = machine.metadata.generation;
    write_status(&ctx, &namespace, &name, status).await?;

    Ok(Action::requeue(Duration::from_secs(REQUEUE_WHEN_READY_SECS)))
}

fn provider_name_of(machine: &Machine) -> Result<&str> {
    machine
        .spec
        .provider_spec
        .value
        .as_ref()
        .and_then(|v| v.get("cloudProvider"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("machine {}: providerSpec.value.cloudProvider is not set", machine.name_any()))
}

fn legacy_provider_rename_patch(machine: &Machine) -> Option<serde_json::Value> {
    let current = machine.spec.provider_spec.value.as_ref()?.get("cloudProvider")?.as_str()?;
    let (_, renamed) = LEGACY_PROVIDER_RENAMES.iter().find(|(old, _)| *old == current)?;
    Some(json!({ "cloudProvider": renamed }))
}

async fn apply_provider_spec_patch(
    ctx: &Context,
    namespace: &str,
    name: &str,
    cloud_provider_patch: serde_json::Value,
) -> Result<()> {
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), namespace);
    let patch = json!({ "spec": { "providerSpec": { "value": cloud_provider_patch } } });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    Ok(())
}

async fn migrate_uid_if_needed(ctx: &Context, provider: &dyn Provider, machine: &Machine) -> Result<()> {
    let current_uid = machine.uid().unwrap_or_default();
    let recorded_uid = machine
        .status
        .as_ref()
        .and_then(|s| s.provider_status.as_ref())
        .and_then(|v| v.get("uid"))
        .and_then(serde_json::Value::as_str);

    if recorded_uid.is_some_and(|recorded| recorded != current_uid) {
        provider.migrate_uid(machine, &current_uid).await?;
        info!(machine = %machine.name_any(), "migrated provider instance tag to new Machine UID");

        let api: Api<Machine> = Api::namespaced(ctx.client.clone(), &machine.namespace().unwrap_or_default());
        let status_patch = json!({ "status": { "providerStatus": { "uid": current_uid } } });
        api.patch_status(&machine.name_any(), &PatchParams::default(), &Patch::Merge(&status_patch)).await?;
    }

    Ok(())
}

async fn create_instance(ctx: &Context, provider: &dyn Provider, machine: &Machine) -> Result<Instance> {
    let os = OperatingSystemSpec::default();
    let userdata = ctx.userdata_provider.render(machine, &os).await?;

    match provider.create(machine, &userdata).await {
        Ok(instance) => {
            info!(machine = %machine.name_any(), instance = %instance.id, "created cloud instance");
            Ok(instance)
        }
        Err(e) => {
            if e.is_terminal() {
                write_terminal_error(ctx, machine, &e).await?;
            }
            Err(e.into())
        }
    }
}

async fn write_terminal_error(ctx: &Context, machine: &Machine, error: &ProviderError) -> Result<()> {
    let (reason, message) = error.status_reason();
    let mut status = machine.status.clone().unwrap_or_default();
    status.error_reason = Some(reason);
    status.error_message = Some(message);
    status.observed_generation = machine.metadata.generation;
    write_status(ctx, &machine.namespace().unwrap_or_default(), &machine.name_any(), status).await
}

async fn bind_node(ctx: &Context, machine: &Machine, node: &Node, status: &mut MachineStatus) -> Result<()> {
    let node_name = node.name_any();
    let machine_uid = machine.uid().unwrap_or_default();

    let already_owned = node.owner_references().iter().any(|r| r.kind == "Machine" && r.uid == machine_uid);
    if !already_owned {
        let api: Api<Node> = Api::all(ctx.client.clone());
        let owner_ref = serde_json::to_value(OwnerReference {
            api_version: Machine::api_version(&()).to_string(),
            kind: Machine::kind(&()).to_string(),
            name: machine.name_any(),
            uid: machine_uid.clone(),
            controller: Some(true),
            block_owner_deletion: Some(false),
        })?;
        let patch = json!({
            "metadata": {
                "ownerReferences": [owner_ref],
                "labels": { NODE_OWNER_LABEL_NAME: machine_uid },
            }
        });
        api.patch(&node_name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        info!(machine = %machine.name_any(), node = %node_name, "bound Node to Machine");
    }

    status.node_ref = Some(crate::crd::ObjectReference {
        kind: Some("Node".to_string()),
        name: Some(node_name),
        namespace: None,
        uid: node.metadata.uid.clone(),
    });
    status.versions = Some(machine.spec.versions.clone());
    Ok(())
}

fn join_cluster_timed_out(machine: &Machine, timeout: Duration) -> bool {
    if timeout.is_zero() {
        return false;
    }
    let Some(created) = machine.metadata.creation_timestamp.as_ref() else { return false };
    let age = chrono::Utc::now().signed_duration_since(created.0);
    age.to_std().is_ok_and(|age| age > timeout)
}

fn owner_is_machine_set(machine: &Machine) -> bool {
    machine.owner_references().iter().any(|r| r.kind == "MachineSet")
}

async fn delete_self_for_retry(ctx: &Context, namespace: &str, name: &str) -> Result<()> {
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), namespace);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(machine = %name, "deleted Machine that never joined the cluster within the timeout");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn write_status(ctx: &Context, namespace: &str, name: &str, status: MachineStatus) -> Result<()> {
    let api: Api<Machine> = Api::namespaced(ctx.client.clone(), namespace);
    let patch = json!({ "status": status });

    match api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 409 => {
            api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Handle a `Machine` with a deletion timestamp: skip-or-run eviction, requeuing until the
/// node is drained or the skip-evict timeout fires, then drive `Provider::cleanup` to
/// completion, delete the bound Node, then release the finalizer. The finalizer is never
/// removed before the instance is confirmed gone.
///
/// # Errors
///
/// Returns an error on any Kubernetes or provider API failure.
pub async fn delete_machine(machine: &Machine, ctx: &Context) -> Result<Action> {
    let namespace = machine.namespace().unwrap_or_default();
    let name = machine.name_any();

    if !machine.finalizers().iter().any(|f| f == MACHINE_NODE_DELETE_FINALIZER) {
        return Ok(Action::await_change());
    }

    if should_evict(machine, ctx) {
        let remaining = evict_pods(ctx, machine).await?;
        if remaining > 0 {
            debug!(machine = %name, remaining, "node not yet drained, waiting before cleanup");
            return Ok(Action::requeue(Duration::from_secs(DELETION_REQUEUE_SECS)));
        }
    }

    let provider_name = provider_name_of(machine)?;
    let provider = ctx.provider_registry.get(&name, provider_name)?;

    let cleanup_done = provider.cleanup(machine).await?;
    if !cleanup_done {
        debug!(machine = %name, "provider cleanup still in progress");
        return Ok(Action::requeue(Duration::from_secs(DELETION_REQUEUE_SECS)));
    }

    delete_bound_node(ctx, machine, &namespace).await?;
    remove_finalizer(&ctx.client, machine, MACHINE_NODE_DELETE_FINALIZER).await?;
    info!(machine = %name, "Machine cleanup complete, finalizer removed");

    Ok(Action::await_change())
}

fn should_evict(machine: &Machine, ctx: &Context) -> bool {
    let Some(deletion_timestamp) = machine.metadata.deletion_timestamp.as_ref() else { return false };
    if !ctx.skip_evict_after.is_zero() {
        let elapsed = chrono::Utc::now().signed_duration_since(deletion_timestamp.0);
        if elapsed.to_std().is_ok_and(|elapsed| elapsed > ctx.skip_evict_after) {
            return false;
        }
    }

    let Some(status) = machine.status.as_ref() else { return false };
    let node_name = status.node_ref.as_ref().and_then(|r| r.name.as_deref());
    node_name.is_some_and(|name| ctx.stores.nodes.state().iter().any(|n| n.name_any() == name))
        && another_target_available(machine, ctx)
}

fn another_target_available(machine: &Machine, ctx: &Context) -> bool {
    let this_node = machine.status.as_ref().and_then(|s| s.node_ref.as_ref()).and_then(|r| r.name.as_deref());

    let other_ready_node = ctx.stores.nodes.state().into_iter().any(|n| {
        n.name_any().as_str() != this_node.unwrap_or_default()
            && n.status
                .as_ref()
                .and_then(|s| s.conditions.as_ref())
                .is_some_and(|cs| cs.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
    });

    let provisioning_machine = ctx.stores.machines.state().into_iter().any(|m| {
        m.name_any() != machine.name_any()
            && m.status.as_ref().is_none_or(|s| s.node_ref.is_none())
            && m.metadata.deletion_timestamp.is_none()
    });

    other_ready_node || provisioning_machine
}

/// Issue evictions for every evictable pod still bound to the Machine's Node, and report
/// how many of them are still present afterward. The caller must keep requeuing (rather
/// than proceeding to `Provider::cleanup`) while this is nonzero, so the node is actually
/// drained before the instance is torn down.
async fn evict_pods(ctx: &Context, machine: &Machine) -> Result<usize> {
    let Some(node_name) =
        machine.status.as_ref().and_then(|s| s.node_ref.as_ref()).and_then(|r| r.name.clone())
    else {
        return Ok(0);
    };

    let pod_api: Api<Pod> = Api::all(ctx.client.clone());
    let lp = ListParams::default().fields(&format!("spec.nodeName={node_name}"));
    let pods = pod_api.list(&lp).await?;
    let evictable: Vec<&Pod> = pods.items.iter().filter(|p| is_evictable(p)).collect();

    for pod in &evictable {
        let pod_namespace = pod.namespace().unwrap_or_default();
        let pod_name = pod.name_any();
        let ns_pod_api: Api<Pod> = Api::namespaced(ctx.client.clone(), &pod_namespace);

        match crate::reconcilers::retry::retry_api_call(
            || ns_pod_api.evict(&pod_name, &EvictParams::default()),
            "evict pod",
        )
        .await
        {
            Ok(_) => info!(pod = %pod_name, namespace = %pod_namespace, "evicted pod"),
            Err(e) => warn!(pod = %pod_name, namespace = %pod_namespace, error = %e, "failed to evict pod"),
        }
    }

    Ok(evictable.len())
}

fn is_evictable(pod: &Pod) -> bool {
    if pod.annotations().contains_key(MIRROR_POD_ANNOTATION) {
        return false;
    }
    if pod.annotations().get(SAFE_TO_EVICT_ANNOTATION).map(String::as_str) == Some("false") {
        return false;
    }
    !pod.owner_references().iter().any(|r| r.kind == "DaemonSet")
}

async fn delete_bound_node(ctx: &Context, machine: &Machine, namespace: &str) -> Result<()> {
    let node_name = machine
        .status
        .as_ref()
        .and_then(|s| s.node_ref.as_ref())
        .and_then(|r| r.name.clone())
        .or_else(|| find_node_by_owner_label(ctx, machine));

    let Some(node_name) = node_name else { return Ok(()) };

    let api: Api<Node> = Api::all(ctx.client.clone());
    match api.delete(&node_name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(machine = %machine.name_any(), namespace = %namespace, node = %node_name, "deleted bound Node");
            Ok(())
        }
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn find_node_by_owner_label(ctx: &Context, machine: &Machine) -> Option<String> {
    let uid = machine.uid().unwrap_or_default();
    ctx.stores
        .nodes
        .state()
        .into_iter()
        .find(|n| n.labels().get(NODE_OWNER_LABEL_NAME).map(String::as_str) == Some(uid.as_str()))
        .map(|n| n.name_any())
}
