// SPDX-License-Identifier: Apache-2.0

//! Matches a cluster `Node` to the `Machine` whose cloud instance it runs on.
//!
//! Primary match is by normalized `providerID`; each cloud prefixes this field
//! differently, so [`normalize_provider_id`] strips the provider-specific decoration
//! before comparing. When no provider id is available (either side), matching falls back
//! to comparing observed addresses, with Hetzner requiring an additional name match since
//! HCloud node names are not guaranteed unique across projects.

use crate::crd::{Machine, MachineAddress};
use k8s_openapi::api::core::v1::Node;
use std::sync::Arc;

/// Normalize a `providerID` to a bare identifier, stripping cloud-specific prefixes so
/// that a Machine's recorded id and a Node's `spec.providerID` can be compared directly.
///
/// - AWS: `aws:///<zone>/<instance-id>` -> `<instance-id>`
/// - Azure: `azure://<resource-id>` is already exact, left unchanged
/// - Hetzner: `hcloud://<id>` -> `<id>`
/// - OpenStack: `openstack:///<uuid>` -> `<uuid>`
#[must_use]
pub fn normalize_provider_id(provider_id: &str) -> String {
    if let Some(rest) = provider_id.strip_prefix("aws:///") {
        return rest.rsplit('/').next().unwrap_or(rest).to_string();
    }
    if let Some(rest) = provider_id.strip_prefix("hcloud://") {
        return rest.to_string();
    }
    if let Some(rest) = provider_id.strip_prefix("openstack:///") {
        return rest.to_string();
    }
    provider_id.to_string()
}

/// Find the Node whose normalized `providerID` matches `provider_id`, falling back to an
/// address match (and, for Hetzner ids, requiring `node.name == instance_name` as well)
/// when no provider id is available on either side.
#[must_use]
pub fn find_node_for_instance(
    provider_id: Option<&str>,
    addresses: &[MachineAddress],
    instance_name: &str,
    nodes: &[Arc<Node>],
) -> Option<Arc<Node>> {
    if let Some(provider_id) = provider_id {
        let normalized = normalize_provider_id(provider_id);
        let is_hetzner = provider_id.starts_with("hcloud://");
        let matched = nodes.iter().find(|n| {
            let node_provider_id = n.spec.as_ref().and_then(|s| s.provider_id.as_deref());
            let Some(node_provider_id) = node_provider_id else { return false };
            if normalize_provider_id(node_provider_id) != normalized {
                return false;
            }
            !is_hetzner || n.metadata.name.as_deref() == Some(instance_name)
        });
        if let Some(node) = matched {
            return Some(Arc::clone(node));
        }
    }

    find_node_by_address(addresses, nodes)
}

/// Find the Node matching `machine`'s already-recorded `status.providerId`/`addresses`.
/// Used to re-verify an existing binding (e.g. by the CSR approver) without a fresh
/// `Provider::get` call.
#[must_use]
pub fn find_matching_node(nodes: &[Arc<Node>], machine: &Machine) -> Option<Arc<Node>> {
    let Some(status) = machine.status.as_ref() else { return None };
    let instance_name = status.node_ref.as_ref().and_then(|r| r.name.as_deref()).unwrap_or_default();
    find_node_for_instance(status.provider_id.as_deref(), &status.addresses, instance_name, nodes)
}

fn find_node_by_address(addresses: &[MachineAddress], nodes: &[Arc<Node>]) -> Option<Arc<Node>> {
    if addresses.is_empty() {
        return None;
    }
    nodes
        .iter()
        .find(|n| {
            let Some(node_status) = n.status.as_ref() else { return false };
            let Some(node_addresses) = node_status.addresses.as_ref() else { return false };
            addresses.iter().any(|a| {
                (a.r#type == "InternalIP" || a.r#type == "ExternalIP")
                    && node_addresses.iter().any(|na| na.address == a.address)
            })
        })
        .map(Arc::clone)
}

#[cfg(test)]
#[path = "node_match_tests.rs"]
mod node_match_tests;
