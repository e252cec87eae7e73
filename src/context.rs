// SPDX-License-Identifier: Apache-2.0

//! Shared context for all controllers with reflector stores.
//!
//! All controllers receive an `Arc<Context>` carrying the Kubernetes client, a
//! [`Stores`] bundle for in-memory cross-resource lookups, and a shared HTTP client for
//! provider REST calls. The stores avoid repeated List calls when, for example, the
//! `MachineDeployment` reconciler needs every `MachineSet` whose template labels match
//! its selector.

use crate::crd::{LabelSelector, Machine, MachineDeployment, MachineSet};
use crate::provider::registry::ProviderRegistry;
use crate::userdata::UserdataProvider;
use k8s_openapi::api::core::v1::Node;
use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};
use std::sync::Arc;
use std::time::Duration;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations.
    pub client: Client,

    /// Reflector stores for all watched resource kinds.
    pub stores: Stores,

    /// Shared HTTP client for cloud provider REST calls.
    pub http_client: reqwest::Client,

    /// Closed registry of cloud provider implementations, built once at startup.
    pub provider_registry: Arc<ProviderRegistry>,

    /// Renders boot-time userdata for a Machine about to be created.
    pub userdata_provider: Arc<dyn UserdataProvider>,

    /// `-join-cluster-timeout`: how long an unbound Machine may exist before the
    /// reconciler deletes it for its owning `MachineSet` to retry.
    pub join_cluster_timeout: Duration,

    /// `-skip-evict-after`: how long past `deletionTimestamp` pod eviction is still
    /// attempted before it is skipped outright.
    pub skip_evict_after: Duration,
}

/// Collection of reflector stores for cross-controller queries.
#[derive(Clone)]
pub struct Stores {
    /// All watched `Machine`s.
    pub machines: Store<Machine>,
    /// All watched `MachineSet`s.
    pub machine_sets: Store<MachineSet>,
    /// All watched `MachineDeployment`s.
    pub machine_deployments: Store<MachineDeployment>,
    /// All watched cluster `Node`s.
    pub nodes: Store<Node>,
}

impl Stores {
    /// Every `Machine` in `namespace` whose labels satisfy `selector`.
    #[must_use]
    pub fn machines_matching_selector(
        &self,
        selector: &LabelSelector,
        namespace: &str,
    ) -> Vec<Arc<Machine>> {
        self.machines
            .state()
            .into_iter()
            .filter(|m| {
                m.namespace().as_deref() == Some(namespace)
                    && crate::selector::matches_selector(selector, m.labels())
            })
            .collect()
    }

    /// Every `MachineSet` in `namespace` whose labels satisfy `selector`.
    #[must_use]
    pub fn machine_sets_matching_selector(
        &self,
        selector: &LabelSelector,
        namespace: &str,
    ) -> Vec<Arc<MachineSet>> {
        self.machine_sets
            .state()
            .into_iter()
            .filter(|ms| {
                ms.namespace().as_deref() == Some(namespace)
                    && crate::selector::matches_selector(selector, ms.labels())
            })
            .collect()
    }

    /// Every `Machine` owned by the `MachineSet` named `owner_name` in `namespace`
    /// (matched by the standard Kubernetes owner reference, not by label selector).
    #[must_use]
    pub fn machines_owned_by(&self, owner_name: &str, namespace: &str) -> Vec<Arc<Machine>> {
        self.machines
            .state()
            .into_iter()
            .filter(|m| {
                m.namespace().as_deref() == Some(namespace)
                    && m.owner_references().iter().any(|r| r.kind == "MachineSet" && r.name == owner_name)
            })
            .collect()
    }

    /// Every `MachineSet` owned by the `MachineDeployment` named `owner_name` in
    /// `namespace`.
    #[must_use]
    pub fn machine_sets_owned_by(&self, owner_name: &str, namespace: &str) -> Vec<Arc<MachineSet>> {
        self.machine_sets
            .state()
            .into_iter()
            .filter(|ms| {
                ms.namespace().as_deref() == Some(namespace)
                    && ms
                        .owner_references()
                        .iter()
                        .any(|r| r.kind == "MachineDeployment" && r.name == owner_name)
            })
            .collect()
    }

    /// Find the `Node` whose `providerID` (normalized) or address set matches `machine`.
    #[must_use]
    pub fn find_node_for_machine(&self, machine: &Machine) -> Option<Arc<Node>> {
        crate::reconcilers::machine::node_match::find_matching_node(&self.nodes.state(), machine)
    }

    /// Fetch a specific `Machine` from the store by name and namespace.
    #[must_use]
    pub fn get_machine(&self, name: &str, namespace: &str) -> Option<Arc<Machine>> {
        self.machines
            .state()
            .into_iter()
            .find(|m| m.name_any() == name && m.namespace().as_deref() == Some(namespace))
    }

    /// Fetch a specific `MachineSet` from the store by name and namespace.
    #[must_use]
    pub fn get_machine_set(&self, name: &str, namespace: &str) -> Option<Arc<MachineSet>> {
        self.machine_sets
            .state()
            .into_iter()
            .find(|ms| ms.name_any() == name && ms.namespace().as_deref() == Some(namespace))
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
