// SPDX-License-Identifier: Apache-2.0

//! The cloud-provider abstraction: uniform `AddDefaults`/`Validate`/`Get`/`Create`/
//! `Cleanup`/`MigrateUID`/`MachineMetricsLabels` semantics over one cloud backend.
//!
//! Every concrete provider (`provider::profiles`, `provider::fake`) implements [`Provider`]
//! and is looked up through [`registry::ProviderRegistry`] by [`registry::CloudProviderName`].
//! The [`rest`] module supplies a single generic implementation driven by a small
//! [`rest::RestProfile`] describing one cloud's REST endpoint shape, treating the concrete
//! vendor SDK calls as an opaque, out-of-scope external collaborator.

pub mod config;
pub mod fake;
pub mod profiles;
pub mod registry;
pub mod rest;
pub mod rest_client;

use crate::crd::{Machine, MachineAddress};
use crate::errors::ProviderError;
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;

/// Observed lifecycle state of a cloud instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceStatus {
    /// The instance is being provisioned and is not yet reachable.
    Creating,
    /// The instance is up and should be joinable into the cluster.
    Running,
    /// The instance is in the process of being torn down.
    Deleting,
    /// The provider could not classify the instance's state.
    Unknown,
}

/// A point-in-time snapshot of a cloud instance, as returned by [`Provider::get`] and
/// [`Provider::create`].
#[derive(Clone, Debug)]
pub struct Instance {
    /// Provider-local instance name.
    pub name: String,
    /// Provider-local instance id.
    pub id: String,
    /// Normalized `providerID` to be written to `Machine.status.providerId` and compared
    /// against `Node.spec.providerID`.
    pub provider_id: String,
    /// Observed network addresses.
    pub addresses: Vec<MachineAddress>,
    /// Observed lifecycle state.
    pub status: InstanceStatus,
}

/// The uniform capability set every cloud backend implements.
///
/// Object-safe via `async-trait`, so the [`registry::ProviderRegistry`] can hold
/// `Box<dyn Provider>` regardless of which cloud backs a given `Machine`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name, used for metrics labels and log context.
    fn name(&self) -> &'static str;

    /// Fill in provider-specific defaults on `raw_config` (disk type/size, image family,
    /// …). Pure; must not perform any I/O.
    fn add_defaults(&self, raw_config: &mut Value);

    /// Validate `raw_config` against the cloud API (auth, region, size, image). Must not
    /// mutate cloud state. Returns [`ProviderError::InvalidConfig`] (terminal) on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] if the configuration is unusable, or
    /// [`ProviderError::Transient`]/[`ProviderError::ConfigResolution`] if the read-only
    /// validation call itself could not complete.
    async fn validate(&self, raw_config: &Value) -> Result<(), ProviderError>;

    /// Return the cloud instance backing `machine`, matched by UID tag/label.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InstanceNotFound`] if no instance is tagged with
    /// `machine`'s UID, or a transient/terminal error if the lookup itself failed.
    async fn get(&self, machine: &Machine) -> Result<Instance, ProviderError>;

    /// Idempotently create the cloud instance for `machine`, baking `userdata` into its
    /// boot metadata. If an instance already exists for this UID, returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Terminal`] for unrecoverable cloud rejections (quota,
    /// malformed image, bad credentials) or [`ProviderError::Transient`] for retryable
    /// failures.
    async fn create(&self, machine: &Machine, userdata: &[u8]) -> Result<Instance, ProviderError>;

    /// Idempotently release all instance-side resources for `machine`. Returns `Ok(true)`
    /// only once every resource is confirmed gone; `Ok(false)` means cleanup is still in
    /// progress and the caller should requeue.
    ///
    /// # Errors
    ///
    /// Returns a provider error if the cleanup call itself failed (not if cleanup is
    /// merely incomplete — that is `Ok(false)`).
    async fn cleanup(&self, machine: &Machine) -> Result<bool, ProviderError>;

    /// Retag the existing instance backing `machine` with `new_uid`, used when a
    /// `Machine`'s UID changes without the cloud instance itself changing ("UID
    /// migration").
    ///
    /// # Errors
    ///
    /// Returns a provider error if the retag call failed.
    async fn migrate_uid(&self, machine: &Machine, new_uid: &str) -> Result<(), ProviderError>;

    /// Cheap label map describing `machine`'s provider for Prometheus metrics. Must not
    /// perform I/O.
    fn machine_metrics_labels(&self, machine: &Machine) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert("provider".to_string(), self.name().to_string());
        labels.insert("machine".to_string(), machine.name_any());
        labels
    }
}
