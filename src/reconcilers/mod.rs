// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconciliation controllers for the machine lifecycle resources.
//!
//! This module contains the reconciliation logic for `Machine`, `MachineSet`, and
//! `MachineDeployment`. Each reconciler watches its resource type and drives it toward
//! the state declared in its spec.
//!
//! # Reconciliation Architecture
//!
//! 1. **Watch** - Monitor resource changes via the Kubernetes API (and a `Store` of
//!    related resources, to avoid repeated List calls)
//! 2. **Reconcile** - Compare desired state (CRD spec) with observed state
//! 3. **Act** - Create/update/delete child resources (MachineSets, Machines, cloud
//!    instances, Nodes) to close the gap
//! 4. **Status** - Report reconciliation results back to Kubernetes via the status
//!    subresource
//!
//! # Available Reconcilers
//!
//! - [`machine_deployment`] - rolls out template changes across owned `MachineSet`s
//! - [`machine_set`] - maintains a fixed replica count of `Machine`s for one revision
//! - [`machine`] - drives one `Machine` through instance creation, Node binding, and
//!   deletion
//!
//! # Shared helpers
//!
//! - [`finalizers`] - generic finalizer add/remove/handle-deletion helpers
//! - [`retry`] - exponential backoff for transient Kubernetes/provider API errors
//! - [`status`] - status condition construction and change detection

pub mod finalizers;
pub mod machine;
pub mod machine_deployment;
pub mod machine_set;
pub mod retry;
pub mod status;


pub use machine::{delete_machine, reconcile_machine};
pub use machine_deployment::reconcile_machine_deployment;
pub use machine_set::{delete_machine_set, reconcile_machine_set};

/// Check if a resource's spec has changed by comparing generation with `observed_generation`.
///
/// This is the standard Kubernetes pattern for determining if reconciliation is needed.
/// The `metadata.generation` field is incremented by Kubernetes only when the spec changes,
/// while `status.observed_generation` is set by the controller after processing a spec.
///
/// # Arguments
///
/// * `current_generation` - The resource's current `metadata.generation`
/// * `observed_generation` - The controller's last `status.observed_generation`
///
/// # Returns
///
/// * `true` - Reconciliation is needed (spec changed or first reconciliation)
/// * `false` - No reconciliation needed (spec unchanged, status-only update)
///
/// # Example
///
/// ```rust,ignore
/// use machine_controller::reconcilers::should_reconcile;
///
/// fn check_if_reconcile_needed(resource: &MyResource) -> bool {
///     let current = resource.metadata.generation;
///     let observed = resource.status.as_ref()
///         .and_then(|s| s.observed_generation);
///
///     should_reconcile(current, observed)
/// }
/// ```
///
/// # Kubernetes Generation Semantics
///
/// - **`metadata.generation`**: Incremented by Kubernetes API server when spec changes
/// - **`status.observed_generation`**: Set by controller to match `metadata.generation` after reconciliation
/// - When they match: spec hasn't changed since last reconciliation → skip work
/// - When they differ: spec has changed → reconcile
/// - When `observed_generation` is None: first reconciliation → reconcile
#[must_use]
pub fn should_reconcile(current_generation: Option<i64>, observed_generation: Option<i64>) -> bool {
    match (current_generation, observed_generation) {
        (Some(current), Some(observed)) => current != observed,
        (Some(_), None) => true, // First reconciliation
        _ => false,              // No generation tracking available
    }
}

/// Check if a status value has actually changed compared to the current status.
///
/// This helper prevents unnecessary status updates that would trigger reconciliation loops.
/// It compares a new status value with the existing status and returns `true` only if
/// they differ, indicating an update is needed.
///
/// # Arguments
///
/// * `current_value` - The current status value (from existing resource)
/// * `new_value` - The new status value to potentially set
///
/// # Returns
///
/// * `true` - Status has changed and needs updating
/// * `false` - Status is unchanged, skip the update
///
/// # Example
///
/// ```rust,ignore
/// use machine_controller::reconcilers::status_changed;
///
/// let current_ready = instance.status.as_ref()
///     .and_then(|s| s.ready_replicas);
/// let new_ready = Some(3);
///
/// if status_changed(&current_ready, &new_ready) {
///     // Status has changed, safe to update
///     update_status(client, instance, new_ready).await?;
/// }
/// ```
///
/// # Why This Matters
///
/// In kube-rs, status updates trigger "object updated" events which cause new reconciliations.
/// Without this check, updating status on every reconciliation creates a tight loop:
///
/// 1. Reconcile → Update status
/// 2. Status update → "object updated" event
/// 3. Event → New reconciliation
/// 4. Repeat from step 1 (infinite loop)
///
/// By only updating when status actually changes, we break this cycle.
#[must_use]
pub fn status_changed<T: PartialEq>(current_value: &Option<T>, new_value: &Option<T>) -> bool {
    current_value != new_value
}
