// SPDX-License-Identifier: Apache-2.0

//! Common label and annotation constants used across all reconcilers.
//!
//! This module defines standard Kubernetes labels and machine-controller-specific
//! labels/annotations to ensure consistency across all resources created by the
//! controller.

// ============================================================================
// machine-controller Labels
// ============================================================================

/// Label carrying the template hash, set on `MachineSet`s, their selector and
/// `template.labels`, and every child `Machine`.
pub const MACHINE_TEMPLATE_HASH_LABEL: &str = "machine-template-hash";

/// Label set on an adopted Node, value is the owning Machine's UID.
pub const NODE_OWNER_LABEL_NAME: &str = "node-owner-id";

// ============================================================================
// Annotations
// ============================================================================

/// Monotonic revision counter carried on a `MachineDeployment` and its owned
/// `MachineSet`s.
pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Desired-replica count recorded on a `MachineSet`, used as a proportional-scaling
/// tie-break in `MachineDeployment::scale`.
pub const DESIRED_REPLICAS_ANNOTATION: &str = "deployment.kubernetes.io/desired-replicas";

/// Max-replica count (`spec.replicas + maxSurge`) recorded on a `MachineSet`, used as a
/// secondary proportional-scaling tie-break.
pub const MAX_REPLICAS_ANNOTATION: &str = "deployment.kubernetes.io/max-replicas";

/// Annotation on a `Machine` that forces it to the highest delete priority regardless
/// of delete policy.
pub const DELETE_MACHINE_ANNOTATION: &str = "cluster.k8s.io/delete-machine";

/// Annotation on a `MachineDeployment` consumed by the external userdata source to pick
/// an operating-system profile.
pub const OPERATING_SYSTEM_PROFILE_ANNOTATION: &str = "k8c.io/operating-system-profile";

/// Annotation honored during eviction: a Pod carrying this with value `"false"` is never
/// evicted by the Machine reconciler's deletion path.
pub const SAFE_TO_EVICT_ANNOTATION: &str = "cluster-autoscaler.kubernetes.io/safe-to-evict";

/// Annotation marking a mirror Pod (static pod managed by kubelet directly); mirror pods
/// are never evicted.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

// ============================================================================
// Finalizers
// ============================================================================

/// Finalizer ensuring the Machine reconciler fully cleans up the cloud instance and
/// bound Node before the object is garbage collected.
pub const MACHINE_NODE_DELETE_FINALIZER: &str = "machine-node-delete-finalizer";

/// Finalizer carried on a `MachineDeployment`/`MachineSet` when cascading deletion of
/// dependents is required before the owner itself disappears.
pub const FINALIZER_DELETE_DEPENDENTS: &str = "foregroundDeletion";

// ============================================================================
// Delete policy values
// ============================================================================

/// `MachineSet.spec.deletePolicy` value selecting random-with-priority deletion.
pub const DELETE_POLICY_RANDOM: &str = "Random";

/// `MachineSet.spec.deletePolicy` value preferring to delete the newest Machines first.
pub const DELETE_POLICY_NEWEST: &str = "Newest";

/// `MachineSet.spec.deletePolicy` value preferring to delete the oldest Machines first.
pub const DELETE_POLICY_OLDEST: &str = "Oldest";
