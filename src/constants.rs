// SPDX-License-Identifier: Apache-2.0

//! Global constants for the machine-controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all machine-controller CRDs
pub const API_GROUP: &str = "cluster.k8s.io";

/// API version for all machine-controller CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "cluster.k8s.io/v1alpha1";

/// Kind name for `Machine` resource
pub const KIND_MACHINE: &str = "Machine";

/// Kind name for `MachineSet` resource
pub const KIND_MACHINE_SET: &str = "MachineSet";

/// Kind name for `MachineDeployment` resource
pub const KIND_MACHINE_DEPLOYMENT: &str = "MachineDeployment";

// ============================================================================
// Defaulting Constants (MachineDeployment)
// ============================================================================

/// Default `maxSurge` when unset on a `MachineDeployment`'s rolling update strategy
pub const DEFAULT_MAX_SURGE: &str = "1";

/// Default `maxUnavailable` when unset on a `MachineDeployment`'s rolling update strategy
pub const DEFAULT_MAX_UNAVAILABLE: &str = "0";

/// Default `revisionHistoryLimit` when unset
pub const DEFAULT_REVISION_HISTORY_LIMIT: i32 = 1;

/// Default `progressDeadlineSeconds` when unset
pub const DEFAULT_PROGRESS_DEADLINE_SECS: i32 = 600;

// ============================================================================
// Delete prioritization (MachineSet)
// ============================================================================

/// Score assigned to a Machine that must be deleted first (deletionTimestamp,
/// delete-machine annotation, or terminal error)
pub const PRIORITY_MUST_DELETE: f64 = 100.0;

/// Score assigned under the Random policy to annotated/errored Machines
pub const PRIORITY_BETTER_DELETE: f64 = 50.0;

/// Baseline score for Random-policy candidates with no special markers
pub const PRIORITY_COULD_DELETE: f64 = 20.0;

/// Score assigned to a Machine that must never be deleted (zero creation timestamp)
pub const PRIORITY_MUST_NOT_DELETE: f64 = 0.0;

/// Time constant (seconds) used in the oldest-first exponential priority curve.
/// `100 * (1 - exp(-age_seconds / OLDEST_PRIORITY_TIME_CONSTANT_SECS))`
pub const OLDEST_PRIORITY_TIME_CONSTANT_SECS: f64 = 864_000.0;

// ============================================================================
// Timing / requeue constants
// ============================================================================

/// Requeue delay after a transient reconcile error
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 15;

/// Requeue delay while waiting for a Machine's cloud instance to finish provisioning
pub const PROVISIONING_REQUEUE_SECS: u64 = 10;

/// Requeue delay while waiting for pod eviction / instance cleanup to finish
pub const DELETION_REQUEUE_SECS: u64 = 5;

/// Steady-state requeue interval once a resource is fully reconciled
pub const REQUEUE_WHEN_READY_SECS: u64 = 300;

/// Default `-join-cluster-timeout`: how long a Machine may exist without a bound Node
/// before the Machine reconciler deletes it for the owning MachineSet to retry.
pub const DEFAULT_JOIN_CLUSTER_TIMEOUT_SECS: u64 = 600;

/// Default `-skip-evict-after`: how long past `deletionTimestamp` eviction is attempted
/// before it is skipped outright.
pub const DEFAULT_SKIP_EVICT_AFTER_SECS: u64 = 120;

// ============================================================================
// Kubernetes client tuning
// ============================================================================

/// Default Kubernetes API client queries-per-second
pub const KUBE_CLIENT_QPS: f32 = 20.0;

/// Default Kubernetes API client burst size
pub const KUBE_CLIENT_BURST: u32 = 40;

/// Default Tokio worker thread count
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default number of concurrent reconcile workers per controller
pub const DEFAULT_WORKER_COUNT: usize = 5;

// ============================================================================
// Leader election
// ============================================================================

/// Default leader-election lease duration in seconds
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader-election renew deadline in seconds
pub const DEFAULT_LEASE_RENEW_DEADLINE_SECS: u64 = 10;

/// Default leader-election retry period in seconds
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// HTTP servers
// ============================================================================

/// Default bind address for the Prometheus metrics server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Default port for the Prometheus metrics server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path the metrics server exposes Prometheus text format on
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Default bind address for the health-probe server
pub const HEALTH_PROBE_BIND_ADDRESS: &str = "0.0.0.0";

/// Default port for the health-probe server
pub const HEALTH_PROBE_PORT: u16 = 8085;

// ============================================================================
// Rolling-update recreate-kind placeholder
// ============================================================================

/// The only supported `MachineDeployment` strategy type today; any other value is a
/// configuration error. `Recreate` and other strategies are reserved for future use.
pub const STRATEGY_ROLLING_UPDATE: &str = "RollingUpdate";
