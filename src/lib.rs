// SPDX-License-Identifier: Apache-2.0

//! # machine-controller
//!
//! A declarative lifecycle controller for Kubernetes worker nodes backed by
//! cloud-provider virtual machines. `machine-controller` reconciles three
//! Deployment/ReplicaSet/Pod-shaped Custom Resources — [`crd::MachineDeployment`],
//! [`crd::MachineSet`], and [`crd::Machine`] — driving cloud instances into existence,
//! binding them to cluster `Node`s, and tearing them back down, the same way the
//! upstream `kube-controller-manager` drives Deployments.
//!
//! ## Overview
//!
//! - A `MachineDeployment` rolls out `spec.template` changes across owned
//!   `MachineSet`s using the same surge/unavailable budget math as a Kubernetes
//!   Deployment.
//! - A `MachineSet` maintains a fixed replica count of `Machine`s for one template
//!   revision, scaling up/down and prioritizing deletions the way a ReplicaSet does.
//! - A `Machine` drives one cloud instance through creation, userdata injection,
//!   cluster join, and deletion, mirroring a Pod's binding to a Node.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types for `Machine`, `MachineSet`, and
//!   `MachineDeployment`
//! - [`reconcilers`] - reconciliation logic for each resource type
//! - [`provider`] - the cloud-provider abstraction and its closed registry of backends
//! - [`userdata`] - boot-time userdata rendering for a Machine about to be created
//! - [`context`] - shared controller context and reflector stores
//! - [`csr_approver`] - approves kubelet-serving CSRs for Machine-bound Nodes
//! - [`hash`] - template hashing used for `MachineSet` revisioning
//! - [`selector`] - label-selector matching shared by every reconciler
//! - [`errors`] - the provider/CSR-approval error taxonomy
//! - [`metrics`] - Prometheus metrics exposed over the `/metrics` HTTP endpoint
//!
//! ## Example
//!
//! ```rust,no_run
//! use machine_controller::crd::{LabelSelector, MachineDeployment, MachineDeploymentSpec};
//!
//! # fn build(template: machine_controller::crd::MachineTemplateSpec) {
//! let spec = MachineDeploymentSpec {
//!     replicas: 3,
//!     selector: LabelSelector::default(),
//!     template,
//!     strategy: None,
//!     min_ready_seconds: None,
//!     revision_history_limit: None,
//!     paused: None,
//!     progress_deadline_seconds: None,
//! };
//! # let _ = spec;
//! # }
//! ```

pub mod constants;
pub mod context;
pub mod crd;
pub mod csr_approver;
pub mod errors;
pub mod hash;
pub mod labels;
pub mod metrics;
pub mod provider;
pub mod reconcilers;
pub mod selector;
pub mod userdata;
