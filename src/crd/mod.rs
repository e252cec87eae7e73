// SPDX-License-Identifier: Apache-2.0

//! Custom Resource Definitions for the `cluster.k8s.io/v1alpha1` API group.
//!
//! # Resource Types
//!
//! - [`Machine`] - one desired Kubernetes worker node and its backing VM
//! - [`MachineSet`] - a versioned collection of Machines sharing one template
//! - [`MachineDeployment`] - a template-versioned target owning MachineSets
//!
//! # Shared types
//!
//! - [`LabelSelector`] / [`LabelSelectorRequirement`] - label-query types reused by all
//!   three resources' `spec.selector`
//! - [`Condition`] - the standard Kubernetes status condition shape
//! - [`IntOrString`] - `maxSurge`/`maxUnavailable` (can be an absolute count or a
//!   percentage string)

mod common;
mod machine;
mod machine_deployment;
mod machine_set;

pub use common::{
    Condition, IntOrString, LabelSelector, LabelSelectorRequirement, ObjectReference,
};
pub use machine::{
    LabelMap, Machine, MachineAddress, MachineSpec, MachineStatus, MachineTaint,
    MachineVersionInfo, OperatingSystemSpec, ProviderSpec,
};
pub use machine_deployment::{
    MachineDeployment, MachineDeploymentSpec, MachineDeploymentStatus,
    MachineDeploymentStrategy, RollingUpdateMachineDeployment,
};
pub use machine_set::{
    MachineSet, MachineSetSpec, MachineSetStatus, MachineTemplateMetadata, MachineTemplateSpec,
};
