// SPDX-License-Identifier: Apache-2.0

//! Userdata rendering: the opaque boot-metadata collaborator.
//!
//! Rendering cloud-init/Ignition/kubeadm-join scripts from a Machine's desired
//! `versions.kubelet` and `configSource` is treated as an external collaborator outside
//! this crate's scope — the controller only needs a byte blob to hand to
//! [`crate::provider::Provider::create`]. [`OpaqueUserdataProvider`] is the stub
//! implementation used until a real renderer is wired in.

use crate::crd::{Machine, OperatingSystemSpec};
use anyhow::Result;
use async_trait::async_trait;

/// Renders the boot-time userdata blob for a Machine, keyed off its desired kubelet
/// version and operating-system profile.
#[async_trait]
pub trait UserdataProvider: Send + Sync {
    /// Render the userdata bytes to hand to `Provider::create`.
    ///
    /// # Errors
    ///
    /// Returns an error if the userdata could not be rendered (missing template,
    /// unsupported OS, …).
    async fn render(&self, machine: &Machine, os: &OperatingSystemSpec) -> Result<Vec<u8>>;
}

/// Stub [`UserdataProvider`] that emits a minimal cloud-config naming the desired kubelet
/// version. Real deployments are expected to supply their own renderer (kubeadm join
/// tokens, Ignition configs, …); this keeps the controller runnable standalone.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpaqueUserdataProvider;

#[async_trait]
impl UserdataProvider for OpaqueUserdataProvider {
    async fn render(&self, machine: &Machine, os: &OperatingSystemSpec) -> Result<Vec<u8>> {
        use kube::ResourceExt;
        let kubelet = &machine.spec.versions.kubelet;
        let os_name = if os.name.is_empty() { "ubuntu" } else { os.name.as_str() };
        let rendered = format!(
            "#cloud-config\n# machine: {}\n# kubeletVersion: {kubelet}\n# operatingSystem: {os_name}\n",
            machine.name_any(),
        );
        Ok(rendered.into_bytes())
    }
}

#[cfg(test)]
#[path = "userdata_tests.rs"]
mod userdata_tests;
