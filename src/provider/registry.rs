// SPDX-License-Identifier: Apache-2.0

//! Closed registry of supported cloud providers.
//!
//! A `Machine`'s `spec.providerSpec.value` carries a `provider` discriminator string; the
//! reconciler resolves it through [`CloudProviderName`] and looks up the concrete
//! [`Provider`] implementation via [`ProviderRegistry`]. Unknown names are a terminal
//! `InvalidConfig` error, never a panic.

use super::config::ConfigVarResolver;
use super::fake::FakeProvider;
use super::profiles::{
    AlibabaProfile, AnexiaProfile, AwsProfile, AzureProfile, DigitalOceanProfile, EquinixMetalProfile, GceProfile,
    HetznerProfile, KubeVirtProfile, LinodeProfile, NutanixProfile, OpenStackProfile, ScalewayProfile, VSphereProfile,
    VmwareCloudDirectorProfile, VultrProfile,
};
use super::rest::RestProvider;
use super::Provider;
use crate::errors::ProviderError;
use reqwest::Client as HttpClient;
use std::collections::HashMap;
use std::sync::Arc;

/// The cloud providers this build knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CloudProviderName {
    Aws,
    Azure,
    Gce,
    DigitalOcean,
    Hetzner,
    Linode,
    OpenStack,
    Nutanix,
    VSphere,
    VmwareCloudDirector,
    KubeVirt,
    Anexia,
    Vultr,
    Scaleway,
    Alibaba,
    EquinixMetal,
    Fake,
}

impl CloudProviderName {
    /// The `provider` discriminator string as it appears in `providerSpec.value.provider`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CloudProviderName::Aws => "aws",
            CloudProviderName::Azure => "azure",
            CloudProviderName::Gce => "gce",
            CloudProviderName::DigitalOcean => "digitalocean",
            CloudProviderName::Hetzner => "hetzner",
            CloudProviderName::Linode => "linode",
            CloudProviderName::OpenStack => "openstack",
            CloudProviderName::Nutanix => "nutanix",
            CloudProviderName::VSphere => "vsphere",
            CloudProviderName::VmwareCloudDirector => "vmware-cloud-director",
            CloudProviderName::KubeVirt => "kubevirt",
            CloudProviderName::Anexia => "anexia",
            CloudProviderName::Vultr => "vultr",
            CloudProviderName::Scaleway => "scaleway",
            CloudProviderName::Alibaba => "alibaba",
            CloudProviderName::EquinixMetal => "equinixmetal",
            CloudProviderName::Fake => "fake",
        }
    }

    /// Parse a `providerSpec.value.provider` discriminator string.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == name)
    }

    /// All known provider names, for the `crdgen` enum schema and registry population.
    pub const ALL: [CloudProviderName; 17] = [
        CloudProviderName::Aws,
        CloudProviderName::Azure,
        CloudProviderName::Gce,
        CloudProviderName::DigitalOcean,
        CloudProviderName::Hetzner,
        CloudProviderName::Linode,
        CloudProviderName::OpenStack,
        CloudProviderName::Nutanix,
        CloudProviderName::VSphere,
        CloudProviderName::VmwareCloudDirector,
        CloudProviderName::KubeVirt,
        CloudProviderName::Anexia,
        CloudProviderName::Vultr,
        CloudProviderName::Scaleway,
        CloudProviderName::Alibaba,
        CloudProviderName::EquinixMetal,
        CloudProviderName::Fake,
    ];
}

/// Maps [`CloudProviderName`] to a constructed `Arc<dyn Provider>`.
///
/// Built once at startup from a shared `reqwest::Client`; cheap to clone (an `Arc` map)
/// and safe to share across reconciler tasks.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<CloudProviderName, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Build the registry with every real provider profile plus the in-memory fake used
    /// by tests and the `--fake-provider` escape hatch.
    ///
    /// `config_resolver` is shared by every REST-backed provider to resolve
    /// `secretKeyRef`/`configMapKeyRef` credentials against the control-plane API.
    #[must_use]
    pub fn new(http: HttpClient, config_resolver: ConfigVarResolver) -> Self {
        let mut providers: HashMap<CloudProviderName, Arc<dyn Provider>> = HashMap::new();
        macro_rules! register {
            ($name:expr, $profile:expr) => {
                providers.insert(
                    $name,
                    Arc::new(RestProvider::new(http.clone(), config_resolver.clone(), $profile)),
                );
            };
        }
        register!(CloudProviderName::Aws, AwsProfile);
        register!(CloudProviderName::Azure, AzureProfile);
        register!(CloudProviderName::Gce, GceProfile);
        register!(CloudProviderName::DigitalOcean, DigitalOceanProfile);
        register!(CloudProviderName::Hetzner, HetznerProfile);
        register!(CloudProviderName::Linode, LinodeProfile);
        register!(CloudProviderName::OpenStack, OpenStackProfile);
        register!(CloudProviderName::Nutanix, NutanixProfile);
        register!(CloudProviderName::VSphere, VSphereProfile);
        register!(CloudProviderName::VmwareCloudDirector, VmwareCloudDirectorProfile);
        register!(CloudProviderName::KubeVirt, KubeVirtProfile);
        register!(CloudProviderName::Anexia, AnexiaProfile);
        register!(CloudProviderName::Vultr, VultrProfile);
        register!(CloudProviderName::Scaleway, ScalewayProfile);
        register!(CloudProviderName::Alibaba, AlibabaProfile);
        register!(CloudProviderName::EquinixMetal, EquinixMetalProfile);
        providers.insert(CloudProviderName::Fake, Arc::new(FakeProvider::default()));
        Self { providers }
    }

    /// Look up the provider for a `providerSpec.value.provider` discriminator string.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidConfig`] if `provider_name` is empty, unrecognized,
    /// or not registered (should not happen for a name [`CloudProviderName::parse`] accepts).
    pub fn get(&self, machine: &str, provider_name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        let parsed = CloudProviderName::parse(provider_name).ok_or_else(|| ProviderError::InvalidConfig {
            machine: machine.to_string(),
            reason: format!("unknown provider {provider_name:?}"),
        })?;
        self.providers.get(&parsed).cloned().ok_or_else(|| ProviderError::InvalidConfig {
            machine: machine.to_string(),
            reason: format!("provider {provider_name:?} has no registered implementation"),
        })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod registry_tests;
