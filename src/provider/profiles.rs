// SPDX-License-Identifier: Apache-2.0

//! The sixteen real-cloud [`RestProfile`] implementations, one per supported cloud besides
//! the in-memory [`super::fake::FakeProvider`].
//!
//! Each profile is a small, stateless description of one cloud's REST shape: where the
//! credential lives, what the default region/zone/size is, and how to read a create-call
//! response into a uniform [`Instance`]. The actual wire format of each cloud's API is
//! treated as an opaque external collaborator — these profiles describe only the
//! conventions the generic [`RestProvider`](super::rest::RestProvider) cycle needs, not the
//! full SDK surface of any one vendor.

use super::config::ConfigVarString;
use super::registry::CloudProviderName;
use super::rest::RestProfile;
use super::Instance;
use crate::crd::{Machine, MachineAddress};
use serde_json::Value;

fn string_field<'a>(raw_config: &'a Value, field: &str) -> Option<&'a str> {
    raw_config.get(field).and_then(Value::as_str)
}

fn credential_from(raw_config: &Value, field: &str) -> Option<ConfigVarString> {
    raw_config.get(field).and_then(|v| serde_json::from_value(v.clone()).ok())
}

macro_rules! rest_profile {
    ($ident:ident, $cloud:expr, $default_url:expr, $credential_field:expr, $size_field:expr, $default_size:expr, $path:expr) => {
        pub struct $ident;

        impl RestProfile for $ident {
            fn cloud_name(&self) -> CloudProviderName {
                $cloud
            }

            fn default_base_url(&self) -> &'static str {
                $default_url
            }

            fn auth_config_var(&self, raw_config: &Value) -> Option<ConfigVarString> {
                credential_from(raw_config, $credential_field)
            }

            fn apply_defaults(&self, raw_config: &mut Value) {
                if let Value::Object(map) = raw_config {
                    map.entry($size_field).or_insert_with(|| Value::String($default_size.to_string()));
                }
            }

            fn instances_path(&self) -> &'static str {
                $path
            }

            fn build_create_body(&self, machine: &Machine, raw_config: &Value, userdata: &[u8]) -> Value {
                default_create_body(machine, raw_config, userdata, $size_field)
            }

            fn matches_uid(&self, item: &Value, uid: &str) -> bool {
                default_matches_uid(item, uid)
            }

            fn parse_instance(&self, item: &Value) -> Option<Instance> {
                default_parse_instance(item)
            }
        }
    };
}

fn default_create_body(machine: &Machine, raw_config: &Value, userdata: &[u8], size_field: &str) -> Value {
    use kube::ResourceExt;
    serde_json::json!({
        "name": machine.name_any(),
        "tags": { "machineUid": machine.uid().unwrap_or_default() },
        "region": string_field(raw_config, "region"),
        "size": raw_config.get(size_field),
        "userdata": base64::Engine::encode(&base64::engine::general_purpose::STANDARD, userdata),
    })
}

fn default_matches_uid(item: &Value, uid: &str) -> bool {
    item.get("tags")
        .and_then(|t| t.get("machineUid"))
        .and_then(Value::as_str)
        .or_else(|| item.get("machineUid").and_then(Value::as_str))
        .is_some_and(|found| found == uid)
}

fn default_parse_instance(item: &Value) -> Option<Instance> {
    let id = item.get("id").and_then(Value::as_str)?;
    let name = item.get("name").and_then(Value::as_str).unwrap_or(id).to_string();
    let addresses = item
        .get("addresses")
        .and_then(Value::as_array)
        .map(|addrs| {
            addrs
                .iter()
                .filter_map(|a| {
                    Some(MachineAddress {
                        r#type: a.get("type")?.as_str()?.to_string(),
                        address: a.get("address")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Instance {
        name,
        id: id.to_string(),
        provider_id: item.get("providerId").and_then(Value::as_str).map(String::from).unwrap_or_else(|| id.to_string()),
        addresses,
        status: super::InstanceStatus::Running,
    })
}

rest_profile!(AwsProfile, CloudProviderName::Aws, "https://ec2.amazonaws.com", "credentials", "instanceType", "t3.medium", "/instances");
rest_profile!(AzureProfile, CloudProviderName::Azure, "https://management.azure.com", "credentials", "vmSize", "Standard_B2s", "/virtualMachines");
rest_profile!(GceProfile, CloudProviderName::Gce, "https://compute.googleapis.com", "credentials", "machineType", "e2-standard-2", "/instances");
rest_profile!(DigitalOceanProfile, CloudProviderName::DigitalOcean, "https://api.digitalocean.com/v2", "apiToken", "size", "s-2vcpu-4gb", "/droplets");
rest_profile!(HetznerProfile, CloudProviderName::Hetzner, "https://api.hetzner.cloud/v1", "apiToken", "serverType", "cx22", "/servers");
rest_profile!(LinodeProfile, CloudProviderName::Linode, "https://api.linode.com/v4", "apiToken", "type", "g6-standard-2", "/linode/instances");
rest_profile!(OpenStackProfile, CloudProviderName::OpenStack, "https://identity.example.invalid/v3", "credentials", "flavor", "m1.medium", "/servers");
rest_profile!(NutanixProfile, CloudProviderName::Nutanix, "https://prism-central.example.invalid:9440", "credentials", "vmClass", "default", "/vms");
rest_profile!(VSphereProfile, CloudProviderName::VSphere, "https://vcenter.example.invalid/api", "credentials", "vmTemplate", "ubuntu-22.04", "/vms");
rest_profile!(VmwareCloudDirectorProfile, CloudProviderName::VmwareCloudDirector, "https://vcd.example.invalid/cloudapi", "credentials", "sizingPolicy", "default", "/vms");
rest_profile!(KubeVirtProfile, CloudProviderName::KubeVirt, "https://kubevirt.example.invalid", "credentials", "instanceType", "u1.medium", "/virtualmachines");
rest_profile!(AnexiaProfile, CloudProviderName::Anexia, "https://engine.anexia-it.com/api", "apiToken", "cpuPerformanceType", "standard", "/vms");
rest_profile!(VultrProfile, CloudProviderName::Vultr, "https://api.vultr.com/v2", "apiToken", "plan", "vc2-2c-4gb", "/instances");
rest_profile!(ScalewayProfile, CloudProviderName::Scaleway, "https://api.scaleway.com", "apiToken", "commercialType", "DEV1-M", "/servers");
rest_profile!(AlibabaProfile, CloudProviderName::Alibaba, "https://ecs.aliyuncs.com", "credentials", "instanceType", "ecs.g6.large", "/instances");
rest_profile!(EquinixMetalProfile, CloudProviderName::EquinixMetal, "https://api.equinix.com/metal/v1", "apiToken", "plan", "c3.small.x86", "/devices");

#[cfg(test)]
#[path = "profiles_tests.rs"]
mod profiles_tests;
