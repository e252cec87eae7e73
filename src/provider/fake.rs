// SPDX-License-Identifier: Apache-2.0

//! In-memory fake [`Provider`], used by reconciler unit tests and by the
//! `--fake-provider` escape hatch.
//!
//! `providerSpec.value` on a fake-backed Machine may set `"failValidate": true` or
//! `"failCreate": true` to exercise the terminal-error paths without a real cloud.

use super::{Instance, InstanceStatus, Provider};
use crate::crd::{Machine, MachineAddress};
use crate::errors::ProviderError;
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Clone)]
struct FakeInstance {
    id: String,
    uid: String,
}

/// A deterministic, in-memory stand-in for a real cloud, keyed by Machine UID.
#[derive(Default)]
pub struct FakeProvider {
    instances: Mutex<Vec<FakeInstance>>,
}

impl FakeProvider {
    fn to_instance(&self, machine: &Machine, record: &FakeInstance) -> Instance {
        Instance {
            name: machine.name_any(),
            id: record.id.clone(),
            provider_id: format!("fake://{}", record.id),
            addresses: vec![MachineAddress { r#type: "InternalIP".to_string(), address: "10.0.0.1".to_string() }],
            status: InstanceStatus::Running,
        }
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn add_defaults(&self, raw_config: &mut Value) {
        if let Value::Object(map) = raw_config {
            map.entry("size").or_insert_with(|| Value::String("fake-small".to_string()));
        }
    }

    async fn validate(&self, raw_config: &Value) -> Result<(), ProviderError> {
        if raw_config.get("failValidate").and_then(Value::as_bool).unwrap_or(false) {
            return Err(ProviderError::InvalidConfig {
                machine: String::new(),
                reason: "failValidate is set".to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, machine: &Machine) -> Result<Instance, ProviderError> {
        let uid = machine.uid().unwrap_or_default();
        let instances = self.instances.lock().expect("fake provider lock poisoned");
        instances
            .iter()
            .find(|i| i.uid == uid)
            .map(|record| self.to_instance(machine, record))
            .ok_or(ProviderError::InstanceNotFound { machine: machine.name_any() })
    }

    async fn create(&self, machine: &Machine, _userdata: &[u8]) -> Result<Instance, ProviderError> {
        let raw_config = machine.spec.provider_spec.value.clone().unwrap_or(Value::Null);
        if raw_config.get("failCreate").and_then(Value::as_bool).unwrap_or(false) {
            return Err(ProviderError::Terminal {
                machine: machine.name_any(),
                reason: "CreateMachineError".to_string(),
                message: "failCreate is set".to_string(),
            });
        }

        let uid = machine.uid().unwrap_or_default();
        let mut instances = self.instances.lock().expect("fake provider lock poisoned");
        if let Some(existing) = instances.iter().find(|i| i.uid == uid) {
            return Ok(self.to_instance(machine, existing));
        }
        let record = FakeInstance { id: format!("fake-{uid}"), uid };
        let instance = self.to_instance(machine, &record);
        instances.push(record);
        Ok(instance)
    }

    async fn cleanup(&self, machine: &Machine) -> Result<bool, ProviderError> {
        let uid = machine.uid().unwrap_or_default();
        let mut instances = self.instances.lock().expect("fake provider lock poisoned");
        let before = instances.len();
        instances.retain(|i| i.uid != uid);
        Ok(instances.len() < before || before == 0)
    }

    async fn migrate_uid(&self, machine: &Machine, new_uid: &str) -> Result<(), ProviderError> {
        let uid = machine.uid().unwrap_or_default();
        let mut instances = self.instances.lock().expect("fake provider lock poisoned");
        if let Some(record) = instances.iter_mut().find(|i| i.uid == uid) {
            record.uid = new_uid.to_string();
        }
        Ok(())
    }

    fn machine_metrics_labels(&self, machine: &Machine) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert("provider".to_string(), "fake".to_string());
        labels.insert("machine".to_string(), machine.name_any());
        labels
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod fake_tests;
