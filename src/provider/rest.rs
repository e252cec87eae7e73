// SPDX-License-Identifier: Apache-2.0

//! Generic REST-backed [`Provider`] driven by a small per-cloud [`RestProfile`].
//!
//! Spec §1 treats each cloud's actual SDK/API semantics as an opaque external
//! collaborator; what the controller needs from every one of them is the same four
//! operations (list/get by machine UID, create, delete, retag). [`RestProvider`]
//! implements that uniform cycle once; `profiles` supplies the sixteen small
//! [`RestProfile`] values describing one cloud's base URL, credential field, and
//! request/response shape.

use crate::crd::Machine;
use crate::errors::ProviderError;
use crate::provider::config::{ConfigVarResolver, ConfigVarString};
use crate::provider::registry::CloudProviderName;
use crate::provider::rest_client::RestClient;
use crate::provider::{Instance, Provider};
use async_trait::async_trait;
use kube::ResourceExt;
use reqwest::{Client as HttpClient, Method};
use serde_json::Value;

/// Declarative shape of one cloud's REST API: enough for [`RestProvider`] to drive the
/// uniform create/get/cleanup/`migrate_uid` cycle without per-cloud control flow.
pub trait RestProfile: Send + Sync + 'static {
    /// Which [`CloudProviderName`] this profile implements.
    fn cloud_name(&self) -> CloudProviderName;

    /// Base URL to use when `raw_config` does not set one explicitly.
    fn default_base_url(&self) -> &'static str;

    /// Where in `raw_config` the bearer-token credential is configured, if at all.
    fn auth_config_var(&self, raw_config: &Value) -> Option<ConfigVarString>;

    /// Fill in this cloud's defaults (instance size, image family, disk type, …).
    fn apply_defaults(&self, raw_config: &mut Value);

    /// The collection endpoint for instances, e.g. `/v2/droplets`.
    fn instances_path(&self) -> &'static str;

    /// Build the JSON body for a create call from `raw_config` and the rendered userdata.
    fn build_create_body(&self, machine: &Machine, raw_config: &Value, userdata: &[u8]) -> Value;

    /// True if a list/get response item is the instance backing `uid`.
    fn matches_uid(&self, item: &Value, uid: &str) -> bool;

    /// Parse one list/get/create response item into a uniform [`Instance`].
    fn parse_instance(&self, item: &Value) -> Option<Instance>;
}

fn raw_config_of(machine: &Machine) -> Value {
    machine.spec.provider_spec.value.clone().unwrap_or(Value::Null)
}

/// A [`Provider`] for any cloud describable by a [`RestProfile`].
pub struct RestProvider<P: RestProfile> {
    http: HttpClient,
    config_resolver: ConfigVarResolver,
    profile: P,
}

impl<P: RestProfile> RestProvider<P> {
    pub fn new(http: HttpClient, config_resolver: ConfigVarResolver, profile: P) -> Self {
        Self { http, config_resolver, profile }
    }

    async fn client_for(&self, raw_config: &Value) -> Result<RestClient, ProviderError> {
        let base_url =
            raw_config.get("baseUrl").and_then(Value::as_str).unwrap_or_else(|| self.profile.default_base_url());
        let token = match self.profile.auth_config_var(raw_config) {
            Some(var) => self.config_resolver.resolve("auth", &var).await?,
            None => String::new(),
        };
        Ok(RestClient::new(self.http.clone(), base_url, token))
    }
}

#[async_trait]
impl<P: RestProfile> Provider for RestProvider<P> {
    fn name(&self) -> &'static str {
        self.profile.cloud_name().as_str()
    }

    fn add_defaults(&self, raw_config: &mut Value) {
        self.profile.apply_defaults(raw_config);
    }

    async fn validate(&self, raw_config: &Value) -> Result<(), ProviderError> {
        if self.profile.auth_config_var(raw_config).is_none() {
            return Err(ProviderError::InvalidConfig {
                machine: String::new(),
                reason: "no credential source (value/secretKeyRef/configMapKeyRef/fromEnvVar) configured"
                    .to_string(),
            });
        }
        // A read-only list call confirms the credential and base URL actually work.
        let client = self.client_for(raw_config).await?;
        let _: Value = client
            .request("", Method::GET, self.profile.instances_path(), None::<&()>, "InvalidConfigurationMachineError")
            .await?;
        Ok(())
    }

    async fn get(&self, machine: &Machine) -> Result<Instance, ProviderError> {
        let name = machine.name_any();
        let raw_config = raw_config_of(machine);
        let client = self.client_for(&raw_config).await?;
        let uid = machine.uid().unwrap_or_default();

        let list: Value = client
            .request(&name, Method::GET, self.profile.instances_path(), None::<&()>, "GetMachineError")
            .await?;
        let items: Vec<Value> = list
            .as_array()
            .cloned()
            .or_else(|| list.get("items").and_then(Value::as_array).cloned())
            .unwrap_or_default();

        items
            .iter()
            .find(|item| self.profile.matches_uid(item, &uid))
            .and_then(|item| self.profile.parse_instance(item))
            .ok_or(ProviderError::InstanceNotFound { machine: name })
    }

    async fn create(&self, machine: &Machine, userdata: &[u8]) -> Result<Instance, ProviderError> {
        if let Ok(existing) = self.get(machine).await {
            return Ok(existing);
        }

        let name = machine.name_any();
        let raw_config = raw_config_of(machine);
        let client = self.client_for(&raw_config).await?;
        let body = self.profile.build_create_body(machine, &raw_config, userdata);

        let created: Value = client
            .request(&name, Method::POST, self.profile.instances_path(), Some(&body), "CreateMachineError")
            .await?;
        self.profile.parse_instance(&created).ok_or_else(|| ProviderError::Transient {
            machine: name,
            source: "provider returned a create response this profile could not parse".to_string(),
        })
    }

    async fn cleanup(&self, machine: &Machine) -> Result<bool, ProviderError> {
        match self.get(machine).await {
            Ok(instance) => {
                let raw_config = raw_config_of(machine);
                let client = self.client_for(&raw_config).await?;
                let path = format!("{}/{}", self.profile.instances_path(), instance.id);
                client
                    .request_no_body::<()>(&machine.name_any(), Method::DELETE, &path, None, "DeleteMachineError")
                    .await?;
                Ok(false)
            }
            Err(ProviderError::InstanceNotFound { .. }) => Ok(true),
            Err(other) => Err(other),
        }
    }

    async fn migrate_uid(&self, machine: &Machine, new_uid: &str) -> Result<(), ProviderError> {
        let instance = self.get(machine).await?;
        let raw_config = raw_config_of(machine);
        let client = self.client_for(&raw_config).await?;
        let path = format!("{}/{}/tags", self.profile.instances_path(), instance.id);
        let body = serde_json::json!({ "machineUid": new_uid });
        client.request_no_body(&machine.name_any(), Method::PATCH, &path, Some(&body), "MigrateUIDMachineError").await
    }
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod rest_tests;
