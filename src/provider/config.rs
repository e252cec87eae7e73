// SPDX-License-Identifier: Apache-2.0

//! Three-source configuration-variable resolution for `providerSpec.value` fields
//! resolution order used by every REST-backed provider.
//!
//! Every string/bool field on a provider's `RawConfig` may be supplied three ways, tried
//! in order: a literal `value`, a `secretKeyRef` resolved against the control-plane API,
//! a `configMapKeyRef` likewise, and finally a named environment variable. The resolver
//! is stateless (holds only a `Client`) and safe for concurrent calls.

use crate::errors::ProviderError;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{Api, Client};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A reference to a key within a namespaced `Secret` or `ConfigMap`.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVarKeyRef {
    /// Name of the `Secret`/`ConfigMap`.
    pub name: String,
    /// Namespace of the `Secret`/`ConfigMap`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Key within the referenced object's data map.
    pub key: String,
}

/// One provider config field: a literal value, or a pointer to where to fetch one.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVarString {
    /// Literal value, tried first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// `Secret` key reference, tried second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<ConfigVarKeyRef>,
    /// `ConfigMap` key reference, tried third.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_key_ref: Option<ConfigVarKeyRef>,
    /// Environment variable name, tried last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_env_var: Option<String>,
}

/// Try the literal `value`, returning `None` when it is absent/empty so the caller moves
/// on to `secretKeyRef`. Pure, no client required.
fn resolve_literal(_field_name: &str, var: &ConfigVarString) -> Option<Result<String, ProviderError>> {
    match &var.value {
        Some(value) if !value.is_empty() => Some(Ok(value.clone())),
        _ => None,
    }
}

/// Try the named environment variable, or fail with the "nothing configured" error if
/// none of the four sources were set. Pure, no client required.
fn resolve_env(field_name: &str, var: &ConfigVarString) -> Result<String, ProviderError> {
    let Some(env_name) = &var.from_env_var else {
        return Err(ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: "no value, secretKeyRef, configMapKeyRef, or fromEnvVar set".to_string(),
        });
    };
    std::env::var(env_name).map_err(|_| ProviderError::ConfigResolution {
        key: field_name.to_string(),
        reason: format!("environment variable {env_name} is unset"),
    })
}

/// Resolves [`ConfigVarString`] values against the control-plane API and process
/// environment. Stateless and `Clone`, safe to share across concurrent `Provider` calls.
#[derive(Clone)]
pub struct ConfigVarResolver {
    client: Client,
    default_namespace: String,
}

impl ConfigVarResolver {
    /// Build a resolver that looks up unqualified `secretKeyRef`/`configMapKeyRef`
    /// namespaces against `default_namespace` (the Machine's own namespace).
    #[must_use]
    pub fn new(client: Client, default_namespace: impl Into<String>) -> Self {
        Self { client, default_namespace: default_namespace.into() }
    }

    /// Resolve a single [`ConfigVarString`], trying `value`, `secretKeyRef`,
    /// `configMapKeyRef`, then the named environment variable, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::ConfigResolution`] if every source is absent, or if a
    /// named `secretKeyRef`/`configMapKeyRef` does not resolve to a value.
    pub async fn resolve(&self, field_name: &str, var: &ConfigVarString) -> Result<String, ProviderError> {
        if let Some(result) = resolve_literal(field_name, var) {
            return result;
        }

        if let Some(secret_ref) = &var.secret_key_ref {
            return self.resolve_secret(field_name, secret_ref).await;
        }

        if let Some(cm_ref) = &var.config_map_key_ref {
            return self.resolve_config_map(field_name, cm_ref).await;
        }

        resolve_env(field_name, var)
    }

    async fn resolve_secret(&self, field_name: &str, r: &ConfigVarKeyRef) -> Result<String, ProviderError> {
        let namespace = r.namespace.as_deref().unwrap_or(&self.default_namespace);
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get(&r.name).await.map_err(|e| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("secret {namespace}/{} not found: {e}", r.name),
        })?;

        let data = secret.data.ok_or_else(|| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("secret {namespace}/{} has no data", r.name),
        })?;

        let bytes = data.get(&r.key).ok_or_else(|| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("secret {namespace}/{} has no key {}", r.name, r.key),
        })?;

        String::from_utf8(bytes.0.clone()).map_err(|e| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("secret value is not valid UTF-8: {e}"),
        })
    }

    async fn resolve_config_map(&self, field_name: &str, r: &ConfigVarKeyRef) -> Result<String, ProviderError> {
        let namespace = r.namespace.as_deref().unwrap_or(&self.default_namespace);
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let cm = api.get(&r.name).await.map_err(|e| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("configmap {namespace}/{} not found: {e}", r.name),
        })?;

        let data = cm.data.ok_or_else(|| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("configmap {namespace}/{} has no data", r.name),
        })?;

        data.get(&r.key).cloned().ok_or_else(|| ProviderError::ConfigResolution {
            key: field_name.to_string(),
            reason: format!("configmap {namespace}/{} has no key {}", r.name, r.key),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
