// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for integration tests.

use kube::api::{Api, DeleteParams, PostParams};
use kube::client::Client;
use machine_controller::crd::{
    LabelSelector, Machine, MachineDeployment, MachineDeploymentSpec, MachineSet, MachineSetSpec, MachineSpec,
    MachineTemplateMetadata, MachineTemplateSpec, ProviderSpec,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;

/// Get a Kubernetes client or skip the test if not in a cluster.
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace.
pub async fn create_test_namespace(client: &Client, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "machine-controller-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace.
pub async fn cleanup_test_namespace(client: &Client, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

fn fake_provider_spec() -> ProviderSpec {
    ProviderSpec { value: Some(json!({"provider": "fake"})) }
}

/// Build a minimal `MachineDeployment` for test plumbing, using the `fake` provider so
/// no real cloud credentials are required.
pub fn test_machine_deployment(name: &str, replicas: i32, selector_labels: BTreeMap<String, String>) -> MachineDeployment {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    MachineDeployment {
        metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
        spec: MachineDeploymentSpec {
            replicas,
            selector: LabelSelector { match_labels: Some(selector_labels.clone()), match_expressions: None },
            template: MachineTemplateSpec {
                metadata: MachineTemplateMetadata { labels: Some(selector_labels), annotations: None },
                spec: MachineSpec {
                    provider_spec: fake_provider_spec(),
                    versions: Default::default(),
                    taints: None,
                    config_source: None,
                },
            },
            strategy: None,
            min_ready_seconds: None,
            revision_history_limit: None,
            paused: None,
            progress_deadline_seconds: None,
        },
        status: None,
    }
}

/// Build a minimal `MachineSet` for test plumbing.
pub fn test_machine_set(name: &str, replicas: i32, selector_labels: BTreeMap<String, String>) -> MachineSet {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    MachineSet {
        metadata: ObjectMeta { name: Some(name.to_string()), ..Default::default() },
        spec: MachineSetSpec {
            replicas,
            selector: LabelSelector { match_labels: Some(selector_labels.clone()), match_expressions: None },
            template: MachineTemplateSpec {
                metadata: MachineTemplateMetadata { labels: Some(selector_labels), annotations: None },
                spec: MachineSpec {
                    provider_spec: fake_provider_spec(),
                    versions: Default::default(),
                    taints: None,
                    config_source: None,
                },
            },
            min_ready_seconds: None,
            delete_policy: None,
        },
        status: None,
    }
}

/// Build a minimal standalone `Machine` for test plumbing.
pub fn test_machine(name: &str, labels: BTreeMap<String, String>) -> Machine {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    Machine {
        metadata: ObjectMeta { name: Some(name.to_string()), labels: Some(labels), ..Default::default() },
        spec: MachineSpec {
            provider_spec: fake_provider_spec(),
            versions: Default::default(),
            taints: None,
            config_source: None,
        },
        status: None,
    }
}

/// Wait for a duration, logging why.
pub async fn wait_for_ready(duration: Duration) {
    println!("Waiting {} seconds for resources to be ready...", duration.as_secs());
    sleep(duration).await;
}
