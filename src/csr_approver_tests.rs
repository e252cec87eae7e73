use super::*;
use crate::context::Stores;
use crate::crd::{Machine, MachineAddress, MachineDeployment, MachineSet, MachineSpec, MachineStatus, ProviderSpec};
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::runtime::reflector;
use kube::runtime::watcher::Event;

/// A self-signed certificate with `CN=system:node:worker-1`, `O=system:nodes`,
/// `SAN=DNS:worker-1,IP:10.0.0.5`, used to exercise the CN/org/SAN extraction path
/// without a live signer.
const WORKER_1_CERT_PEM: &str = "-----BEGIN CERTIFICATE-----
MIIDaDCCAlCgAwIBAgIUQT7TnSipvoHMjAVjsUDAJDCA1LgwDQYJKoZIhvcNAQEL
BQAwNjEVMBMGA1UECgwMc3lzdGVtOm5vZGVzMR0wGwYDVQQDDBRzeXN0ZW06bm9k
ZTp3b3JrZXItMTAeFw0yNjA3MjcyMjEwMDlaFw0yNjA3MjgyMjEwMDlaMDYxFTAT
BgNVBAoMDHN5c3RlbTpub2RlczEdMBsGA1UEAwwUc3lzdGVtOm5vZGU6d29ya2Vy
LTEwggEiMA0GCSqGSIb3DQEBAQUAA4IBDwAwggEKAoIBAQDFitjqM4DY6EY8/5qi
eXAjevlzJ/joLTYiwBTVT3UXVnq1C/ekM3vpTN0mCi07dgfkXaBbN75II5LXYIEO
FbWhBAvmeprtmzBeR3kzbbKCeMDE2dScAJS86XBqbTVCSmlFagIpmqo+BD7Y1eey
XngToGA3K47s8NUzUqMQ1Byjyghht5qgG1MB/rfe1BC3g4qVPctOEO2A6wPnnN/8
wBDftqXvzlmKWkEcjYi53OmJ34tfw8ALNdnOJC/SOndtOOBv4l/YFKu+fuIbcXkI
u7Y9Q/sPjixM7xzlMnvGGJmTw4SuBBPxysKIYFc0KAgYjO0rSRSWggzhbPqxK7ba
Z8bbAgMBAAGjbjBsMB0GA1UdDgQWBBTQyt6drBWvPtnkJmrBmY/4UWXUSjAfBgNV
HSMEGDAWgBTQyt6drBWvPtnkJmrBmY/4UWXUSjAPBgNVHRMBAf8EBTADAQH/MBkG
A1UdEQQSMBCCCHdvcmtlci0xhwQKAAAFMA0GCSqGSIb3DQEBCwUAA4IBAQAMbM13
M0Kw0737qOoj1bvvfDp5D4G9yMk/Xs73hyAGhSNH3WfhsJK/ocwS8LwP38TPe8nF
5EfVVvZcWfzdzoxpNqFz0oSsnasuLSy5niA1DmoyziKoBNHmqpFosB1oGqwUxKYP
GB13ub0MpCtWzKFJxu0TwJYMwDaLqUG05zVaGI1Uez+797evaidR4NZNxg0gyMew
wa0rBX6b8P7e3sjk5v9D78mjzbOZ+yeg6tF+3D12w3tN8S01WOwwArXYzQg75DUb
ismVGiICBnIbcMba1cSlXwAqTl2f1AhdXSuakrhLHkxAVmFN3sUebXzm8O2xTPUc
+/pRDC7sXrAJKvOU
-----END CERTIFICATE-----
";

fn base_csr() -> CertificateSigningRequest {
    CertificateSigningRequest {
        metadata: ObjectMeta { name: Some("csr-worker-1".to_string()), ..Default::default() },
        spec: k8s_openapi::api::certificates::v1::CertificateSigningRequestSpec {
            request: ByteString(WORKER_1_CERT_PEM.as_bytes().to_vec()),
            signer_name: SIGNER_KUBELET_SERVING.to_string(),
            username: "system:node:worker-1".to_string(),
            groups: Some(vec!["system:nodes".to_string(), "system:authenticated".to_string()]),
            usages: Some(REQUIRED_USAGES.iter().map(|s| (*s).to_string()).collect()),
            ..Default::default()
        },
        status: None,
    }
}

#[test]
fn already_decided_is_false_for_a_fresh_csr() {
    assert!(!already_decided(&base_csr()));
}

#[test]
fn already_decided_is_true_once_approved() {
    let mut csr = base_csr();
    csr.status = Some(k8s_openapi::api::certificates::v1::CertificateSigningRequestStatus {
        conditions: Some(vec![CertificateSigningRequestCondition {
            type_: "Approved".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    });
    assert!(already_decided(&csr));
}

#[test]
fn expected_node_name_strips_the_system_node_prefix() {
    assert_eq!(expected_node_name(&base_csr()).unwrap(), "worker-1");
}

#[test]
fn expected_node_name_rejects_a_non_node_username() {
    let mut csr = base_csr();
    csr.spec.username = "system:admin".to_string();
    assert!(matches!(expected_node_name(&csr), Err(CsrApprovalError::NotMatched { .. })));
}

#[test]
fn validate_groups_requires_both_node_groups() {
    let csr = base_csr();
    validate_groups(&csr, "csr-worker-1").expect("groups satisfy the requirement");
}

#[test]
fn validate_groups_rejects_a_missing_group() {
    let mut csr = base_csr();
    csr.spec.groups = Some(vec!["system:authenticated".to_string()]);
    assert!(validate_groups(&csr, "csr-worker-1").is_err());
}

#[test]
fn validate_usages_requires_the_exact_set() {
    let csr = base_csr();
    validate_usages(&csr, "csr-worker-1").expect("usages match exactly");
}

#[test]
fn validate_usages_rejects_an_extra_usage() {
    let mut csr = base_csr();
    csr.spec.usages = Some(vec!["digital signature".to_string(), "key encipherment".to_string()]);
    assert!(validate_usages(&csr, "csr-worker-1").is_err());
}

#[test]
fn decode_request_parses_a_real_pem_certificate() {
    let csr = base_csr();
    let der = decode_request(&csr, "csr-worker-1").expect("valid PEM");
    let (_, cert) = x509_parser::parse_x509_certificate(&der).expect("valid certificate");
    let cn = cert.subject().iter_common_name().next().unwrap().as_str().unwrap();
    assert_eq!(cn, "system:node:worker-1");
    let org = cert.subject().iter_organization().next().unwrap().as_str().unwrap();
    assert_eq!(org, "system:nodes");
}

#[test]
fn decode_request_rejects_garbage_bytes() {
    let mut csr = base_csr();
    csr.spec.request = ByteString(b"not a pem".to_vec());
    assert!(matches!(decode_request(&csr, "csr-worker-1"), Err(CsrApprovalError::Malformed { .. })));
}

#[test]
fn subject_alternative_names_reads_dns_and_ip_entries() {
    let csr = base_csr();
    let der = decode_request(&csr, "csr-worker-1").unwrap();
    let (_, cert) = x509_parser::parse_x509_certificate(&der).unwrap();
    let sans = subject_alternative_names(&cert);
    assert!(sans.contains("worker-1"));
    assert!(sans.contains("10.0.0.5"));
}

fn context_with_machines(machines: Vec<Machine>) -> Context {
    let (machines_store, mut writer) = reflector::store::<Machine>();
    for m in machines {
        writer.apply_watcher_event(&Event::Apply(m));
    }
    let (machine_sets, _) = reflector::store::<MachineSet>();
    let (machine_deployments, _) = reflector::store::<MachineDeployment>();
    let (nodes, _) = reflector::store::<Node>();
    let client = kube::Client::try_from(kube::Config::new("https://127.0.0.1:1".parse().unwrap()))
        .expect("build offline client for plumbing only");
    let http_client = reqwest::Client::new();
    let config_resolver = crate::provider::config::ConfigVarResolver::new(client.clone(), "default");
    Context {
        client,
        stores: Stores { machines: machines_store, machine_sets, machine_deployments, nodes },
        http_client: http_client.clone(),
        provider_registry: std::sync::Arc::new(crate::provider::registry::ProviderRegistry::new(http_client, config_resolver)),
        userdata_provider: std::sync::Arc::new(crate::userdata::OpaqueUserdataProvider),
        join_cluster_timeout: std::time::Duration::from_secs(crate::constants::DEFAULT_JOIN_CLUSTER_TIMEOUT_SECS),
        skip_evict_after: std::time::Duration::from_secs(crate::constants::DEFAULT_SKIP_EVICT_AFTER_SECS),
    }
}

fn bound_machine(node_name: &str, addresses: Vec<MachineAddress>) -> Machine {
    Machine {
        metadata: ObjectMeta { name: Some("worker-1-machine".to_string()), ..Default::default() },
        spec: MachineSpec {
            provider_spec: ProviderSpec { value: None },
            versions: Default::default(),
            taints: None,
            config_source: None,
        },
        status: Some(MachineStatus {
            node_ref: Some(crate::crd::ObjectReference {
                kind: Some("Node".to_string()),
                name: Some(node_name.to_string()),
                ..Default::default()
            }),
            addresses,
            ..Default::default()
        }),
    }
}

#[test]
fn validate_and_bind_rejects_when_no_machine_is_bound_to_the_node() {
    let csr = base_csr();
    let ctx = context_with_machines(vec![]);
    let err = validate_and_bind(&csr, &ctx).unwrap_err();
    assert!(matches!(err, CsrApprovalError::NotMatched { .. }));
}

#[test]
fn validate_and_bind_approves_a_fully_matching_csr() {
    let csr = base_csr();
    let machine = bound_machine(
        "worker-1",
        vec![MachineAddress { r#type: "InternalIP".to_string(), address: "10.0.0.5".to_string() }],
    );
    let ctx = context_with_machines(vec![machine]);
    validate_and_bind(&csr, &ctx).expect("CN, org, groups, usages, and SANs all match");
}

#[test]
fn approval_reason_is_the_literal_approver_identity_string() {
    assert_eq!(APPROVAL_REASON, "machine-controller NodeCSRApprover controller approved node serving cert");
}

#[test]
fn validate_and_bind_rejects_a_san_not_in_the_machine_address_set() {
    let csr = base_csr();
    let machine = bound_machine(
        "worker-1",
        vec![MachineAddress { r#type: "InternalIP".to_string(), address: "192.168.1.1".to_string() }],
    );
    let ctx = context_with_machines(vec![machine]);
    let err = validate_and_bind(&csr, &ctx).unwrap_err();
    assert!(matches!(err, CsrApprovalError::NotMatched { .. }));
}
