// SPDX-License-Identifier: Apache-2.0

//! Approves kubelet-serving `CertificateSigningRequest`s for Machine-bound Nodes
//!
//!
//! A kubelet that has just joined the cluster submits a serving-certificate CSR under the
//! `kubernetes.io/kubelet-serving` signer. This reconciler approves it only when every one
//! of the following holds; any failure is a silent skip (the object may belong to some
//! other approver), never a terminal or retried error:
//!
//! 1. The CSR is not already `Approved` or `Denied`.
//! 2. `spec.username` is `system:node:<name>` and `spec.groups` contains both
//!    `system:nodes` and `system:authenticated`.
//! 3. `spec.usages` is exactly `{digital signature, key encipherment, server auth}`.
//! 4. The PEM request decodes to an X.509 certificate whose subject CN equals
//!    `spec.username` verbatim, whose subject organization is exactly `["system:nodes"]`,
//!    and whose SAN set (DNS names and IPs) is a subset of `{<name>} ∪ addresses` for some
//!    bound `Machine` whose `status.nodeRef.name == <name>`.

use crate::context::Context;
use crate::errors::CsrApprovalError;
use anyhow::Result;
use k8s_openapi::api::certificates::v1::{
    CertificateSigningRequest, CertificateSigningRequestCondition,
};
use kube::api::{Api, PostParams};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::pem::parse_x509_pem;

const SIGNER_KUBELET_SERVING: &str = "kubernetes.io/kubelet-serving";
const REQUIRED_GROUPS: [&str; 2] = ["system:nodes", "system:authenticated"];
const REQUIRED_USAGES: [&str; 3] = ["digital signature", "key encipherment", "server auth"];
const APPROVAL_REASON: &str = "machine-controller NodeCSRApprover controller approved node serving cert";
const APPROVAL_MESSAGE: &str = "node serving certificate matched a bound Machine's addresses";

/// Reconcile one `CertificateSigningRequest`: approve it if (and only if) it is a
/// well-formed kubelet-serving request for a node address this controller already trusts.
///
/// # Errors
///
/// Returns an error only if the approval API call itself failed (network/API-server
/// issue); a CSR that simply does not match the expected shape is skipped, not errored.
pub async fn reconcile_csr(csr: Arc<CertificateSigningRequest>, ctx: Arc<Context>) -> Result<Action> {
    let name = csr.name_any();

    if already_decided(&csr) {
        debug!(csr = %name, "CSR already approved or denied, skipping");
        return Ok(Action::await_change());
    }

    if csr.spec.signer_name != SIGNER_KUBELET_SERVING {
        return Ok(Action::await_change());
    }

    match validate_and_bind(&csr, &ctx) {
        Ok(()) => {
            approve(&ctx, &name, &csr).await?;
            info!(csr = %name, "approved kubelet-serving CSR");
            Ok(Action::await_change())
        }
        Err(reason) => {
            debug!(csr = %name, %reason, "CSR did not match a known node identity, skipping");
            Ok(Action::requeue(Duration::from_secs(30)))
        }
    }
}

fn already_decided(csr: &CertificateSigningRequest) -> bool {
    csr.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| conditions.iter().any(|c| c.type_ == "Approved" || c.type_ == "Denied"))
}

fn validate_and_bind(csr: &CertificateSigningRequest, ctx: &Context) -> Result<(), CsrApprovalError> {
    let name = csr.name_any();
    let node_name = expected_node_name(csr)?;
    validate_groups(csr, &name)?;
    validate_usages(csr, &name)?;

    let der = decode_request(csr, &name)?;
    let (_, cert) = x509_parser::parse_x509_certificate(&der).map_err(|e| CsrApprovalError::Malformed {
        name: name.clone(),
        reason: format!("invalid X.509 certificate: {e}"),
    })?;

    let cn = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .ok_or_else(|| CsrApprovalError::Malformed { name: name.clone(), reason: "no subject CN".to_string() })?;
    if cn != csr.spec.username {
        return Err(CsrApprovalError::NotMatched {
            name: name.clone(),
            reason: format!("subject CN {cn:?} does not match requesting username {:?}", csr.spec.username),
        });
    }

    let orgs: Vec<&str> = cert.subject().iter_organization().filter_map(|o| o.as_str().ok()).collect();
    if orgs != ["system:nodes"] {
        return Err(CsrApprovalError::NotMatched {
            name: name.clone(),
            reason: format!("subject organization {orgs:?} is not exactly [\"system:nodes\"]"),
        });
    }

    let mut bound_addresses =
        bound_addresses_for_node(ctx, &node_name).ok_or_else(|| CsrApprovalError::NotMatched {
            name: name.clone(),
            reason: format!("no bound Machine found for node {node_name:?}"),
        })?;
    bound_addresses.insert(node_name.clone());

    let sans = subject_alternative_names(&cert);
    if !sans.iter().all(|san| bound_addresses.contains(san)) {
        return Err(CsrApprovalError::NotMatched {
            name,
            reason: format!("SAN set {sans:?} is not a subset of bound addresses {bound_addresses:?}"),
        });
    }

    Ok(())
}

fn expected_node_name(csr: &CertificateSigningRequest) -> Result<String, CsrApprovalError> {
    let name = csr.name_any();
    csr.spec
        .username
        .strip_prefix("system:node:")
        .map(str::to_string)
        .ok_or_else(|| CsrApprovalError::NotMatched {
            name,
            reason: format!("username {:?} is not system:node:<name>", csr.spec.username),
        })
}

fn validate_groups(csr: &CertificateSigningRequest, name: &str) -> Result<(), CsrApprovalError> {
    let groups: BTreeSet<&str> = csr.spec.groups.iter().flatten().map(String::as_str).collect();
    if REQUIRED_GROUPS.iter().all(|g| groups.contains(g)) {
        Ok(())
    } else {
        Err(CsrApprovalError::NotMatched {
            name: name.to_string(),
            reason: format!("groups {groups:?} missing one of {REQUIRED_GROUPS:?}"),
        })
    }
}

fn validate_usages(csr: &CertificateSigningRequest, name: &str) -> Result<(), CsrApprovalError> {
    let usages: BTreeSet<&str> = csr.spec.usages.iter().flatten().map(String::as_str).collect();
    let required: BTreeSet<&str> = REQUIRED_USAGES.into_iter().collect();
    if usages == required {
        Ok(())
    } else {
        Err(CsrApprovalError::NotMatched {
            name: name.to_string(),
            reason: format!("usages {usages:?} do not exactly match {REQUIRED_USAGES:?}"),
        })
    }
}

fn decode_request(csr: &CertificateSigningRequest, name: &str) -> Result<Vec<u8>, CsrApprovalError> {
    let pem_bytes = &csr.spec.request.0;
    let (_, pem) = parse_x509_pem(pem_bytes)
        .map_err(|e| CsrApprovalError::Malformed { name: name.to_string(), reason: format!("invalid PEM: {e}") })?;
    Ok(pem.contents)
}

fn subject_alternative_names(cert: &x509_parser::certificate::X509Certificate<'_>) -> BTreeSet<String> {
    cert.extensions()
        .iter()
        .find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectAlternativeName(san) => Some(
                san.general_names
                    .iter()
                    .filter_map(|gn| match gn {
                        GeneralName::DNSName(s) => Some((*s).to_string()),
                        GeneralName::IPAddress(bytes) => ip_from_bytes(bytes).map(|ip| ip.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default()
}

fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => Some(IpAddr::from(<[u8; 4]>::try_from(bytes).ok()?)),
        16 => Some(IpAddr::from(<[u8; 16]>::try_from(bytes).ok()?)),
        _ => None,
    }
}

fn bound_addresses_for_node(ctx: &Context, node_name: &str) -> Option<BTreeSet<String>> {
    let machine = ctx.stores.machines.state().into_iter().find(|m| {
        m.status
            .as_ref()
            .and_then(|s| s.node_ref.as_ref())
            .and_then(|r| r.name.as_deref())
            == Some(node_name)
    })?;
    Some(machine.status.as_ref()?.addresses.iter().map(|a| a.address.clone()).collect())
}

async fn approve(ctx: &Context, name: &str, csr: &CertificateSigningRequest) -> Result<()> {
    let api: Api<CertificateSigningRequest> = Api::all(ctx.client.clone());
    let mut updated = csr.clone();
    let now = k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now());
    let condition = CertificateSigningRequestCondition {
        type_: "Approved".to_string(),
        status: "True".to_string(),
        reason: Some(APPROVAL_REASON.to_string()),
        message: Some(APPROVAL_MESSAGE.to_string()),
        last_update_time: Some(now.clone()),
        last_transition_time: Some(now),
        ..Default::default()
    };
    updated
        .status
        .get_or_insert_with(Default::default)
        .conditions
        .get_or_insert_with(Vec::new)
        .push(condition);

    match api.replace_approval(name, &PostParams::default(), &updated).await {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(csr = %name, error = %e, "failed to approve CSR");
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[path = "csr_approver_tests.rs"]
mod csr_approver_tests;
