// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the machine-controller.
//!
//! Reconcile functions return `anyhow::Result<Action>` (see [`crate::reconcilers`]), but
//! provider and validation failures need a stable, matchable shape so a reconciler can
//! decide whether to retry or to surface a [`MachineStatus`](crate::crd::MachineStatus)
//! terminal error. [`ProviderError`] carries that shape; [`TerminalError`] marks the
//! subset that must never be retried away silently.

use thiserror::Error;

/// Errors returned by a [`crate::provider::Provider`] implementation.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The instance backing a Machine could not be found at the cloud provider.
    #[error("instance for machine {machine} not found at provider")]
    InstanceNotFound {
        /// Name of the Machine whose instance is missing.
        machine: String,
    },

    /// `providerSpec` failed `Provider::validate`.
    #[error("invalid provider spec for machine {machine}: {reason}")]
    InvalidConfig {
        /// Name of the Machine with the invalid spec.
        machine: String,
        /// Human-readable validation failure.
        reason: String,
    },

    /// The cloud API rejected the request for a reason that will never succeed on retry
    /// (e.g. quota permanently exhausted, image not found, malformed request).
    #[error("terminal provider error for machine {machine}: {reason}")]
    Terminal {
        /// Name of the affected Machine.
        machine: String,
        /// A short, CamelCase-ish reason code mirrored into `status.errorReason`.
        reason: String,
        /// Human-readable detail mirrored into `status.errorMessage`.
        message: String,
    },

    /// The cloud API call failed for a reason that may succeed on retry (rate limiting,
    /// transient network failure, temporary capacity shortage).
    #[error("transient provider error for machine {machine}: {source}")]
    Transient {
        /// Name of the affected Machine.
        machine: String,
        /// Underlying failure description.
        source: String,
    },

    /// A `ConfigVarResolver` lookup (secretKeyRef/configMapKeyRef/env) failed.
    #[error("failed to resolve config variable {key}: {reason}")]
    ConfigResolution {
        /// The config variable name being resolved.
        key: String,
        /// Why resolution failed.
        reason: String,
    },
}

impl ProviderError {
    /// True if retrying this operation without operator intervention cannot succeed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderError::Terminal { .. } | ProviderError::InvalidConfig { .. })
    }

    /// The `(reason, message)` pair to mirror into `Machine.status` when terminal.
    #[must_use]
    pub fn status_reason(&self) -> (String, String) {
        match self {
            ProviderError::Terminal { reason, message, .. } => (reason.clone(), message.clone()),
            ProviderError::InvalidConfig { reason, .. } => {
                ("InvalidConfigurationMachineError".to_string(), reason.clone())
            }
            ProviderError::InstanceNotFound { machine } => (
                "InstanceNotFound".to_string(),
                format!("no instance found at provider for machine {machine}"),
            ),
            ProviderError::Transient { source, .. } => {
                ("ProviderTransientError".to_string(), source.clone())
            }
            ProviderError::ConfigResolution { key, reason } => (
                "ConfigVariableResolutionFailed".to_string(),
                format!("{key}: {reason}"),
            ),
        }
    }
}

/// Marker for errors that a reconciler must surface as a terminal Machine error rather
/// than retry indefinitely.
pub trait TerminalError {
    /// True if this error must stop retrying and be surfaced on the resource's status.
    fn is_terminal(&self) -> bool;
}

impl TerminalError for ProviderError {
    fn is_terminal(&self) -> bool {
        ProviderError::is_terminal(self)
    }
}

/// Errors raised by the CSR approver while validating a `CertificateSigningRequest`.
#[derive(Error, Debug, Clone)]
pub enum CsrApprovalError {
    /// The CSR's PEM block could not be parsed.
    #[error("failed to parse CSR PEM/DER for {name}: {reason}")]
    Malformed {
        /// Name of the CertificateSigningRequest object.
        name: String,
        /// Parser failure detail.
        reason: String,
    },

    /// The CSR requested a username, group set, usage set, CN, or SAN that does not
    /// match any known Machine's bound addresses.
    #[error("CSR {name} does not match any known node kubelet identity: {reason}")]
    NotMatched {
        /// Name of the CertificateSigningRequest object.
        name: String,
        /// Why no Machine matched.
        reason: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
