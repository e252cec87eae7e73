// SPDX-License-Identifier: Apache-2.0

use super::*;

#[test]
fn terminal_variant_is_terminal() {
    let err = ProviderError::Terminal {
        machine: "worker-1".to_string(),
        reason: "QuotaExceeded".to_string(),
        message: "instance quota exhausted".to_string(),
    };
    assert!(err.is_terminal());
    assert_eq!(err.status_reason(), ("QuotaExceeded".to_string(), "instance quota exhausted".to_string()));
}

#[test]
fn invalid_config_is_terminal() {
    let err = ProviderError::InvalidConfig {
        machine: "worker-1".to_string(),
        reason: "missing cloudProvider field".to_string(),
    };
    assert!(err.is_terminal());
    let (reason, message) = err.status_reason();
    assert_eq!(reason, "InvalidConfigurationMachineError");
    assert_eq!(message, "missing cloudProvider field");
}

#[test]
fn transient_and_not_found_are_not_terminal() {
    let transient = ProviderError::Transient {
        machine: "worker-1".to_string(),
        source: "connection reset".to_string(),
    };
    assert!(!transient.is_terminal());

    let missing = ProviderError::InstanceNotFound { machine: "worker-1".to_string() };
    assert!(!missing.is_terminal());
}
