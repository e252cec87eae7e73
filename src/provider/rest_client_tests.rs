use super::*;

#[test]
fn classify_failure_unauthorized_is_terminal_with_caller_reason() {
    let err = classify_failure("m1", StatusCode::UNAUTHORIZED, "bad token", "InvalidConfigurationMachineError");
    match err {
        ProviderError::Terminal { reason, .. } => assert_eq!(reason, "InvalidConfigurationMachineError"),
        other => panic!("expected Terminal, got {other:?}"),
    }
}

#[test]
fn classify_failure_not_found_is_terminal_with_caller_reason() {
    let err = classify_failure("m1", StatusCode::NOT_FOUND, "no such instance", "CreateMachineError");
    match err {
        ProviderError::Terminal { reason, .. } => assert_eq!(reason, "CreateMachineError"),
        other => panic!("expected Terminal, got {other:?}"),
    }
}

#[test]
fn classify_failure_server_error_is_transient() {
    let err = classify_failure("m1", StatusCode::INTERNAL_SERVER_ERROR, "oops", "DeleteMachineError");
    assert!(matches!(err, ProviderError::Transient { .. }));
}

#[test]
fn rest_client_strips_trailing_slash_from_base_url() {
    let client = RestClient::new(HttpClient::new(), "https://api.example.com/", "token");
    assert_eq!(client.base_url, "https://api.example.com");
}
